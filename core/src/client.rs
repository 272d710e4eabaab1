use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slidesmith_common::{GenerationRequest, PresentationDocument};
use slidesmith_gemini::GeminiClient;

use crate::config::Config;
use crate::error::{ExportError, GenerationError, SpeechError};

/// Produces a whole deck from a request in one round trip.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<PresentationDocument, GenerationError>;
}

/// Turns a script into base64 16-bit mono PCM.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize_pcm(&self, script: &str, tone: &str) -> Result<String, SpeechError>;
}

/// A resolved visual: a reference only, never the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVisual {
    pub url: String,
    pub source: String,
}

/// Looks up a visual for a prompt. `None` means "no visual available".
#[async_trait]
pub trait VisualSource: Send + Sync {
    async fn resolve_visual(&self, prompt: &str) -> Option<ResolvedVisual>;
}

/// Materializes a visual reference into bytes at export time.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ExportError>;
}

/// Adapter exposing `GeminiClient` through the generation and speech seams.
pub struct GeminiAdapter {
    inner: GeminiClient,
}

impl GeminiAdapter {
    pub fn new(inner: GeminiClient) -> Self {
        Self { inner }
    }

    pub fn from_config(config: &Config) -> Self {
        let client = GeminiClient::new(config.gemini_api_key.clone().unwrap_or_default())
            .with_model(config.model.clone())
            .with_tts_model(config.tts_model.clone())
            .with_base_url(config.gemini_base_url.clone());
        Self::new(client)
    }
}

#[async_trait]
impl ContentGenerator for GeminiAdapter {
    async fn generate(&self, request: &GenerationRequest) -> Result<PresentationDocument, GenerationError> {
        Ok(self.inner.generate_presentation(request).await?)
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiAdapter {
    async fn synthesize_pcm(&self, script: &str, tone: &str) -> Result<String, SpeechError> {
        Ok(self.inner.synthesize_speech(script, tone).await?)
    }
}

/// Plain GET fetcher for visual references.
#[derive(Debug, Clone, Default)]
pub struct HttpImageFetcher {
    http: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ExportError> {
        let fail = |reason: String| ExportError::ImageFetch {
            url: url.to_string(),
            reason,
        };
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(fail(format!("http {status}")));
        }
        let bytes = resp.bytes().await.map_err(|e| fail(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetcher_reports_http_failures() {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let handle = std::thread::spawn(move || {
            let ok = server.recv().unwrap();
            ok.respond(tiny_http::Response::from_data(vec![1u8, 2, 3]))
                .unwrap();
            let missing = server.recv().unwrap();
            missing
                .respond(tiny_http::Response::from_string("gone").with_status_code(404))
                .unwrap();
        });

        let fetcher = HttpImageFetcher::new();
        let bytes = fetcher
            .fetch(&format!("http://127.0.0.1:{port}/a.jpg"))
            .await
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);

        let err = fetcher
            .fetch(&format!("http://127.0.0.1:{port}/b.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::ImageFetch { .. }));
        handle.join().unwrap();
    }
}
