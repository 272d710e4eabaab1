use serde::Serialize;
use slidesmith_common::{GenerationRequest, PresentationDocument};
use thiserror::Error;

use crate::models::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part, SpeechConfig,
};
use crate::prompt;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-09-2025";
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_VOICE: &str = "Kore";

/// Longest slice of an error body kept in error messages.
const ERROR_BODY_LIMIT: usize = 100;

#[derive(Error, Debug)]
pub enum GeminiError {
    #[error("no Gemini API key configured")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gemini http {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed response: {source}")]
    Decode {
        status: Option<u16>,
        #[source]
        source: serde_json::Error,
    },

    #[error("response carried no {0} payload")]
    MissingPayload(&'static str),
}

impl GeminiError {
    /// Upstream HTTP status, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            GeminiError::Http { status, .. } => Some(*status),
            GeminiError::Decode { status, .. } => *status,
            GeminiError::Transport(e) => e.status().map(|s| s.as_u16()),
            GeminiError::MissingApiKey | GeminiError::MissingPayload(_) => None,
        }
    }
}

/// Double every backslash that does not start a valid JSON escape.
///
/// The model regularly emits things like `\d` or `C:\path` inside strings,
/// which `serde_json` rejects.
pub fn escape_stray_backslashes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 16);
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some(&next) if matches!(next, '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u') => {
                out.push('\\');
                out.push(next);
                chars.next();
            }
            _ => out.push_str("\\\\"),
        }
    }
    out
}

fn truncate(body: &str) -> String {
    body.chars().take(ERROR_BODY_LIMIT).collect()
}

/// Thin client over `models/{model}:generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    tts_model: String,
    voice: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_tts_model(mut self, model: impl Into<String>) -> Self {
        self.tts_model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate_content<B: Serialize + ?Sized>(
        &self,
        model: &str,
        body: &B,
    ) -> Result<GenerateContentResponse, GeminiError> {
        if self.api_key.is_empty() {
            return Err(GeminiError::MissingApiKey);
        }
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        );
        tracing::debug!(%url, "gemini request");

        let resp = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "gemini request rejected");
            return Err(GeminiError::Http {
                status: status.as_u16(),
                body: truncate(&text),
            });
        }

        serde_json::from_str(&text).map_err(|source| GeminiError::Decode {
            status: Some(status.as_u16()),
            source,
        })
    }

    /// Generate a full deck in one round trip.
    pub async fn generate_presentation(
        &self,
        request: &GenerationRequest,
    ) -> Result<PresentationDocument, GeminiError> {
        let body = GenerateContentRequest {
            contents: vec![Content::from_parts(prompt::user_parts(request))],
            system_instruction: Some(Content::from_parts(vec![Part::text(
                prompt::system_instruction(&request.topic),
            )])),
            generation_config: GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                ..Default::default()
            },
        };

        let response = self.generate_content(&self.model, &body).await?;
        let raw = response
            .first_part()
            .and_then(Part::as_text)
            .ok_or(GeminiError::MissingPayload("text"))?;

        let document: PresentationDocument = serde_json::from_str(&escape_stray_backslashes(raw))
            .map_err(|source| GeminiError::Decode {
                status: Some(200),
                source,
            })?;

        if document.len() != request.slide_count {
            tracing::warn!(
                requested = request.slide_count,
                received = document.len(),
                "model returned a different slide count"
            );
        }
        Ok(document)
    }

    /// Synthesize `script` and return the base64 PCM payload (16-bit mono,
    /// 24 kHz).
    pub async fn synthesize_speech(&self, script: &str, tone: &str) -> Result<String, GeminiError> {
        let body = GenerateContentRequest {
            contents: vec![Content::from_parts(vec![Part::text(prompt::speech_prompt(
                script, tone,
            ))])],
            system_instruction: None,
            generation_config: GenerationConfig {
                response_modalities: Some(vec!["AUDIO".to_string()]),
                speech_config: Some(SpeechConfig::prebuilt(self.voice.clone())),
                ..Default::default()
            },
        };

        let response = self.generate_content(&self.tts_model, &body).await?;
        response
            .first_part()
            .and_then(Part::as_inline_data)
            .map(|d| d.data.clone())
            .ok_or(GeminiError::MissingPayload("audio"))
    }
}
