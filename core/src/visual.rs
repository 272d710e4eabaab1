//! Visual sourcing through the Pixabay search API.

use async_trait::async_trait;
use serde::Deserialize;

use crate::client::{ResolvedVisual, VisualSource};
use crate::config::{Config, DEFAULT_PIXABAY_URL};
use crate::error::VisualResolutionError;

/// Words that describe presentation style rather than subject matter.
pub const FILLER_WORDS: [&str; 15] = [
    "professional",
    "presentation",
    "slide",
    "image",
    "corporate",
    "style",
    "clean",
    "showing",
    "illustrating",
    "graphic",
    "depicting",
    "highly",
    "simple",
    "modern",
    "clear",
];

/// Query used once when the prompt's keywords find nothing.
pub const FALLBACK_QUERY: &str = "business technology";

const MAX_QUERY_CHARS: usize = 100;
const RESULTS_PER_PAGE: &str = "3";
const SOURCE: &str = "pixabay";

/// Reduce a visual prompt to search keywords.
pub fn search_keywords(prompt: &str) -> String {
    let mut text = prompt.to_lowercase();
    for word in FILLER_WORDS {
        text = text.replace(word, "");
    }
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_QUERY_CHARS).collect()
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "largeImageURL")]
    large_image_url: String,
}

#[derive(Debug, Clone)]
pub struct PixabayClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl PixabayClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.filter(|k| !k.is_empty()),
            base_url: DEFAULT_PIXABAY_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.pixabay_api_key.clone()).with_base_url(config.pixabay_base_url.clone())
    }

    async fn search(&self, key: &str, query: &str, popular: bool) -> Result<Vec<Hit>, VisualResolutionError> {
        let mut params = vec![
            ("key", key),
            ("q", query),
            ("image_type", "photo"),
            ("per_page", RESULTS_PER_PAGE),
            ("safesearch", "true"),
            ("orientation", "horizontal"),
        ];
        if popular {
            params.push(("order", "popular"));
        }

        let resp = self.http.get(&self.base_url).query(&params).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(VisualResolutionError::Http {
                status: status.as_u16(),
            });
        }
        let body: SearchResponse = resp.json().await?;
        Ok(body.hits)
    }

    /// Search the prompt's keywords, then the fallback query once.
    pub async fn try_resolve(&self, prompt: &str) -> Result<ResolvedVisual, VisualResolutionError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(VisualResolutionError::MissingApiKey)?;

        let keywords = search_keywords(prompt);
        tracing::debug!(%keywords, "searching for visual");
        let mut hits = self.search(key, &keywords, true).await?;

        if hits.is_empty() {
            tracing::debug!("no results, trying fallback query");
            hits = self.search(key, FALLBACK_QUERY, false).await?;
        }

        hits.into_iter()
            .next()
            .map(|hit| ResolvedVisual {
                url: hit.large_image_url,
                source: SOURCE.to_string(),
            })
            .ok_or(VisualResolutionError::NoResults)
    }
}

#[async_trait]
impl VisualSource for PixabayClient {
    async fn resolve_visual(&self, prompt: &str) -> Option<ResolvedVisual> {
        match self.try_resolve(prompt).await {
            Ok(visual) => Some(visual),
            Err(e) => {
                tracing::warn!("visual resolution failed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::JoinHandle;
    use std::time::Duration;

    struct Served {
        urls: Vec<String>,
        extra_requests: usize,
    }

    /// Serve canned bodies in order, then count any unexpected requests.
    fn serve(bodies: Vec<String>) -> (String, JoinHandle<Served>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let handle = std::thread::spawn(move || {
            let mut urls = Vec::new();
            for body in bodies {
                let request = server.recv().unwrap();
                urls.push(request.url().to_string());
                request
                    .respond(tiny_http::Response::from_string(body))
                    .unwrap();
            }
            let mut extra_requests = 0;
            while let Ok(Some(request)) = server.recv_timeout(Duration::from_millis(200)) {
                extra_requests += 1;
                let _ = request.respond(tiny_http::Response::from_string("{}"));
            }
            Served { urls, extra_requests }
        });
        (format!("http://127.0.0.1:{port}/api/"), handle)
    }

    fn hits(urls: &[&str]) -> String {
        let hits: Vec<_> = urls
            .iter()
            .map(|u| serde_json::json!({ "largeImageURL": u }))
            .collect();
        serde_json::json!({ "total": hits.len(), "hits": hits }).to_string()
    }

    #[test]
    fn keywords_drop_filler_words() {
        assert_eq!(
            search_keywords("A professional, clean image showing Solar Panels on a roof"),
            "a , solar panels on a roof"
        );
        let long = "word ".repeat(60);
        assert_eq!(search_keywords(&long).chars().count(), 100);
    }

    #[tokio::test]
    async fn returns_first_hit_with_filters() {
        let (base, server) = serve(vec![hits(&["https://cdn/1.jpg", "https://cdn/2.jpg"])]);
        let client = PixabayClient::new(Some("px".into())).with_base_url(base);

        let visual = client.resolve_visual("modern wind turbines").await.unwrap();
        assert_eq!(visual.url, "https://cdn/1.jpg");
        assert_eq!(visual.source, "pixabay");

        let served = server.join().unwrap();
        let url = &served.urls[0];
        for param in [
            "key=px",
            "q=wind+turbines",
            "image_type=photo",
            "per_page=3",
            "safesearch=true",
            "orientation=horizontal",
            "order=popular",
        ] {
            assert!(url.contains(param), "{url} missing {param}");
        }
    }

    #[tokio::test]
    async fn fallback_is_tried_exactly_once() {
        let (base, server) = serve(vec![hits(&[]), hits(&[])]);
        let client = PixabayClient::new(Some("px".into())).with_base_url(base);

        assert!(client.resolve_visual("obscure thing").await.is_none());

        let served = server.join().unwrap();
        assert_eq!(served.urls.len(), 2);
        assert_eq!(served.extra_requests, 0);
        assert!(served.urls[1].contains("q=business+technology"));
        assert!(!served.urls[1].contains("order=popular"));
    }

    #[tokio::test]
    async fn fallback_hit_is_used() {
        let (base, server) = serve(vec![hits(&[]), hits(&["https://cdn/fallback.jpg"])]);
        let client = PixabayClient::new(Some("px".into())).with_base_url(base);
        let visual = client.resolve_visual("obscure thing").await.unwrap();
        assert_eq!(visual.url, "https://cdn/fallback.jpg");
        server.join().unwrap();
    }

    #[tokio::test]
    async fn same_prompt_same_upstream_same_url() {
        let body = hits(&["https://cdn/stable.jpg"]);
        let (base, server) = serve(vec![body.clone(), body]);
        let client = PixabayClient::new(Some("px".into())).with_base_url(base);

        let first = client.resolve_visual("city skyline").await;
        let second = client.resolve_visual("city skyline").await;
        assert_eq!(first, second);
        assert!(first.is_some());
        server.join().unwrap();
    }

    #[tokio::test]
    async fn missing_key_or_server_error_yields_none() {
        let client = PixabayClient::new(None);
        assert!(client.resolve_visual("anything").await.is_none());
        assert!(matches!(
            client.try_resolve("anything").await,
            Err(VisualResolutionError::MissingApiKey)
        ));

        let client = PixabayClient::new(Some("px".into())).with_base_url("http://127.0.0.1:9/api/");
        assert!(client.resolve_visual("anything").await.is_none());
    }
}
