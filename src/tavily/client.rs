use std::env;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use super::types::{ErrorBody, SearchHit, SearchRequest, SearchResponse};
use crate::config::{ConfigError, non_empty};
use crate::provider::{ApiKey, Transient, retry_transient};

const API_BASE: &str = "https://api.tavily.com";
const SEARCH_DEPTH: &str = "advanced";
const MAX_RESULTS: u8 = 6;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum WebSearchError {
    #[error("Search API rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("Search API rejected credentials: {0}")]
    Unauthorized(String),

    #[error("Search API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Ranked web search for a single query.
/// Implemented by `TavilyClient` for production; mock implementations used in tests.
pub trait WebSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, WebSearchError>;
}

/// Tavily search client. Reads `TAVILY_API_KEY` (required) and `TAVILY_BASE_URL`.
#[derive(Debug, Clone)]
pub struct TavilyClient {
    http: Client,
    api_key: ApiKey,
    base_url: String,
}

impl TavilyClient {
    pub fn from_env(http: Client) -> Result<Self, ConfigError> {
        Self::from_lookup(http, |name| env::var(name).ok())
    }

    pub fn from_lookup(
        http: Client,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let api_key =
            non_empty(&lookup, "TAVILY_API_KEY").ok_or(ConfigError::MissingVar("TAVILY_API_KEY"))?;
        let base_url = non_empty(&lookup, "TAVILY_BASE_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| API_BASE.to_string());
        Ok(Self {
            http,
            api_key: ApiKey::new(api_key),
            base_url,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey::new("tvly-test"),
            base_url: base_url.to_string(),
        }
    }

    async fn search_once(&self, query: &str) -> Result<Vec<SearchHit>, WebSearchError> {
        let url = format!("{}/search", self.base_url);
        let request = SearchRequest {
            query,
            search_depth: SEARCH_DEPTH,
            max_results: MAX_RESULTS,
            include_answer: true,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .header("User-Agent", crate::USER_AGENT)
            .json(&request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("search API rate limited");
            return Err(WebSearchError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|body| body.detail)
                .map(|detail| detail.message().to_string())
                .unwrap_or_else(|| {
                    let end = text.floor_char_boundary(200);
                    format!("HTTP {status}: {}", &text[..end])
                });
            warn!(status = %status, "search API error");
            return Err(match status.as_u16() {
                401 | 403 => WebSearchError::Unauthorized(message),
                code => WebSearchError::Api { code, message },
            });
        }

        let body: SearchResponse = response.json().await?;
        debug!(
            results = body.results.len(),
            has_answer = body.answer.is_some(),
            "web search complete"
        );
        Ok(body.results)
    }
}

impl WebSearch for TavilyClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, WebSearchError> {
        retry_transient("web search", move || self.search_once(query)).await
    }
}

impl Transient for WebSearchError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            WebSearchError::RateLimited
                | WebSearchError::Api {
                    code: 500..=599,
                    ..
                }
        )
    }
}
