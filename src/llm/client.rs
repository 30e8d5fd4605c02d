use std::env;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::{ApiError, ChatMessage, ChatRequest, ChatResponse, ResponseFormatSpec};
use crate::config::{ConfigError, non_empty};
use crate::provider::{ApiKey, Transient, retry_transient};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
const DEFAULT_STANDARD_MODEL: &str = "gpt-4o-mini";
const DEFAULT_QUICK_MODEL: &str = "llama-3.1-8b-instant";
const TEMPERATURE: f64 = 0.2;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM API rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("LLM API rejected credentials: {0}")]
    Unauthorized(String),

    #[error("LLM API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("LLM returned an empty completion")]
    EmptyCompletion,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Which provider endpoint serves a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// General-purpose model.
    Standard,
    /// Faster, cheaper model.
    Quick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    Json,
}

impl ResponseFormat {
    fn spec(self) -> ResponseFormatSpec {
        let kind = match self {
            ResponseFormat::Text => "text",
            ResponseFormat::Json => "json_object",
        };
        ResponseFormatSpec { kind }
    }
}

/// Single-turn text completion.
/// Implemented by `ChatClient` for production; scripted mocks are used in tests.
pub trait CompletionClient {
    async fn complete(
        &self,
        prompt: &str,
        format: ResponseFormat,
        tier: Tier,
    ) -> Result<String, LlmError>;
}

#[derive(Debug, Clone)]
struct Endpoint {
    base_url: String,
    api_key: ApiKey,
    model: String,
}

struct EndpointVars {
    key: &'static str,
    base_url: &'static str,
    model: &'static str,
}

impl Endpoint {
    fn from_lookup(
        lookup: &impl Fn(&str) -> Option<String>,
        vars: EndpointVars,
        default_base: &str,
        default_model: &str,
    ) -> Option<Self> {
        let api_key = non_empty(lookup, vars.key)?;
        Some(Self {
            base_url: non_empty(lookup, vars.base_url)
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| default_base.to_string()),
            api_key: ApiKey::new(api_key),
            model: non_empty(lookup, vars.model).unwrap_or_else(|| default_model.to_string()),
        })
    }
}

/// Chat completion client over two OpenAI-compatible endpoints.
///
/// Configuration via environment variables:
/// - `OPENAI_API_KEY` (required), `OPENAI_BASE_URL`, `OPENAI_MODEL`: standard tier
/// - `GROQ_API_KEY`, `GROQ_BASE_URL`, `GROQ_MODEL`: quick tier; without a key,
///   quick calls go to the standard endpoint
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    standard: Endpoint,
    quick: Option<Endpoint>,
}

impl ChatClient {
    pub fn from_env(http: Client) -> Result<Self, ConfigError> {
        Self::from_lookup(http, |name| env::var(name).ok())
    }

    pub fn from_lookup(
        http: Client,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let standard = Endpoint::from_lookup(
            &lookup,
            EndpointVars {
                key: "OPENAI_API_KEY",
                base_url: "OPENAI_BASE_URL",
                model: "OPENAI_MODEL",
            },
            OPENAI_API_BASE,
            DEFAULT_STANDARD_MODEL,
        )
        .ok_or(ConfigError::MissingVar("OPENAI_API_KEY"))?;

        let quick = Endpoint::from_lookup(
            &lookup,
            EndpointVars {
                key: "GROQ_API_KEY",
                base_url: "GROQ_BASE_URL",
                model: "GROQ_MODEL",
            },
            GROQ_API_BASE,
            DEFAULT_QUICK_MODEL,
        );
        if quick.is_none() {
            warn!("GROQ_API_KEY not set; quick tier will use the standard endpoint");
        }

        Ok(Self {
            http,
            standard,
            quick,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_urls(http: Client, standard: &str, quick: Option<&str>) -> Self {
        let endpoint = |base: &str, model: &str| Endpoint {
            base_url: base.to_string(),
            api_key: ApiKey::new("test-key"),
            model: model.to_string(),
        };
        Self {
            http,
            standard: endpoint(standard, DEFAULT_STANDARD_MODEL),
            quick: quick.map(|q| endpoint(q, DEFAULT_QUICK_MODEL)),
        }
    }

    fn endpoint(&self, tier: Tier) -> &Endpoint {
        match tier {
            Tier::Quick => self.quick.as_ref().unwrap_or(&self.standard),
            Tier::Standard => &self.standard,
        }
    }

    async fn chat(
        &self,
        endpoint: &Endpoint,
        prompt: &str,
        format: ResponseFormat,
    ) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", endpoint.base_url);

        let request = ChatRequest {
            model: &endpoint.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
            response_format: format.spec(),
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(endpoint.api_key.expose())
            .header("User-Agent", crate::USER_AGENT)
            .json(&request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!(model = %endpoint.model, "LLM API rate limited");
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ChatResponse>(&text)
                .ok()
                .and_then(|body| body.error)
                .map(|err| describe_api_error(&err))
                .unwrap_or_else(|| {
                    let end = text.floor_char_boundary(200);
                    format!("HTTP {status}: {}", &text[..end])
                });
            warn!(status = %status, model = %endpoint.model, "LLM API error");
            return Err(classify_status(status.as_u16(), message));
        }

        let body: ChatResponse = response.json().await?;
        if let Some(err) = &body.error {
            let message = describe_api_error(err);
            warn!(error = %message, "LLM API error in 200 response");
            return Err(LlmError::Api { code: 200, message });
        }

        let text = body.first_text().ok_or(LlmError::EmptyCompletion)?;
        debug!(model = %endpoint.model, chars = text.len(), "completion received");
        Ok(text.to_string())
    }
}

impl CompletionClient for ChatClient {
    async fn complete(
        &self,
        prompt: &str,
        format: ResponseFormat,
        tier: Tier,
    ) -> Result<String, LlmError> {
        let endpoint = self.endpoint(tier);
        retry_transient("completion", move || self.chat(endpoint, prompt, format)).await
    }
}

impl Transient for LlmError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited
                | LlmError::Api {
                    code: 500..=599,
                    ..
                }
        )
    }
}

fn classify_status(code: u16, message: String) -> LlmError {
    match code {
        429 => LlmError::RateLimited,
        401 | 403 => LlmError::Unauthorized(message),
        _ => LlmError::Api { code, message },
    }
}

fn describe_api_error(err: &ApiError) -> String {
    let message = err.message.as_deref().unwrap_or("Unknown error");
    match &err.kind {
        Some(kind) => format!("{kind}: {message}"),
        None => message.to_string(),
    }
}
