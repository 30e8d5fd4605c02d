mod errors;
mod params;

pub use params::{QuickSearchParams, SearchParams};

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use tracing::{info, warn};

use errors::{config_to_mcp_error, pipeline_failure};

use crate::config::{ConfigError, Settings};
use crate::llm::ChatClient;
use crate::markdown::render_outcome;
use crate::pipeline::Orchestrator;
use crate::search::LruStore;
use crate::tavily::TavilyClient;

/// TCP connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Global HTTP client timeout; provider clients set tighter per-request limits.
const HTTP_TIMEOUT: Duration = Duration::from_secs(90);
const MAX_REDIRECTS: usize = 5;

type Pipeline = Orchestrator<ChatClient, TavilyClient>;

/// MCP server handler exposing the answer pipeline.
///
/// Configuration via environment variables (see `Settings`, `ChatClient`, `TavilyClient`):
/// - `OPENAI_API_KEY`, `TAVILY_API_KEY`: required for both tools
/// - `GROQ_API_KEY`: optional quick tier
#[derive(Clone)]
pub struct Sieve {
    pipeline: Result<Arc<Pipeline>, ConfigError>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl Sieve {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(HTTP_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        let pipeline = build_pipeline(http, Settings::from_env())
            .inspect_err(|e| warn!("search pipeline not available: {e}"))
            .map(Arc::new);
        Ok(Self {
            pipeline,
            tool_router: Self::tool_router(),
        })
    }

    fn pipeline(&self) -> Result<&Pipeline, McpError> {
        self.pipeline
            .as_deref()
            .map_err(config_to_mcp_error)
    }

    #[tool(
        name = "search",
        description = "Answer a question with web research. In the default \"universal\" mode the question is split into sub-questions, each is searched on the web, and a cited markdown answer is drafted, polished and scored, retrying up to twice until it passes a quality bar. Returns the answer, its sources and the evaluation. Any other mode answers from a single web search without citations."
    )]
    async fn search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        if params.query.trim().is_empty() {
            return Err(McpError::invalid_params("query must not be empty", None));
        }

        let universal = params.is_universal();
        info!(query = %params.query, universal, "tool:search");

        let pipeline = self.pipeline()?;

        if !universal {
            return Ok(match pipeline.quick_search(&params.query).await {
                Ok(answer) => CallToolResult::success(vec![Content::text(answer)]),
                Err(e) => pipeline_failure(e),
            });
        }

        let outcome = match pipeline.search(&params.query).await {
            Ok(outcome) => outcome,
            Err(e) => return Ok(pipeline_failure(e)),
        };

        Ok(CallToolResult::success(vec![
            Content::text(render_outcome(&outcome)),
            Content::json(&outcome)?,
        ]))
    }

    #[tool(
        name = "quick_search",
        description = "Fast answer from a single web search and one LLM call. No sub-questions, citations check or quality scoring; use `search` when accuracy matters."
    )]
    async fn quick_search(
        &self,
        Parameters(params): Parameters<QuickSearchParams>,
    ) -> Result<CallToolResult, McpError> {
        if params.query.trim().is_empty() {
            return Err(McpError::invalid_params("query must not be empty", None));
        }

        info!(query = %params.query, "tool:quick_search");

        let pipeline = self.pipeline()?;
        Ok(match pipeline.quick_search(&params.query).await {
            Ok(answer) => CallToolResult::success(vec![Content::text(answer)]),
            Err(e) => pipeline_failure(e),
        })
    }
}

fn build_pipeline(http: Client, settings: Settings) -> Result<Pipeline, ConfigError> {
    let llm = ChatClient::from_env(http.clone())?;
    let web = TavilyClient::from_env(http)?;
    let store = Arc::new(LruStore::new(settings.cache_capacity, settings.cache_ttl));
    Ok(Orchestrator::new(llm, web, store, settings.pipeline))
}

#[tool_handler]
impl ServerHandler for Sieve {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "sieve".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "sieve answers questions from live web research: `search` returns a cited, self-evaluated answer; `quick_search` returns a fast uncited one."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineConfig;
    use std::num::NonZeroUsize;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sieve_without_keys() -> Sieve {
        Sieve {
            pipeline: Err(ConfigError::MissingVar("OPENAI_API_KEY")),
            tool_router: Sieve::tool_router(),
        }
    }

    fn sieve_with(llm_uri: &str, search_uri: &str) -> Sieve {
        let http = Client::new();
        let pipeline = Orchestrator::new(
            ChatClient::with_base_urls(http.clone(), llm_uri, None),
            TavilyClient::with_base_url(http, search_uri),
            Arc::new(LruStore::new(NonZeroUsize::new(8).unwrap(), None)),
            PipelineConfig::default(),
        );
        Sieve {
            pipeline: Ok(Arc::new(pipeline)),
            tool_router: Sieve::tool_router(),
        }
    }

    fn completion(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": text}}]
        }))
    }

    async fn mount_stage(server: &MockServer, marker: &str, reply: &str) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains(marker))
            .respond_with(completion(reply))
            .mount(server)
            .await;
    }

    async fn mount_search(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"title": "Paris", "url": "https://en.wikipedia.org/wiki/Paris", "content": "Paris is the capital of France."},
                    {"title": "France", "url": "https://www.france.fr", "content": "Official tourism site."}
                ]
            })))
            .mount(server)
            .await;
    }

    fn text_of(result: &CallToolResult, index: usize) -> &str {
        &result.content[index].as_text().unwrap().text
    }

    #[tokio::test]
    async fn search_rejects_empty_query() {
        let s = sieve_without_keys();
        let params = Parameters(SearchParams {
            query: "   ".into(),
            mode: None,
        });
        let err = s.search(params).await.unwrap_err();
        assert!(err.message.contains("empty"), "got: {}", err.message);
    }

    #[tokio::test]
    async fn quick_search_rejects_empty_query() {
        let s = sieve_without_keys();
        let params = Parameters(QuickSearchParams { query: String::new() });
        let err = s.quick_search(params).await.unwrap_err();
        assert!(err.message.contains("empty"), "got: {}", err.message);
    }

    #[tokio::test]
    async fn search_without_keys_reports_missing_config() {
        let s = sieve_without_keys();
        let params = Parameters(SearchParams {
            query: "capital of France".into(),
            mode: None,
        });
        let err = s.search(params).await.unwrap_err();
        assert!(err.message.contains("OPENAI_API_KEY"), "got: {}", err.message);
        assert_eq!(err.code, rmcp::model::ErrorCode::INTERNAL_ERROR);
    }

    #[tokio::test]
    async fn universal_search_runs_full_pipeline() {
        let llm = MockServer::start().await;
        let web = MockServer::start().await;
        mount_search(&web).await;
        mount_stage(
            &llm,
            "Break down this question",
            r#"{"sub_questions": ["capital of France", "Paris facts"], "reasoning": "two facets"}"#,
        )
        .await;
        mount_stage(&llm, "Write the final answer", "draft").await;
        mount_stage(
            &llm,
            "Review and polish this answer",
            "Paris is the capital. [1](https://en.wikipedia.org/wiki/Paris)",
        )
        .await;
        mount_stage(
            &llm,
            "Evaluate this answer",
            r#"{"score": 9, "feedback": "Well cited", "detailed": {"strengths": [], "weaknesses": [], "improvements": []}}"#,
        )
        .await;

        let s = sieve_with(&llm.uri(), &web.uri());
        let result = s
            .search(Parameters(SearchParams {
                query: "What is the capital of France?".into(),
                mode: None,
            }))
            .await
            .unwrap();

        assert_ne!(result.is_error, Some(true));
        let text = text_of(&result, 0);
        assert!(text.starts_with("Paris is the capital."), "got: {text}");
        assert!(text.contains("https://www.france.fr"));
        assert!(text.contains("Quality score: 9/10"));

        let json: serde_json::Value = serde_json::from_str(text_of(&result, 1)).unwrap();
        assert_eq!(json["evaluation"]["score"], 9);
        assert_eq!(json["sources"].as_array().unwrap().len(), 2);

        let searches = web.received_requests().await.unwrap();
        assert_eq!(searches.len(), 2);
    }

    #[tokio::test]
    async fn malformed_decomposition_returns_fixed_apology() {
        let llm = MockServer::start().await;
        let web = MockServer::start().await;
        mount_search(&web).await;
        mount_stage(&llm, "Break down this question", "Sure! Here are some ideas.").await;

        let s = sieve_with(&llm.uri(), &web.uri());
        let result = s
            .search(Parameters(SearchParams {
                query: "q".into(),
                mode: None,
            }))
            .await
            .unwrap();

        assert_eq!(result.is_error, Some(true));
        let text = text_of(&result, 0);
        assert!(text.starts_with("Sorry"), "got: {text}");
        assert!(!text.contains("Sure! Here are some ideas."));
        assert!(web.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_universal_mode_uses_quick_path() {
        let llm = MockServer::start().await;
        let web = MockServer::start().await;
        mount_search(&web).await;
        mount_stage(
            &llm,
            "Answer the question using the web search results",
            "Paris.",
        )
        .await;

        let s = sieve_with(&llm.uri(), &web.uri());
        let result = s
            .search(Parameters(SearchParams {
                query: "capital of France".into(),
                mode: Some("quick".into()),
            }))
            .await
            .unwrap();

        assert_eq!(text_of(&result, 0), "Paris.");
        assert_eq!(result.content.len(), 1);
        assert_eq!(web.received_requests().await.unwrap().len(), 1);
        assert_eq!(llm.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn quick_search_tool_returns_plain_answer() {
        let llm = MockServer::start().await;
        let web = MockServer::start().await;
        mount_search(&web).await;
        mount_stage(
            &llm,
            "Answer the question using the web search results",
            "Paris is the capital of France.",
        )
        .await;

        let s = sieve_with(&llm.uri(), &web.uri());
        let result = s
            .quick_search(Parameters(QuickSearchParams {
                query: "capital of France".into(),
            }))
            .await
            .unwrap();

        assert_eq!(text_of(&result, 0), "Paris is the capital of France.");
        assert_eq!(llm.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn quick_search_provider_failure_is_apology() {
        let llm = MockServer::start().await;
        let web = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&web)
            .await;

        let s = sieve_with(&llm.uri(), &web.uri());
        let result = s
            .quick_search(Parameters(QuickSearchParams { query: "q".into() }))
            .await
            .unwrap();

        assert_eq!(result.is_error, Some(true));
        assert!(text_of(&result, 0).starts_with("Sorry"));
        assert!(llm.received_requests().await.unwrap().is_empty());
    }
}
