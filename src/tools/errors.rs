use rmcp::ErrorData as McpError;
use rmcp::model::{CallToolResult, Content};
use tracing::error;

use crate::config::ConfigError;
use crate::llm::LlmError;
use crate::pipeline::PipelineError;
use crate::tavily::WebSearchError;

pub(super) const GENERIC_APOLOGY: &str =
    "Sorry, something went wrong while researching your question. Please try again later.";
const BUSY_APOLOGY: &str =
    "Sorry, the research service is busy right now. Please try again in a moment.";
const UNREADABLE_APOLOGY: &str =
    "Sorry, I could not make sense of the research results for this question. Please try rephrasing it.";

/// Fixed user-facing message for a pipeline failure. Error detail never reaches the user.
pub(super) fn fallback_message(e: &PipelineError) -> &'static str {
    match e.root_cause() {
        PipelineError::Parse(_) => UNREADABLE_APOLOGY,
        PipelineError::Llm(LlmError::RateLimited)
        | PipelineError::WebSearch(WebSearchError::RateLimited) => BUSY_APOLOGY,
        _ => GENERIC_APOLOGY,
    }
}

/// Logs the full failure and answers with the fixed message as a tool error.
pub(super) fn pipeline_failure(e: PipelineError) -> CallToolResult {
    error!(error = %e, "search pipeline failed");
    CallToolResult::error(vec![Content::text(fallback_message(&e))])
}

/// Server-side misconfiguration; the caller's arguments are not at fault.
pub(super) fn config_to_mcp_error(e: &ConfigError) -> McpError {
    McpError::internal_error(
        format!("{e}: search tools need OPENAI_API_KEY and TAVILY_API_KEY"),
        None,
    )
}
