use crate::llm::{CompletionClient, LlmError, ResponseFormat, Tier};

fn prompt(today: &str, results: &str, query: &str) -> String {
    format!(
        "Today is {today}. Answer the question using the web search results below.\n\
         {results}\n\n\
         Question: {query}"
    )
}

/// Single uncited completion over one search's results.
pub async fn answer(
    llm: &impl CompletionClient,
    today: &str,
    results: &str,
    query: &str,
    tier: Tier,
) -> Result<String, LlmError> {
    llm.complete(&prompt(today, results, query), ResponseFormat::Text, tier)
        .await
}
