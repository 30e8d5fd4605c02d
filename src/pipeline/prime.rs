use crate::llm::{CompletionClient, LlmError, ResponseFormat, Tier};

fn prompt(today: &str, query: &str) -> String {
    format!(
        r#"Today is {today}. Sketch a preliminary answer to this question:
{query}

Include:
1. Key points you already know
2. Data that still needs to be looked up
3. A suggested structure for the final answer

Example for "NVIDIA's 2024 financial report":
- Known: NVIDIA dominates the AI chip market
- Needed: Q4 revenue growth rate, net profit margin
- Structure: Market context -> Financial numbers -> Analyst opinions"#
    )
}

/// Unsourced first take on the query, used as a hint for synthesis.
pub async fn sketch(
    llm: &impl CompletionClient,
    today: &str,
    query: &str,
    tier: Tier,
) -> Result<String, LlmError> {
    llm.complete(&prompt(today, query), ResponseFormat::Text, tier)
        .await
}
