use super::EvaluationReport;
use crate::llm::{CompletionClient, LlmError, ResponseFormat, Tier};

pub struct SynthesisInput<'a> {
    pub query: &'a str,
    pub context: &'a str,
    pub initial_answer: &'a str,
    /// Evaluation of the best earlier draft, present on retries.
    pub feedback: Option<&'a EvaluationReport>,
}

fn prompt(today: &str, input: &SynthesisInput<'_>) -> String {
    let SynthesisInput {
        query,
        context,
        initial_answer,
        feedback,
    } = input;

    let revision = feedback
        .map(|report| {
            format!(
                "[Feedback On A Previous Draft]\n{}\nAddress every weakness listed above.\n",
                report.as_revision_notes()
            )
        })
        .unwrap_or_default();

    format!(
        r#"Today is {today}. Write the final answer by combining these elements:

[Question]
{query}

[Initial Analysis by LLM (may be inaccurate)]
{initial_answer}

[Research Context]
{context}

{revision}
Requirements:
1. Use markdown formatting
2. Cite sources inline as [n](url), where n is the source's number in the reference list
3. Include concrete data points from the research context
4. Current date: {today}
5. Answer in the same language as the question
6. End with a ## References list numbered in the order sources are first cited

Example structure:
## Overview
Market context... [1](https://...)

## Financial Performance
- Q4 Revenue: $22.1B [1](https://...)
- Net Margin: 56% [2](https://...)

## Analysis
"The growth reflects..." [3](https://...)

## References
1. [NVIDIA Newsroom](https://...)
2. [Bloomberg](https://...)
3. [Financial Times](https://...)"#
    )
}

/// Cited markdown draft built from the research context.
pub async fn synthesize(
    llm: &impl CompletionClient,
    today: &str,
    input: &SynthesisInput<'_>,
    tier: Tier,
) -> Result<String, LlmError> {
    llm.complete(&prompt(today, input), ResponseFormat::Text, tier)
        .await
}
