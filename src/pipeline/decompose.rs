use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{ParseFailure, PipelineError, Stage};
use crate::llm::{CompletionClient, ResponseFormat, Tier};

pub const MIN_SUB_QUESTIONS: usize = 2;
pub const MAX_SUB_QUESTIONS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubQuestionSet {
    pub sub_questions: Vec<String>,
    pub reasoning: String,
}

fn prompt(today: &str, query: &str) -> String {
    format!(
        r#"Today is {today}. Break down this question into 2-4 sub-questions that together cover what a comprehensive answer needs.

Sub-questions may be written in a different language than the original question when that is likely to surface better sources.
Reply with a JSON object in exactly this shape:
{{
    "sub_questions": ["subquestion1", "subquestion2"],
    "reasoning": "step-by-step explanation"
}}

Example input: "How did NVIDIA's Q4 2024 financial performance compare to competitors?"
Example output: {{
    "sub_questions": [
        "NVIDIA Q4 2024 revenue figures",
        "AMD Q4 2024 GPU market share",
        "Analyst comparison of AI chip manufacturers 2024"
    ],
    "reasoning": "Covers financial metrics, market share and expert analysis for a fair comparison"
}}

Example input: "谁是C罗？"
Example output: {{
    "sub_questions": [
        "Who is Cristiano Ronaldo?",
        "What are Cristiano Ronaldo's achievements?",
        "C罗是否访问过中国？"
    ],
    "reasoning": "Mixes English and Chinese queries to reach both international and local coverage"
}}

Question: {query}"#
    )
}

/// Strictly parses a decomposition reply: JSON object, 2 to 4 non-blank sub-questions.
pub fn parse(raw: &str) -> Result<SubQuestionSet, ParseFailure> {
    let fail = |reason: String| ParseFailure::new(Stage::Decompose, raw, reason);

    let mut set: SubQuestionSet = serde_json::from_str(raw).map_err(|e| fail(e.to_string()))?;

    for question in &mut set.sub_questions {
        let trimmed = question.trim();
        if trimmed.is_empty() {
            return Err(fail("blank sub-question".into()));
        }
        if trimmed.len() != question.len() {
            *question = trimmed.to_string();
        }
    }

    match set.sub_questions.len() {
        n if n < MIN_SUB_QUESTIONS => Err(fail(format!(
            "{n} sub-questions, at least {MIN_SUB_QUESTIONS} required"
        ))),
        n if n > MAX_SUB_QUESTIONS => Err(fail(format!(
            "{n} sub-questions, at most {MAX_SUB_QUESTIONS} allowed"
        ))),
        _ => Ok(set),
    }
}

pub async fn decompose(
    llm: &impl CompletionClient,
    today: &str,
    query: &str,
    tier: Tier,
) -> Result<SubQuestionSet, PipelineError> {
    let raw = llm
        .complete(&prompt(today, query), ResponseFormat::Json, tier)
        .await?;
    parse(&raw).map_err(|failure| {
        warn!(reason = %failure.reason, raw = %failure.raw, "decomposition rejected");
        failure.into()
    })
}
