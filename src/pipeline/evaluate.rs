use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{ParseFailure, PipelineError, Stage};
use crate::llm::{CompletionClient, ResponseFormat, Tier};

pub const MAX_SCORE: u8 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub score: u8,
    pub feedback: String,
    #[serde(default)]
    pub detailed: EvaluationDetail,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationDetail {
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
}

/// Wire shape; the score may arrive as a float.
#[derive(Deserialize)]
struct RawEvaluation {
    score: f64,
    feedback: String,
    #[serde(default)]
    detailed: EvaluationDetail,
}

impl EvaluationReport {
    /// Report used when evaluation is turned off: passes the quality gate outright.
    pub fn skipped() -> Self {
        Self {
            score: MAX_SCORE,
            feedback: "Skipped evaluation".into(),
            detailed: EvaluationDetail::default(),
        }
    }

    /// Plain-text rendering handed back to the synthesizer on a retry.
    pub fn as_revision_notes(&self) -> String {
        let mut notes = format!("Score {}/{MAX_SCORE}: {}", self.score, self.feedback);
        let sections = [
            ("Weaknesses", &self.detailed.weaknesses),
            ("Suggested improvements", &self.detailed.improvements),
        ];
        for (heading, items) in sections {
            if items.is_empty() {
                continue;
            }
            notes.push_str(&format!("\n{heading}:"));
            for item in items {
                notes.push_str(&format!("\n- {item}"));
            }
        }
        notes
    }
}

fn prompt(today: &str, query: &str, answer: &str) -> String {
    format!(
        r#"Today is {today}. Evaluate this answer against these criteria:
1. Factual accuracy (check against known facts)
2. Source citation quality (markdown links [title](url))
3. Structure (clear sections with headings)

If the question concerns time-sensitive or ongoing events, such as the latest news, do not judge factual accuracy; score only structure and citation quality.

Reply with a JSON object in exactly this shape:
{{
    "score": 0-10,
    "feedback": "summary of evaluation",
    "detailed": {{
        "strengths": ["list"],
        "weaknesses": ["list"],
        "improvements": ["suggestions"]
    }}
}}

Example evaluation:
{{
    "score": 8,
    "feedback": "Accurate data but needs better source organization",
    "detailed": {{
        "strengths": ["Correct revenue figures", "Good market context"],
        "weaknesses": ["Missing Q4 comparisons", "Uncited market share data"],
        "improvements": ["Add 2023 vs 2024 growth rates", "Link to official financial reports"]
    }}
}}

Question: {query}
Answer: {answer}"#
    )
}

/// Strictly parses an evaluation reply; the score must lie in 0..=10.
pub fn parse(raw: &str) -> Result<EvaluationReport, ParseFailure> {
    let fail = |reason: String| ParseFailure::new(Stage::Evaluate, raw, reason);

    let parsed: RawEvaluation = serde_json::from_str(raw).map_err(|e| fail(e.to_string()))?;
    if !parsed.score.is_finite() || !(0.0..=f64::from(MAX_SCORE)).contains(&parsed.score) {
        return Err(fail(format!(
            "score {} outside 0-{MAX_SCORE}",
            parsed.score
        )));
    }

    Ok(EvaluationReport {
        score: parsed.score.round() as u8,
        feedback: parsed.feedback,
        detailed: parsed.detailed,
    })
}

pub async fn evaluate(
    llm: &impl CompletionClient,
    today: &str,
    query: &str,
    answer: &str,
    tier: Tier,
) -> Result<EvaluationReport, PipelineError> {
    let raw = llm
        .complete(&prompt(today, query, answer), ResponseFormat::Json, tier)
        .await?;
    parse(&raw).map_err(|failure| {
        warn!(reason = %failure.reason, raw = %failure.raw, "evaluation rejected");
        failure.into()
    })
}
