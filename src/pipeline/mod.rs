//! Answer pipeline: decompose, retrieve, then synthesize/validate/evaluate until the answer passes.

pub mod decompose;
pub mod evaluate;
pub mod orchestrator;
pub mod prime;
pub mod quick;
pub mod synthesize;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;

pub use evaluate::EvaluationReport;
pub use orchestrator::{Orchestrator, SearchOutcome};

use crate::llm::{LlmError, Tier};
use crate::tavily::WebSearchError;

/// Stages whose LLM output must match a JSON schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decompose,
    Evaluate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Decompose => "query decomposition",
            Stage::Evaluate => "answer evaluation",
        })
    }
}

/// LLM output that did not match the expected schema. Keeps the raw text so
/// callers can log it or ask for a new generation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{stage} returned malformed output: {reason}")]
pub struct ParseFailure {
    pub stage: Stage,
    pub raw: String,
    pub reason: String,
}

impl ParseFailure {
    pub(crate) fn new(stage: Stage, raw: &str, reason: impl Into<String>) -> Self {
        Self {
            stage,
            raw: raw.to_string(),
            reason: reason.into(),
        }
    }
}

/// The concurrent joins of a search session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStage {
    /// Preliminary answer alongside decomposition.
    Prepare,
    /// One search per sub-question.
    SearchFanOut,
}

impl fmt::Display for JoinStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JoinStage::Prepare => "preparation",
            JoinStage::SearchFanOut => "search fan-out",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseFailure),

    #[error("LLM provider failed: {0}")]
    Llm(#[from] LlmError),

    #[error("web search provider failed: {0}")]
    WebSearch(#[from] WebSearchError),

    /// A task in a concurrent join failed; sibling results were discarded.
    #[error("{stage} join aborted: {source}")]
    Join {
        stage: JoinStage,
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    pub(crate) fn joined(stage: JoinStage, source: impl Into<PipelineError>) -> Self {
        PipelineError::Join {
            stage,
            source: Box::new(source.into()),
        }
    }

    /// The failure underneath any join wrappers.
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            PipelineError::Join { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Provider tier used by each LLM call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTiers {
    pub prime: Tier,
    pub decompose: Tier,
    pub synthesize: Tier,
    pub validate: Tier,
    pub evaluate: Tier,
    pub quick_path: Tier,
}

impl Default for StageTiers {
    fn default() -> Self {
        Self {
            prime: Tier::Standard,
            decompose: Tier::Standard,
            synthesize: Tier::Quick,
            validate: Tier::Quick,
            evaluate: Tier::Standard,
            quick_path: Tier::Standard,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Retries after the first synthesis; total iterations are `max_retries + 1`.
    pub max_retries: u32,
    /// Score at or above which a candidate ends the loop.
    pub quality_threshold: u8,
    pub max_sources: usize,
    pub preliminary_answer: bool,
    pub skip_evaluation: bool,
    pub tiers: StageTiers,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            quality_threshold: 6,
            max_sources: 5,
            preliminary_answer: false,
            skip_evaluation: false,
            tiers: StageTiers::default(),
        }
    }
}
