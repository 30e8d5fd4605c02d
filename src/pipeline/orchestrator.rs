use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info};

use super::decompose::{self, SubQuestionSet};
use super::evaluate::{self, EvaluationReport};
use super::synthesize::{self, SynthesisInput};
use super::{JoinStage, PipelineConfig, PipelineError, prime, quick, validate};
use crate::llm::CompletionClient;
use crate::search::{SearchStore, get_or_fetch, unique_sources};
use crate::tavily::WebSearch;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One synthesize → validate → evaluate result.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub answer: String,
    pub score: u8,
    pub feedback: EvaluationReport,
    pub sources: Vec<String>,
}

/// Final package of a full search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub answer: String,
    pub sources: Vec<String>,
    pub evaluation: EvaluationReport,
    /// Synthesis iterations run, at most `max_retries + 1`.
    pub iterations: u32,
}

/// Context and sources gathered once per session.
struct Retrieval {
    context: String,
    sources: Vec<String>,
}

/// Drives decomposition, cached retrieval and the bounded synthesis loop.
///
/// Holds its provider clients and search store; nothing is process-global.
/// The prompt date is captured at construction.
pub struct Orchestrator<L, W> {
    llm: L,
    web: W,
    store: Arc<dyn SearchStore>,
    config: PipelineConfig,
    today: String,
}

impl<L: CompletionClient, W: WebSearch> Orchestrator<L, W> {
    pub fn new(llm: L, web: W, store: Arc<dyn SearchStore>, config: PipelineConfig) -> Self {
        let today = chrono::Local::now().format(DATE_FORMAT).to_string();
        Self {
            llm,
            web,
            store,
            config,
            today,
        }
    }

    pub async fn search(&self, query: &str) -> Result<SearchOutcome, PipelineError> {
        let started = Instant::now();

        let (initial_answer, plan) = tokio::try_join!(self.initial_answer(query), async {
            decompose::decompose(&self.llm, &self.today, query, self.config.tiers.decompose).await
        })
        .map_err(|e| PipelineError::joined(JoinStage::Prepare, e))?;
        info!(
            sub_questions = plan.sub_questions.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query decomposed"
        );
        debug!(reasoning = %plan.reasoning, "decomposition reasoning");

        let retrieval = self.retrieve(&plan).await?;
        info!(
            context_chars = retrieval.context.len(),
            sources = retrieval.sources.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "context retrieved"
        );

        let mut best: Option<Candidate> = None;
        let mut attempts: u32 = 0;
        let best = loop {
            let draft = synthesize::synthesize(
                &self.llm,
                &self.today,
                &SynthesisInput {
                    query,
                    context: &retrieval.context,
                    initial_answer: &initial_answer,
                    feedback: best.as_ref().map(|b| &b.feedback),
                },
                self.config.tiers.synthesize,
            )
            .await?;

            let answer = validate::validate(
                &self.llm,
                &self.today,
                query,
                &draft,
                self.config.tiers.validate,
            )
            .await?;

            let report = self.evaluate(query, &answer).await?;
            let score = report.score;
            info!(
                attempt = attempts + 1,
                score,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "candidate evaluated"
            );

            let current = keep_better(
                best.take(),
                Candidate {
                    answer,
                    score,
                    feedback: report,
                    sources: retrieval.sources.clone(),
                },
            );

            if score >= self.config.quality_threshold || attempts >= self.config.max_retries {
                break current;
            }
            best = Some(current);
            attempts += 1;
        };

        info!(
            iterations = attempts + 1,
            score = best.score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search complete"
        );
        Ok(SearchOutcome {
            answer: best.answer,
            sources: best.sources,
            evaluation: best.feedback,
            iterations: attempts + 1,
        })
    }

    /// One cached search and one completion; no decomposition, validation or scoring.
    pub async fn quick_search(&self, query: &str) -> Result<String, PipelineError> {
        let digest = get_or_fetch(self.store.as_ref(), &self.web, query).await?;
        let answer = quick::answer(
            &self.llm,
            &self.today,
            &digest.text,
            query,
            self.config.tiers.quick_path,
        )
        .await?;
        Ok(answer)
    }

    async fn initial_answer(&self, query: &str) -> Result<String, PipelineError> {
        if !self.config.preliminary_answer {
            return Ok(String::new());
        }
        Ok(prime::sketch(&self.llm, &self.today, query, self.config.tiers.prime).await?)
    }

    async fn evaluate(&self, query: &str, answer: &str) -> Result<EvaluationReport, PipelineError> {
        if self.config.skip_evaluation {
            return Ok(EvaluationReport::skipped());
        }
        evaluate::evaluate(&self.llm, &self.today, query, answer, self.config.tiers.evaluate).await
    }

    /// Searches each distinct sub-question concurrently; any failure aborts the join.
    async fn retrieve(&self, plan: &SubQuestionSet) -> Result<Retrieval, PipelineError> {
        let mut seen = HashSet::new();
        let distinct: Vec<&str> = plan
            .sub_questions
            .iter()
            .map(String::as_str)
            .filter(|q| seen.insert(*q))
            .collect();

        let digests = try_join_all(
            distinct
                .iter()
                .map(|q| get_or_fetch(self.store.as_ref(), &self.web, q)),
        )
        .await
        .map_err(|e| PipelineError::joined(JoinStage::SearchFanOut, e))?;

        let context = digests
            .iter()
            .map(|d| d.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let sources = unique_sources(
            digests.iter().flat_map(|d| d.urls.iter().map(String::as_str)),
            self.config.max_sources,
        );

        Ok(Retrieval { context, sources })
    }
}

/// Strictly better score wins; ties keep the earlier candidate.
fn keep_better(best: Option<Candidate>, candidate: Candidate) -> Candidate {
    match best {
        Some(best) if candidate.score <= best.score => best,
        _ => candidate,
    }
}
