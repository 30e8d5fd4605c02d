//! Scripted provider doubles for pipeline tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use crate::llm::{CompletionClient, LlmError, ResponseFormat, Tier};
use crate::tavily::{SearchHit, WebSearch, WebSearchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Call {
    Prime,
    Decompose,
    Synthesize,
    Validate,
    Evaluate,
    Quick,
}

impl Call {
    fn classify(prompt: &str) -> Self {
        const MARKERS: [(&str, Call); 6] = [
            ("Sketch a preliminary answer", Call::Prime),
            ("Break down this question", Call::Decompose),
            ("Write the final answer", Call::Synthesize),
            ("Review and polish this answer", Call::Validate),
            ("Evaluate this answer", Call::Evaluate),
            ("Answer the question using the web search results", Call::Quick),
        ];
        MARKERS
            .iter()
            .find(|(marker, _)| prompt.contains(marker))
            .map(|(_, call)| *call)
            .unwrap_or_else(|| panic!("unrecognized prompt: {prompt}"))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub call: Call,
    pub prompt: String,
    pub format: ResponseFormat,
    pub tier: Tier,
}

/// Replies per call kind from a queue; unscripted calls get a canned reply.
#[derive(Default)]
pub(crate) struct ScriptedLlm {
    replies: Mutex<HashMap<Call, VecDeque<Result<String, LlmError>>>>,
    calls: Mutex<Vec<Recorded>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, call: Call, text: impl Into<String>) -> Self {
        self.push(call, Ok(text.into()))
    }

    pub fn fail(self, call: Call, err: LlmError) -> Self {
        self.push(call, Err(err))
    }

    /// Queues one evaluation reply per score.
    pub fn scores(mut self, scores: &[u8]) -> Self {
        for score in scores {
            self = self.reply(Call::Evaluate, evaluation_json(*score));
        }
        self
    }

    fn push(self, call: Call, reply: Result<String, LlmError>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(call)
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().iter().filter(|r| r.call == call).count()
    }

    pub fn prompts(&self, call: Call) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|r| r.call == call)
            .map(|r| r.prompt)
            .collect()
    }
}

impl CompletionClient for ScriptedLlm {
    async fn complete(
        &self,
        prompt: &str,
        format: ResponseFormat,
        tier: Tier,
    ) -> Result<String, LlmError> {
        let call = Call::classify(prompt);
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Recorded {
                call,
                prompt: prompt.to_string(),
                format,
                tier,
            });
            calls.iter().filter(|r| r.call == call).count()
        };

        let scripted = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&call)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| Ok(canned_reply(call, n)))
    }
}

fn canned_reply(call: Call, n: usize) -> String {
    match call {
        Call::Prime => "Known: nothing yet".into(),
        Call::Decompose => serde_json::json!({
            "sub_questions": ["first facet", "second facet"],
            "reasoning": "split by facet"
        })
        .to_string(),
        Call::Synthesize => format!("draft #{n}"),
        Call::Validate => format!("answer #{n}"),
        Call::Evaluate => evaluation_json(8),
        Call::Quick => "quick answer".into(),
    }
}

pub(crate) fn evaluation_json(score: u8) -> String {
    serde_json::json!({
        "score": score,
        "feedback": format!("scored {score}"),
        "detailed": {
            "strengths": ["clear structure"],
            "weaknesses": [format!("weakness at {score}")],
            "improvements": ["cite more sources"]
        }
    })
    .to_string()
}

/// Serves hits per query, counting provider calls.
#[derive(Default)]
pub(crate) struct ScriptedSearch {
    hits: HashMap<String, Vec<SearchHit>>,
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, query: &str, urls: &[&str]) -> Self {
        let hits = urls
            .iter()
            .map(|url| SearchHit {
                title: format!("Page {url}"),
                url: url.to_string(),
                content: format!("content of {url}"),
            })
            .collect();
        self.hits.insert(query.to_string(), hits);
        self
    }

    pub fn failing(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl WebSearch for ScriptedSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, WebSearchError> {
        self.calls.lock().unwrap().push(query.to_string());
        if self.failing.contains(query) {
            return Err(WebSearchError::RateLimited);
        }
        Ok(self.hits.get(query).cloned().unwrap_or_else(|| {
            vec![SearchHit {
                title: query.to_string(),
                url: format!("https://search.test/{}", query.replace(' ', "-")),
                content: format!("about {query}"),
            }]
        }))
    }
}
