use std::env;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::pipeline::PipelineConfig;

const DEFAULT_CACHE_CAPACITY: NonZeroUsize = NonZeroUsize::new(256).unwrap();
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    MissingVar(&'static str),
}

/// Process settings read from the environment.
///
/// - `SIEVE_CACHE_CAPACITY`: max cached sub-question searches (default 256)
/// - `SIEVE_CACHE_TTL_SECS`: cache entry lifetime, `0` disables expiry (default 3600)
/// - `SIEVE_PRELIMINARY_ANSWER`: sketch an answer before searching (default off)
/// - `SIEVE_SKIP_EVALUATION`: accept the first candidate unscored (default off)
#[derive(Debug, Clone)]
pub struct Settings {
    pub cache_capacity: NonZeroUsize,
    pub cache_ttl: Option<Duration>,
    pub pipeline: PipelineConfig,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let cache_capacity = parse_or(&lookup, "SIEVE_CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY);
        let ttl_secs = parse_or(&lookup, "SIEVE_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS);
        let cache_ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs));

        let pipeline = PipelineConfig {
            preliminary_answer: flag(&lookup, "SIEVE_PRELIMINARY_ANSWER"),
            skip_evaluation: flag(&lookup, "SIEVE_SKIP_EVALUATION"),
            ..PipelineConfig::default()
        };

        Self {
            cache_capacity,
            cache_ttl,
            pipeline,
        }
    }
}

/// Trimmed, non-empty value of `name`.
pub(crate) fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T {
    match non_empty(lookup, name) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(var = name, value = %raw, "ignoring unparsable setting, using default");
            default
        }),
        None => default,
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> bool {
    non_empty(lookup, name)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
