//! Plumbing shared by the provider clients: credential redaction and transient retries.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::debug;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Provider credential; never printed.
#[derive(Clone)]
pub(crate) struct ApiKey(String);

impl ApiKey {
    pub(crate) fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Errors that may succeed when the same request is sent again.
pub(crate) trait Transient {
    fn is_transient(&self) -> bool;
}

/// Runs `request` up to three times, sleeping between attempts, while it fails transiently.
pub(crate) async fn retry_transient<T, E, F, Fut>(operation: &str, mut request: F) -> Result<T, E>
where
    E: Transient,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match request().await {
            Err(e) if e.is_transient() && attempt + 1 < MAX_ATTEMPTS => {
                let delay_ms = jittered_backoff(attempt);
                debug!(
                    operation,
                    attempt = attempt + 1,
                    delay_ms,
                    "retrying after transient error"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Equal jitter backoff: base/2 + rand(0, base/2).
fn jittered_backoff(attempt: u32) -> u64 {
    let base = INITIAL_BACKOFF_MS * 2u64.pow(attempt);
    let half = base / 2;
    half + fastrand::u64(..half.max(1))
}
