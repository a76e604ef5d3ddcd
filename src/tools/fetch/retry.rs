use crate::engine::PageFetcher;
use crate::error::FetchError;
use crate::types::Page;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::warn;

const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_JITTER_MS: u64 = 250;
const BACKOFF_MAX_MS: u64 = 8_000;

/// Random-ish jitter in milliseconds within [0, range).
pub(crate) fn jitter_ms(range: u64) -> u64 {
    if range == 0 {
        return 0;
    }
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_nanos(0));
    let nanos = now.subsec_nanos() as u64;
    let micros = (now.as_micros() & 0xFFFF) as u64;
    (nanos ^ (micros << 5)) % range
}

/// Exponential delay before retry number `attempt` (1-based), capped, plus jitter.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
    Duration::from_millis(exp.min(BACKOFF_MAX_MS) + jitter_ms(BACKOFF_JITTER_MS))
}

/// Fetch, retrying only `ConnectionFailed` and `TimedOut` up to `retries` extra times.
///
/// With `retries == 0` this is exactly one attempt.
pub async fn fetch_with_retry<F>(fetcher: &F, url: &str, retries: u32) -> Result<Page, FetchError>
where
    F: PageFetcher + ?Sized,
{
    let mut attempt = 0u32;
    loop {
        let err = match fetcher.fetch(url).await {
            Ok(page) => return Ok(page),
            Err(e) => e,
        };

        if !err.is_transient() || attempt >= retries {
            return Err(err);
        }

        attempt += 1;
        let delay = backoff_delay(attempt);
        warn!(url, attempt, error = %err, delay_ms = delay.as_millis() as u64, "retrying fetch");
        tokio::time::sleep(delay).await;
    }
}
