//! Page fetching: direct HTTP and headless-browser back-ends behind one
//! retrying front door.

mod browser;
mod http;

pub use browser::BrowserFetcher;
pub use http::HttpFetcher;

use crate::error::{EngineError, EngineResult};
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;

/// Either back-end the job config can select.
pub enum Fetcher {
    Http(HttpFetcher),
    Browser(BrowserFetcher),
}

impl Fetcher {
    async fn fetch_once(&self, url: &str) -> EngineResult<String> {
        match self {
            Fetcher::Http(f) => f.fetch_once(url).await,
            Fetcher::Browser(f) => f.fetch_once(url).await,
        }
    }

    /// Release back-end resources at job teardown; a no-op for the direct
    /// HTTP back-end, which owns nothing beyond its `reqwest::Client`.
    pub async fn shutdown(&self) {
        if let Fetcher::Browser(f) = self {
            f.shutdown().await;
        }
    }

    /// Three attempts total with exponential backoff. The final failure
    /// propagates to the caller unchanged.
    pub async fn fetch_with_retry(&self, url: &str) -> EngineResult<String> {
        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt + 1 < MAX_ATTEMPTS => {
                    let delay: Duration = EngineError::backoff_for_attempt(attempt);
                    log::warn!(
                        "fetch attempt {} for {url} failed ({e}); retrying in {delay:?}",
                        attempt + 1
                    );
                    tokio::time::sleep(delay).await;
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| EngineError::Retryable("exhausted retries".into())))
    }
}
