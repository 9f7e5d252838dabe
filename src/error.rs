//! Error taxonomy for the scrape engine.
//!
//! Every failure path in the engine resolves to one of these variants so
//! that drivers (`drivers::pagination`, `drivers::list`) can decide whether
//! to retry, record a `blocked` stat, or abandon a chain without inspecting
//! string messages.

use std::time::Duration;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// HTTP 403/429/5xx, network error, or navigation timeout. Retried up to
    /// three times by the fetcher before the driver gives up on the URL.
    #[error("retryable fetch failure: {0}")]
    Retryable(String),

    /// Misconfiguration that cannot be recovered from within a run (no
    /// session, no base URL for pagination mode).
    #[error("fatal configuration error: {0}")]
    Fatal(String),

    /// Robots policy disallowed the URL.
    #[error("blocked by robots policy")]
    Blocked,

    /// OAuth token acquisition or refresh failed.
    #[error("authentication failure: {0}")]
    Auth(String),

    /// Selector resolution or transformer application failed on a fetched
    /// document.
    #[error("extraction failure: {0}")]
    Parse(String),

    /// Checkpoint store I/O failure. Callers log and swallow this; it is
    /// never allowed to abort a run (worst case is replay after crash).
    #[error("checkpoint store error: {0}")]
    Checkpoint(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Transient fetch errors are retried by the fetcher; everything else is
    /// terminal for the URL that produced it.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Retryable(_))
    }

    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Fatal(_))
    }

    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self, EngineError::Blocked)
    }

    /// Exponential backoff window for a given retry attempt (0-based),
    /// bounded to the 2-10s range the fetcher's retry policy specifies.
    #[must_use]
    pub fn backoff_for_attempt(attempt: u32) -> Duration {
        let secs = 2u64.saturating_mul(1u64 << attempt.min(2));
        Duration::from_secs(secs.min(10))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be >= {min}, got {actual}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        actual: i64,
    },
    #[error("base_url is required in pagination mode")]
    MissingBaseUrl,
    #[error("start_urls must be non-empty in list mode")]
    EmptyStartUrls,
    #[error("invalid selector expression ({kind}): {value}")]
    InvalidSelector { kind: &'static str, value: String },
}
