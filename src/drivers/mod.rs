//! Crawl drivers: the two strategies that walk a job's URLs through the
//! shared fetch/extract/expand/batch pipeline.

pub mod list;
pub mod pagination;

use crate::batcher::Batcher;
use crate::checkpoint::CheckpointStore;
use crate::config::{FieldSpec, ResponseType};
use crate::error::{EngineError, EngineResult};
use crate::expander::Expander;
use crate::fetcher::Fetcher;
use crate::rate_limiter::RateLimiter;
use crate::resolver;
use crate::robots::RobotsGate;
use crate::stats::{Stats, StatsEvent};
use std::sync::Arc;

/// Everything a driver needs. `Arc`-owned rather than borrowed so worker
/// tasks spawned by the list driver can hold their own `'static` clone; the
/// pagination driver, which never spawns, uses the same type for symmetry.
#[derive(Clone)]
pub struct DriverContext {
    pub fetcher: Arc<Fetcher>,
    pub robots: Arc<RobotsGate>,
    pub limiter: Arc<RateLimiter>,
    pub checkpoint: Arc<CheckpointStore>,
    pub batcher: Arc<Batcher>,
    pub stats: Arc<Stats>,
    pub response_type: ResponseType,
    pub fields: Arc<Vec<FieldSpec>>,
    pub max_nested_urls: usize,
}

/// Outcome of fetching and extracting one URL, shared by both drivers.
pub(crate) enum FetchOutcome {
    Blocked,
    Success { body: String },
}

impl DriverContext {
    /// Steps common to both drivers: robots-check, mark in-progress,
    /// rate-limit, fetch, extract, expand, hand to the batcher, mark done.
    /// Returns the raw body on success so the pagination driver can resolve
    /// its next-page link from it.
    pub(crate) async fn fetch_extract_merge(&self, url: &str) -> EngineResult<FetchOutcome> {
        if !self.robots.is_allowed(url) {
            self.stats.record(StatsEvent::Blocked);
            return Ok(FetchOutcome::Blocked);
        }

        self.checkpoint
            .mark_in_progress(url)
            .await
            .map_err(|e| EngineError::Checkpoint(e.to_string()))?;

        self.limiter.acquire().await;
        let body = self.fetcher.fetch_with_retry(url).await?;

        // Parsing is CPU-bound; keep it off the async I/O loop.
        let response_type = self.response_type;
        let fields = Arc::clone(&self.fields);
        let body_for_parse = body.clone();
        let mut record = tokio::task::spawn_blocking(move || resolver::extract(response_type, &body_for_parse, &fields))
            .await
            .map_err(|e| EngineError::Fatal(format!("extraction task panicked: {e}")))??;
        let expander = Expander::new(
            &self.fetcher,
            &self.robots,
            &self.checkpoint,
            &self.limiter,
            &self.stats,
            self.response_type,
            self.max_nested_urls,
        );
        expander.expand(&self.fields, &mut record, url).await?;

        self.batcher
            .merge(record)
            .await
            .map_err(|e| EngineError::Fatal(format!("sink write failed: {e}")))?;

        self.checkpoint
            .mark_done(url)
            .await
            .map_err(|e| EngineError::Checkpoint(e.to_string()))?;
        self.stats.record(StatsEvent::PageSuccess);

        Ok(FetchOutcome::Success { body })
    }
}
