//! Engine orchestrator: resource lifecycle, mode dispatch, shutdown
//! flush, failure accounting.

use crate::auth::TokenManager;
use crate::batcher::Batcher;
use crate::bloom::SeenSet;
use crate::browser_pool::BrowserPool;
use crate::checkpoint::CheckpointStore;
use crate::config::{self, JobConfig, ScrapeMode};
use crate::drivers::list::ListDriver;
use crate::drivers::pagination::PaginationDriver;
use crate::drivers::DriverContext;
use crate::error::{EngineError, EngineResult};
use crate::fetcher::{BrowserFetcher, Fetcher, HttpFetcher};
use crate::rate_limiter::RateLimiter;
use crate::robots::RobotsGate;
use crate::stats::{Stats, StatsSnapshot};
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_SEEN_CAPACITY: u64 = 200_000;
const DEFAULT_ERROR_RATE: f64 = 0.001;

/// Summary returned once a job completes, whichever mode it ran in.
#[derive(Debug, Clone)]
pub struct EngineReport {
    pub stats: StatsSnapshot,
    pub failed_urls: Vec<String>,
}

/// One engine per job; construct around a validated `JobConfig` and a pair
/// of per-job paths (checkpoint/bloom directory, output sink file). Two
/// engines must never share either path.
pub struct Engine {
    config: JobConfig,
    data_dir: PathBuf,
    sink_path: PathBuf,
}

impl Engine {
    pub fn new(config: JobConfig, data_dir: PathBuf, sink_path: PathBuf) -> EngineResult<Self> {
        config::validate(&config).map_err(|e| EngineError::Fatal(e.to_string()))?;
        Ok(Self {
            config,
            data_dir,
            sink_path,
        })
    }

    pub async fn run(&self) -> EngineResult<EngineReport> {
        let slug = self.config.slug();
        let checkpoint = Arc::new(
            CheckpointStore::open(&self.data_dir, &slug)
                .await
                .map_err(|e| EngineError::Checkpoint(e.to_string()))?,
        );

        let bloom_path = self.data_dir.join(format!("{slug}.bloom"));
        let mut seen = SeenSet::new(DEFAULT_SEEN_CAPACITY, DEFAULT_ERROR_RATE);
        let _ = seen.load(&bloom_path);

        let stats = Arc::new(Stats::new());
        let batcher = Arc::new(Batcher::new(
            self.config.batch_size,
            self.sink_path.clone(),
            Arc::clone(&stats),
            seen,
        ));

        // Whatever happens below, always flush, persist the seen-set and
        // close the checkpoint before surfacing the run's own error —
        // a teardown failure must never hide the original failure that
        // triggered it.
        let result = self.run_inner(&checkpoint, &batcher, &stats).await;

        if let Err(e) = batcher.flush_remaining().await {
            log::warn!("final flush failed: {e}");
        }
        if let Err(e) = batcher.save_seen_set(&bloom_path).await {
            log::warn!("seen-set save failed: {e}");
        }
        checkpoint.close().await;

        let failed_urls = result?;
        Ok(EngineReport {
            stats: stats.snapshot(),
            failed_urls,
        })
    }

    async fn run_inner(
        &self,
        checkpoint: &Arc<CheckpointStore>,
        batcher: &Arc<Batcher>,
        stats: &Arc<Stats>,
    ) -> EngineResult<Vec<String>> {
        let auth_client = reqwest::Client::new();

        let robots = if self.config.respect_robots_txt {
            let base = self
                .config
                .base_url
                .clone()
                .or_else(|| self.config.start_urls.first().cloned())
                .ok_or_else(|| EngineError::Fatal("respect_robots_txt requires a base_url or start_urls entry".into()))?;
            Arc::new(RobotsGate::fetch(&auth_client, &base).await)
        } else {
            Arc::new(RobotsGate::allow_all())
        };

        let token_manager = self
            .config
            .authentication
            .clone()
            .map(|auth_cfg| TokenManager::new(auth_cfg, auth_client.clone()));

        let fetcher = self.build_fetcher(token_manager).await?;
        let fetcher = Arc::new(fetcher);
        let limiter = Arc::new(RateLimiter::new(self.config.rate_limit));

        let recovered = if self.config.use_checkpointing {
            checkpoint
                .incomplete()
                .await
                .map_err(|e| EngineError::Checkpoint(e.to_string()))?
        } else {
            Vec::new()
        };

        let ctx = DriverContext {
            fetcher: Arc::clone(&fetcher),
            robots,
            limiter,
            checkpoint: Arc::clone(checkpoint),
            batcher: Arc::clone(batcher),
            stats: Arc::clone(stats),
            response_type: self.config.response_type,
            fields: Arc::new(self.config.fields.clone()),
            max_nested_urls: self.config.max_nested_urls,
        };

        let failed_urls = match self.config.mode {
            ScrapeMode::Pagination => {
                let pagination = self
                    .config
                    .pagination
                    .clone()
                    .ok_or_else(|| EngineError::Fatal("pagination mode requires a pagination spec".into()))?;
                let base_url = self
                    .config
                    .base_url
                    .clone()
                    .ok_or_else(|| EngineError::Fatal("pagination mode requires base_url".into()))?;
                let driver = PaginationDriver::new(ctx, pagination, self.config.min_delay, self.config.max_delay);
                driver.run(&base_url).await?;
                Vec::new()
            }
            ScrapeMode::List => {
                let driver = ListDriver::new(ctx, self.config.concurrency);
                driver.run(&self.config.start_urls, &recovered).await
            }
        };

        fetcher.shutdown().await;
        Ok(failed_urls)
    }

    async fn build_fetcher(&self, token_manager: Option<TokenManager>) -> EngineResult<Fetcher> {
        if self.config.use_playwright {
            let pool = BrowserPool::launch(true, None)
                .await
                .map_err(|e| EngineError::Fatal(format!("failed to launch browser: {e}")))?;
            Ok(Fetcher::Browser(BrowserFetcher::new(
                Arc::new(pool),
                self.config.headers.clone(),
                self.config.interactions.clone(),
                self.config.wait_for_selector.clone(),
            )))
        } else {
            let proxy = self.config.proxies.as_ref().and_then(|p| p.first()).map(String::as_str);
            Ok(Fetcher::Http(HttpFetcher::new(
                self.config.headers.clone(),
                proxy,
                token_manager,
                self.config.request_timeout,
                self.config.cookies_file.as_deref(),
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldSpec;
    use tempfile::TempDir;

    fn minimal_config(mode: ScrapeMode) -> JobConfig {
        let mode_str = match mode {
            ScrapeMode::Pagination => "pagination",
            ScrapeMode::List => "list",
        };
        let mut cfg: JobConfig = serde_json::from_value(serde_json::json!({
            "name": "engine-test",
            "mode": mode_str,
            "base_url": "http://127.0.0.1:9/",
            "start_urls": ["http://127.0.0.1:9/"],
            "fields": [],
            "concurrency": 1,
            "rate_limit": 100,
        }))
        .unwrap();
        cfg.fields = vec![FieldSpec::leaf("title", crate::config::Selector::css("h1"))];
        cfg
    }

    #[tokio::test]
    async fn rejects_invalid_config_at_construction() {
        let mut cfg = minimal_config(ScrapeMode::List);
        cfg.start_urls.clear();
        let dir = TempDir::new().unwrap();
        let err = Engine::new(cfg, dir.path().to_path_buf(), dir.path().join("out.jsonl"));
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn list_mode_against_unreachable_host_reports_failed_url() {
        let cfg = minimal_config(ScrapeMode::List);
        let dir = TempDir::new().unwrap();
        let engine = Engine::new(cfg, dir.path().to_path_buf(), dir.path().join("out.jsonl")).unwrap();
        let report = engine.run().await.unwrap();
        assert_eq!(report.failed_urls, vec!["http://127.0.0.1:9/".to_string()]);
        assert_eq!(report.stats.page_error, 1);
    }
}
