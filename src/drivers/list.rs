//! Queue + worker-pool list driver.

use super::{DriverContext, FetchOutcome};
use crate::stats::StatsEvent;
use rand::Rng;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;

pub struct ListDriver {
    ctx: DriverContext,
    concurrency: u32,
}

impl ListDriver {
    #[must_use]
    pub fn new(ctx: DriverContext, concurrency: u32) -> Self {
        Self { ctx, concurrency }
    }

    /// Run `concurrency` workers against the deduplicated, not-yet-done
    /// union of `seeds` and `recovered` (URLs left `in_progress` by a
    /// prior, interrupted run). Returns the URLs that failed terminally.
    pub async fn run(&self, seeds: &[String], recovered: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut initial = VecDeque::new();
        for url in seeds.iter().chain(recovered.iter()) {
            if !seen.insert(url.clone()) {
                continue;
            }
            if self.ctx.checkpoint.is_done(url).await {
                self.ctx.stats.record(StatsEvent::PageSkipped);
                continue;
            }
            initial.push_back(url.clone());
        }

        let queue = Arc::new(Mutex::new(initial));
        let shutdown = Arc::new(AtomicBool::new(false));
        let failed_urls = Arc::new(Mutex::new(Vec::new()));

        let mut workers = JoinSet::new();
        for _ in 0..self.concurrency.max(1) {
            let ctx = self.ctx.clone();
            let queue = Arc::clone(&queue);
            let shutdown = Arc::clone(&shutdown);
            let failed_urls = Arc::clone(&failed_urls);

            workers.spawn(async move {
                loop {
                    if shutdown.load(Ordering::Relaxed) {
                        break;
                    }
                    let url = {
                        let mut q = queue.lock().unwrap();
                        q.pop_front()
                    };
                    let Some(url) = url else {
                        break;
                    };

                    match ctx.fetch_extract_merge(&url).await {
                        Ok(FetchOutcome::Blocked | FetchOutcome::Success { .. }) => {}
                        Err(e) => {
                            if e.is_fatal() {
                                shutdown.store(true, Ordering::Relaxed);
                            }
                            log::warn!("list driver failed on {url}: {e}");
                            ctx.stats.record(StatsEvent::PageError);
                            failed_urls.lock().unwrap().push(url.clone());
                        }
                    }

                    let jitter = rand::rng().random_range(0.5..=1.5);
                    tokio::time::sleep(std::time::Duration::from_secs_f64(jitter)).await;
                }
            });
        }

        while workers.join_next().await.is_some() {}

        Arc::try_unwrap(failed_urls)
            .map(|m| m.into_inner().unwrap())
            .unwrap_or_default()
    }
}
