//! Sequential pagination chain driver.
//!
//! Strictly sequential: a failure on any intermediate page abandons the
//! chain rather than retrying it at the driver level. Per-request retry
//! still happens inside `Fetcher::fetch_with_retry`.

use super::{DriverContext, FetchOutcome};
use crate::config::{FieldSpec, PaginationSpec, SelectorKind};
use crate::error::EngineResult;
use crate::resolver;
use crate::stats::StatsEvent;
use rand::Rng;
use url::Url;

pub struct PaginationDriver {
    ctx: DriverContext,
    pagination: PaginationSpec,
    min_delay: f64,
    max_delay: f64,
}

impl PaginationDriver {
    #[must_use]
    pub fn new(ctx: DriverContext, pagination: PaginationSpec, min_delay: f64, max_delay: f64) -> Self {
        Self {
            ctx,
            pagination,
            min_delay,
            max_delay,
        }
    }

    /// Walk the chain starting at `start_url` until `max_pages` is
    /// reached, the next-page link is absent, or a page fails.
    pub async fn run(&self, start_url: &str) -> EngineResult<u32> {
        let mut current_url = Some(start_url.to_string());
        let mut pages_scraped = 0u32;

        while let Some(url) = current_url.take() {
            if pages_scraped >= self.pagination.max_pages {
                break;
            }

            let outcome = match self.ctx.fetch_extract_merge(&url).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::warn!("pagination chain abandoned at {url}: {e}");
                    self.ctx.stats.record(StatsEvent::PageError);
                    break;
                }
            };

            let body = match outcome {
                FetchOutcome::Blocked => break,
                FetchOutcome::Success { body } => body,
            };

            pages_scraped += 1;

            if pages_scraped >= self.pagination.max_pages {
                break;
            }

            current_url = self.resolve_next_page(&body, &url);
            if current_url.is_some() {
                self.sleep_between_pages().await;
            }
        }

        Ok(pages_scraped)
    }

    fn resolve_next_page(&self, body: &str, current_url: &str) -> Option<String> {
        let attribute = matches!(self.pagination.selector.kind, SelectorKind::Css).then(|| "href".to_string());
        let field = FieldSpec {
            name: "next_page".to_string(),
            selectors: vec![self.pagination.selector.clone()],
            is_list: false,
            attribute,
            transformers: Vec::new(),
            children: None,
            follow_url: false,
            nested_fields: None,
        };

        let record = resolver::extract(self.ctx.response_type, body, std::slice::from_ref(&field)).ok()?;
        let href = record.get("next_page")?.as_str()?;
        if href.is_empty() {
            return None;
        }

        let base = Url::parse(current_url).ok()?;
        base.join(href).ok().map(|u| u.to_string())
    }

    async fn sleep_between_pages(&self) {
        let secs = rand::rng().random_range(self.min_delay..=self.max_delay);
        tokio::time::sleep(std::time::Duration::from_secs_f64(secs.max(0.0))).await;
    }
}
