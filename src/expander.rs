//! Recursive child-URL expansion.
//!
//! Expanded children are stored as extracted records (not raw URL lists)
//! under the parent field's name, each enriched with
//! `_source_url`/`_parent_url`. Recursion follows `nested_fields` to
//! whatever depth the config nests them; the only bound is
//! `max_nested_urls` per expanded field.

use crate::checkpoint::CheckpointStore;
use crate::config::{FieldSpec, ResponseType};
use crate::error::{EngineError, EngineResult};
use crate::fetcher::Fetcher;
use crate::rate_limiter::RateLimiter;
use crate::resolver;
use crate::robots::RobotsGate;
use crate::stats::{Stats, StatsEvent};
use serde_json::{Map, Value};
use url::Url;

pub struct Expander<'a> {
    fetcher: &'a Fetcher,
    robots: &'a RobotsGate,
    checkpoint: &'a CheckpointStore,
    limiter: &'a RateLimiter,
    stats: &'a Stats,
    response_type: ResponseType,
    max_nested_urls: usize,
}

impl<'a> Expander<'a> {
    #[must_use]
    pub fn new(
        fetcher: &'a Fetcher,
        robots: &'a RobotsGate,
        checkpoint: &'a CheckpointStore,
        limiter: &'a RateLimiter,
        stats: &'a Stats,
        response_type: ResponseType,
        max_nested_urls: usize,
    ) -> Self {
        Self {
            fetcher,
            robots,
            checkpoint,
            limiter,
            stats,
            response_type,
            max_nested_urls,
        }
    }

    /// Walk `fields` against an already-extracted `record`, expanding any
    /// `follow_url` node in place. Individual child-URL failures are
    /// logged and skipped; they never abort the parent record.
    pub fn expand<'b>(
        &'b self,
        fields: &'b [FieldSpec],
        record: &'b mut Map<String, Value>,
        parent_url: &'b str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = EngineResult<()>> + Send + 'b>> {
        Box::pin(self.expand_inner(fields, record, parent_url))
    }

    async fn expand_inner(&self, fields: &[FieldSpec], record: &mut Map<String, Value>, parent_url: &str) -> EngineResult<()> {
        for field in fields {
            let Some(nested) = (field.follow_url.then(|| field.nested_fields.as_ref()).flatten()) else {
                continue;
            };
            let raw = record.get(&field.name).cloned().unwrap_or(Value::Null);
            let urls = self.resolve_child_urls(&raw, parent_url);

            let mut children = Vec::new();
            for url in urls.into_iter().take(self.max_nested_urls) {
                match self.expand_one(&url, nested, parent_url).await {
                    Ok(Some(child)) => children.push(child),
                    Ok(None) => {}
                    Err(e) => log::warn!("child-url expansion of {url} failed, skipping: {e}"),
                }
            }

            let merged = if field.is_list {
                Value::Array(children)
            } else {
                children.into_iter().next().unwrap_or(Value::Null)
            };
            record.insert(field.name.clone(), merged);
        }
        Ok(())
    }

    async fn expand_one(&self, url: &str, nested: &[FieldSpec], parent_url: &str) -> EngineResult<Option<Value>> {
        if self.checkpoint.is_done(url).await {
            self.stats.record(StatsEvent::PageSkipped);
            return Ok(None);
        }
        if !self.robots.is_allowed(url) {
            log::debug!("child url {url} disallowed by robots policy, skipping");
            return Ok(None);
        }

        self.checkpoint
            .mark_in_progress(url)
            .await
            .map_err(|e| EngineError::Checkpoint(e.to_string()))?;

        self.limiter.acquire().await;
        let body = self.fetcher.fetch_with_retry(url).await?;
        let mut child = resolver::extract(self.response_type, &body, nested)?;
        self.expand(nested, &mut child, url).await?;

        child.insert("_source_url".to_string(), Value::String(url.to_string()));
        child.insert("_parent_url".to_string(), Value::String(parent_url.to_string()));

        self.checkpoint
            .mark_done(url)
            .await
            .map_err(|e| EngineError::Checkpoint(e.to_string()))?;

        Ok(Some(Value::Object(child)))
    }

    /// Turn an extracted field value (scalar or list of strings) into
    /// absolute, mode-appropriate URLs.
    fn resolve_child_urls(&self, raw: &Value, parent_url: &str) -> Vec<String> {
        let candidates: Vec<String> = match raw {
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
            _ => Vec::new(),
        };

        candidates
            .into_iter()
            .filter_map(|candidate| self.to_absolute(&candidate, parent_url))
            .map(|url| self.rewrite_for_mode(url))
            .collect()
    }

    fn to_absolute(&self, candidate: &str, parent_url: &str) -> Option<String> {
        let base = Url::parse(parent_url).ok()?;
        base.join(candidate).ok().map(|u| u.to_string())
    }

    fn rewrite_for_mode(&self, url: String) -> String {
        if self.response_type != ResponseType::Json {
            return url;
        }
        let trimmed = url.trim_end_matches('/');
        format!("{trimmed}.json")
    }
}
