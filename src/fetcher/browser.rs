//! Headless-browser fetch back-end: navigation, interaction scripts and
//! settle-wait on top of a shared browser pool.

use crate::browser_pool::BrowserPool;
use crate::config::{Interaction, InteractionKind};
use crate::error::{EngineError, EngineResult};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::Page;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const NAVIGATE_TIMEOUT: Duration = Duration::from_secs(30);
const INTERACTION_TIMEOUT: Duration = Duration::from_secs(5);
const INTERACTION_RETRIES: u32 = 2;
const SETTLE_TIMEOUT: Duration = Duration::from_secs(8);

pub struct BrowserFetcher {
    pool: Arc<BrowserPool>,
    headers: HashMap<String, String>,
    interactions: Vec<Interaction>,
    wait_for_selector: Option<String>,
}

impl BrowserFetcher {
    #[must_use]
    pub fn new(
        pool: Arc<BrowserPool>,
        headers: Option<HashMap<String, String>>,
        interactions: Vec<Interaction>,
        wait_for_selector: Option<String>,
    ) -> Self {
        Self {
            pool,
            headers: headers.unwrap_or_default(),
            interactions,
            wait_for_selector,
        }
    }

    pub(crate) async fn fetch_once(&self, url: &str) -> EngineResult<String> {
        let guard = self
            .pool
            .open_page(url)
            .await
            .map_err(|e| EngineError::Retryable(format!("failed to open page for {url}: {e}")))?;
        let page = guard.page();

        if !self.headers.is_empty() {
            let headers_json = serde_json::to_value(&self.headers)
                .map_err(|e| EngineError::Fatal(format!("failed to serialize headers: {e}")))?;
            page.execute(SetExtraHttpHeadersParams::new(Headers::new(headers_json)))
                .await
                .map_err(|e| EngineError::Retryable(format!("failed to set headers: {e}")))?;
        }

        tokio::time::timeout(NAVIGATE_TIMEOUT, page.goto(url))
            .await
            .map_err(|_| EngineError::Retryable(format!("navigation to {url} timed out")))?
            .map_err(|e| EngineError::Retryable(format!("navigation to {url} failed: {e}")))?;

        tokio::time::timeout(NAVIGATE_TIMEOUT, page.wait_for_navigation())
            .await
            .map_err(|_| EngineError::Retryable(format!("dom content load for {url} timed out")))?
            .map_err(|e| EngineError::Retryable(format!("dom content load for {url} failed: {e}")))?;

        for interaction in &self.interactions {
            run_interaction(page, interaction).await;
        }

        if let Some(selector) = &self.wait_for_selector {
            if tokio::time::timeout(SETTLE_TIMEOUT, page.find_element(selector.as_str()))
                .await
                .is_err()
            {
                log::debug!("settle selector '{selector}' did not appear within {SETTLE_TIMEOUT:?} for {url}");
            }
        }

        page.content()
            .await
            .map_err(|e| EngineError::Retryable(format!("failed to read rendered html for {url}: {e}")))
    }

    pub(crate) async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

/// A single interaction step: `INTERACTION_RETRIES` retries with a fixed
/// 1s wait, and a failure is logged and skipped rather than aborting the
/// fetch.
async fn run_interaction(page: &Page, interaction: &Interaction) {
    for attempt in 0..=INTERACTION_RETRIES {
        let result = tokio::time::timeout(INTERACTION_TIMEOUT, apply_interaction(page, interaction)).await;
        match result {
            Ok(Ok(())) => return,
            Ok(Err(e)) => {
                log::debug!("interaction {interaction:?} failed (attempt {attempt}): {e}");
            }
            Err(_) => {
                log::debug!("interaction {interaction:?} timed out (attempt {attempt})");
            }
        }
        if attempt < INTERACTION_RETRIES {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
    log::warn!("interaction {interaction:?} failed after retries, skipping");
}

async fn apply_interaction(page: &Page, interaction: &Interaction) -> anyhow::Result<()> {
    match interaction.kind {
        InteractionKind::Wait => {
            let ms = interaction.duration.unwrap_or(1000);
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        InteractionKind::Scroll => {
            page.evaluate("window.scrollTo(0, document.body.scrollHeight)").await?;
        }
        InteractionKind::Click => {
            let selector = interaction.selector.as_deref().unwrap_or_default();
            page.find_element(selector).await?.click().await?;
        }
        InteractionKind::Fill => {
            let selector = interaction.selector.as_deref().unwrap_or_default();
            let value = interaction.value.as_deref().unwrap_or_default();
            page.find_element(selector).await?.type_str(value).await?;
        }
        InteractionKind::Press => {
            let selector = interaction.selector.as_deref().unwrap_or_default();
            let key = interaction.value.as_deref().unwrap_or_default();
            page.find_element(selector).await?.press_key(key).await?;
        }
        InteractionKind::Hover => {
            let selector = interaction.selector.as_deref().unwrap_or_default();
            page.find_element(selector).await?.hover().await?;
        }
        InteractionKind::Key => {
            let key = interaction.value.as_deref().unwrap_or_default();
            page.find_element("body").await?.press_key(key).await?;
        }
    }
    Ok(())
}
