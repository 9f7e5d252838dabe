//! Single long-lived headless browser with context rotation.
//!
//! One `Browser` process for the life of the job, pages opened and
//! closed per fetch via an RAII guard, and the whole browser recycled
//! (closed, relaunched) every `rotate_after` pages to bound memory
//! growth. Stealth patches are inlined JS applied to each new page.

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig, HeadlessMode};
use chromiumoxide::Page;
use futures::StreamExt;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const DEFAULT_ROTATE_AFTER: u32 = 50;

const STEALTH_JS: &str = r"
Object.defineProperty(navigator, 'webdriver', { get: () => false });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3] });
if (!window.chrome) { window.chrome = { runtime: {} }; }
";

struct Session {
    browser: Browser,
    handler: JoinHandle<()>,
    pages_served: AtomicU32,
}

/// Pool of exactly one browser/context pair, rotated by page count.
pub struct BrowserPool {
    session: Mutex<Session>,
    rotate_after: u32,
    headless: bool,
}

impl BrowserPool {
    pub async fn launch(headless: bool, rotate_after: Option<u32>) -> Result<Self> {
        let session = Self::launch_session(headless).await?;
        Ok(Self {
            session: Mutex::new(session),
            rotate_after: rotate_after.unwrap_or(DEFAULT_ROTATE_AFTER),
            headless,
        })
    }

    async fn launch_session(headless: bool) -> Result<Session> {
        let mut config_builder = BrowserConfig::builder().request_timeout(std::time::Duration::from_secs(30));
        config_builder = if headless {
            config_builder.headless_mode(HeadlessMode::default())
        } else {
            config_builder.with_head()
        };
        let config = config_builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch headless browser")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::trace!("browser handler event error: {e}");
                }
            }
        });

        Ok(Session {
            browser,
            handler,
            pages_served: AtomicU32::new(0),
        })
    }

    /// Open a fresh page, applying stealth patches. Rotates the
    /// underlying browser first if it has served `rotate_after` pages.
    pub async fn open_page(&self, url: &str) -> Result<PageGuard> {
        let mut guard = self.session.lock().await;

        if guard.pages_served.load(Ordering::Relaxed) >= self.rotate_after {
            let old = std::mem::replace(&mut *guard, Self::launch_session(self.headless).await?);
            old.handler.abort();
            let _ = old.browser;
        }

        let page = guard
            .browser
            .new_page(url)
            .await
            .context("failed to open page")?;
        page.evaluate(STEALTH_JS)
            .await
            .context("failed to inject stealth patches")?;
        guard.pages_served.fetch_add(1, Ordering::Relaxed);

        Ok(PageGuard { page: Some(page) })
    }

    pub async fn shutdown(&self) {
        let mut guard = self.session.lock().await;
        if let Err(e) = guard.browser.close().await {
            log::warn!("error closing browser: {e}");
        }
        guard.handler.abort();
    }
}

/// RAII wrapper that closes the page when dropped.
pub struct PageGuard {
    page: Option<Page>,
}

impl PageGuard {
    #[must_use]
    pub fn page(&self) -> &Page {
        self.page.as_ref().expect("page present until dropped")
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            tokio::spawn(async move {
                let _ = page.close().await;
            });
        }
    }
}
