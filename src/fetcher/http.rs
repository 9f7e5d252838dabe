//! Direct HTTP fetch back-end.
//!
//! `reqwest::Client` is built once and reused per request; headers are
//! applied per call rather than baked into the client, so rotation and
//! per-job overrides don't require rebuilding it. Cookies are cleared
//! per request by default to defeat session fingerprinting, unless a
//! cookies file is configured, in which case it seeds a persistent jar.

use crate::auth::TokenManager;
use crate::error::{EngineError, EngineResult};
use rand::seq::IndexedRandom;
use reqwest::cookie::Jar;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
];

const RETRYABLE_STATUS: &[u16] = &[403, 429, 500, 502, 503, 504];

pub struct HttpFetcher {
    client: reqwest::Client,
    headers: HashMap<String, String>,
    token_manager: Option<TokenManager>,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(
        headers: Option<HashMap<String, String>>,
        proxy: Option<&str>,
        token_manager: Option<TokenManager>,
        timeout_secs: u64,
        cookies_file: Option<&str>,
    ) -> EngineResult<Self> {
        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(timeout_secs));
        builder = match cookies_file {
            Some(path) => {
                let jar = load_cookie_jar(path)?;
                builder.cookie_store(true).cookie_provider(Arc::new(jar))
            }
            // No file configured: clear cookies per request to defeat
            // session fingerprinting across requests.
            None => builder.cookie_store(false),
        };
        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| EngineError::Fatal(format!("invalid proxy '{proxy_url}': {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| EngineError::Fatal(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            headers: headers.unwrap_or_default(),
            token_manager,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub(crate) async fn fetch_once(&self, url: &str) -> EngineResult<String> {
        let user_agent = USER_AGENTS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);

        let mut request = self
            .client
            .get(url)
            .timeout(self.timeout)
            .header("User-Agent", user_agent);

        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        if let Some(manager) = &self.token_manager {
            let token = manager.ensure_active_token().await?;
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                EngineError::Retryable(format!("network error fetching {url}: {e}"))
            } else {
                EngineError::Retryable(format!("request error fetching {url}: {e}"))
            }
        })?;

        let status = response.status().as_u16();
        if status == 200 {
            response
                .text()
                .await
                .map_err(|e| EngineError::Retryable(format!("failed to read body of {url}: {e}")))
        } else if RETRYABLE_STATUS.contains(&status) {
            Err(EngineError::Retryable(format!("{url} returned status {status}")))
        } else if (200..300).contains(&status) {
            response
                .text()
                .await
                .map_err(|e| EngineError::Retryable(format!("failed to read body of {url}: {e}")))
        } else {
            log::debug!("{url} returned non-retryable status {status}, treating as soft failure");
            Ok(String::new())
        }
    }
}

/// Parses a Netscape-format cookie jar file (tab-separated: domain, include
/// subdomains flag, path, secure flag, expiration, name, value — one per
/// line, `#`-prefixed lines and blanks skipped) into a `reqwest::cookie::Jar`
/// pre-seeded against each cookie's domain.
fn load_cookie_jar(path: &str) -> EngineResult<Jar> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| EngineError::Fatal(format!("failed to read cookies file '{path}': {e}")))?;
    let jar = Jar::default();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 7 {
            continue;
        }
        let domain = fields[0].trim_start_matches('.');
        let cookie_path = fields[2];
        let name = fields[5];
        let value = fields[6];
        let Ok(url) = reqwest::Url::parse(&format!("https://{domain}")) else {
            continue;
        };
        jar.add_cookie_str(&format!("{name}={value}; Domain={domain}; Path={cookie_path}"), &url);
    }
    Ok(jar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_cookies_file_builds_a_client() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        std::fs::write(
            &path,
            "# Netscape HTTP Cookie File\nexample.com\tFALSE\t/\tFALSE\t0\tsession\tabc123\n",
        )
        .unwrap();

        let fetcher = HttpFetcher::new(None, None, None, 15, Some(path.to_str().unwrap()));
        assert!(fetcher.is_ok());
    }

    #[test]
    fn missing_cookies_file_is_a_fatal_error() {
        let fetcher = HttpFetcher::new(None, None, None, 15, Some("/nonexistent/cookies.txt"));
        assert!(fetcher.is_err());
    }

    #[test]
    fn no_cookies_file_clears_cookies_per_request() {
        let fetcher = HttpFetcher::new(None, None, None, 15, None);
        assert!(fetcher.is_ok());
    }
}
