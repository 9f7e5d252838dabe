//! OAuth/bearer token manager.
//!
//! `ensure_active_token` is the single entry point; it takes an exclusive
//! lock, re-checks validity after acquiring (another waiter may have just
//! refreshed), and only then posts a token request, so concurrent callers
//! coalesce onto one refresh instead of each firing their own.

use crate::config::{AuthConfig, AuthType};
use crate::error::{EngineError, EngineResult};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Headroom required before a token is considered still usable; refreshing
/// a few seconds early avoids races against in-flight requests.
const MIN_HEADROOM: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct TokenState {
    token: String,
    expires_at: Instant,
}

/// Thread-safe holder for a single OAuth/bearer session. Cloned handles
/// share the same underlying lock.
#[derive(Clone)]
pub struct TokenManager {
    config: Arc<AuthConfig>,
    client: reqwest::Client,
    state: Arc<Mutex<Option<TokenState>>>,
}

impl TokenManager {
    #[must_use]
    pub fn new(config: AuthConfig, client: reqwest::Client) -> Self {
        Self {
            config: Arc::new(config),
            client,
            state: Arc::new(Mutex::new(None)),
        }
    }

    /// Return a currently-valid bearer token, refreshing if necessary.
    /// Concurrent callers block on the same lock and share one refresh.
    pub async fn ensure_active_token(&self) -> EngineResult<String> {
        let mut guard = self.state.lock().await;
        if let Some(state) = guard.as_ref() {
            if state.expires_at.saturating_duration_since(Instant::now()) > MIN_HEADROOM {
                return Ok(state.token.clone());
            }
        }

        let response = match self.config.auth_type {
            AuthType::Bearer => TokenResponse {
                access_token: self
                    .config
                    .password
                    .clone()
                    .ok_or_else(|| EngineError::Auth("bearer auth requires a token value".into()))?,
                expires_in: u64::MAX / 2,
            },
            AuthType::OauthPassword => self.fetch_password_grant().await?,
        };

        let token = response.access_token.clone();
        *guard = Some(TokenState {
            token: token.clone(),
            expires_at: Instant::now() + Duration::from_secs(response.expires_in),
        });
        Ok(token)
    }

    async fn fetch_password_grant(&self) -> EngineResult<TokenResponse> {
        let token_url = self
            .config
            .token_url
            .as_ref()
            .ok_or_else(|| EngineError::Auth("oauth_password requires token_url".into()))?;

        let params = [
            ("grant_type", "password"),
            ("client_id", self.config.client_id.as_deref().unwrap_or_default()),
            (
                "client_secret",
                self.config.client_secret.as_deref().unwrap_or_default(),
            ),
            ("username", self.config.username.as_deref().unwrap_or_default()),
            ("password", self.config.password.as_deref().unwrap_or_default()),
        ];

        let response = self
            .client
            .post(token_url.as_str())
            .form(&params)
            .send()
            .await
            .map_err(|e| EngineError::Auth(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(EngineError::Auth(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| EngineError::Auth(format!("malformed token response: {e}")))
    }
}
