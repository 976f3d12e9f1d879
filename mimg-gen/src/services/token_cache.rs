//! Provider token cache
//!
//! One cache per third-party provider holding a short-lived
//! client-credential access token. Concurrent callers during a miss share a
//! single upstream exchange; a refresh grant is preferred when a refresh
//! token is held, falling back to client credentials when it fails.
//!
//! Acquisition failures are never retried here; the caller decides.

use base64::{engine::general_purpose, Engine as _};
use futures::future::{BoxFuture, FutureExt, Shared};
use mimg_common::time::now_ms;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const SOUNDCLOUD_TOKEN_URL: &str = "https://secure.soundcloud.com/oauth/token";

/// Subtracted from the provider-reported expiry so no caller receives a
/// token about to expire mid-request
pub const DEFAULT_EXPIRY_BUFFER_MS: i64 = 60_000;

/// Token acquisition errors.
///
/// Cloneable so one failed exchange can be delivered to every waiter that
/// joined the in-flight acquisition.
#[derive(Debug, Clone, Error)]
pub enum TokenError {
    /// Token endpoint answered with a non-2xx status
    #[error("token exchange failed with status {status}: {body}")]
    Exchange { status: u16, body: String },

    /// 2xx response missing `access_token` or `expires_in`
    #[error("token endpoint returned an invalid payload: {0}")]
    InvalidPayload(String),

    /// Request never completed (connection failure, timeout)
    #[error("token endpoint request failed: {0}")]
    Network(String),

    /// The spawned acquisition task died
    #[error("token acquisition task failed: {0}")]
    Task(String),
}

/// Static configuration for one provider's token endpoint
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub expiry_buffer_ms: i64,
}

impl ProviderConfig {
    pub fn new(name: &str, token_url: &str, client_id: &str, client_secret: &str) -> Self {
        Self {
            name: name.to_string(),
            token_url: token_url.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            expiry_buffer_ms: DEFAULT_EXPIRY_BUFFER_MS,
        }
    }
}

type SharedAcquisition = Shared<BoxFuture<'static, Result<String, TokenError>>>;

/// Mutable token state; all fields read/written as one snapshot under the lock
#[derive(Default)]
struct TokenState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at_ms: i64,
    inflight: Option<SharedAcquisition>,
}

/// Cached client-credential token for one provider.
///
/// Explicitly constructed and shared by `Arc`; never ambient global state.
pub struct ProviderTokenCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    http: reqwest::Client,
    config: ProviderConfig,
    state: Mutex<TokenState>,
}

/// Validated token-endpoint response
struct TokenPayload {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct RawTokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

enum Grant<'a> {
    ClientCredentials,
    Refresh(&'a str),
}

impl ProviderTokenCache {
    pub fn new(http: reqwest::Client, config: ProviderConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                http,
                config,
                state: Mutex::new(TokenState::default()),
            }),
        }
    }

    /// Return a currently-valid access token, acquiring one if needed.
    ///
    /// Under N concurrent misses exactly one upstream exchange runs and all
    /// N callers observe its outcome. The exchange runs on its own task, so
    /// a caller abandoning the wait does not cancel it for the others.
    pub async fn get_token(&self) -> Result<String, TokenError> {
        let acquisition = {
            let mut state = self.inner.state.lock().unwrap();

            // Fast path: token present and not yet inside the safety buffer
            if let Some(token) = &state.access_token {
                if now_ms() < state.expires_at_ms {
                    return Ok(token.clone());
                }
            }

            if let Some(inflight) = state.inflight.clone() {
                inflight
            } else {
                let inner = Arc::clone(&self.inner);
                let handle = tokio::spawn(async move { CacheInner::acquire(inner).await });
                let acquisition: SharedAcquisition = async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(e) => Err(TokenError::Task(e.to_string())),
                    }
                }
                .boxed()
                .shared();
                state.inflight = Some(acquisition.clone());
                acquisition
            }
        };

        acquisition.await
    }

    /// Drop the cached token unconditionally.
    ///
    /// Called after the provider rejects a cached token, so the next
    /// `get_token` re-acquires instead of reusing it.
    pub fn invalidate(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.access_token = None;
        state.refresh_token = None;
        state.expires_at_ms = 0;
        tracing::debug!("token cache invalidated for {}", self.inner.config.name);
    }
}

impl CacheInner {
    /// One acquisition: runs the exchange, publishes the outcome, and clears
    /// the in-flight handle on every path so later calls can retry.
    async fn acquire(inner: Arc<CacheInner>) -> Result<String, TokenError> {
        let result = inner.exchange_with_fallback().await;

        let mut state = inner.state.lock().unwrap();
        state.inflight = None;

        match result {
            Ok(payload) => {
                let now = now_ms();
                state.access_token = Some(payload.access_token.clone());
                if let Some(refresh_token) = payload.refresh_token {
                    state.refresh_token = Some(refresh_token);
                }
                state.expires_at_ms =
                    expires_at(now, payload.expires_in, inner.config.expiry_buffer_ms);

                tracing::info!(
                    "acquired {} access token (valid {}s before buffer)",
                    inner.config.name,
                    payload.expires_in
                );
                Ok(payload.access_token)
            }
            Err(e) => {
                tracing::warn!("{} token acquisition failed: {}", inner.config.name, e);
                Err(e)
            }
        }
    }

    /// Prefer a refresh grant when a refresh token is held; on any refresh
    /// failure discard it and fall through to client credentials.
    async fn exchange_with_fallback(&self) -> Result<TokenPayload, TokenError> {
        let refresh_token = self.state.lock().unwrap().refresh_token.clone();

        if let Some(token) = refresh_token {
            match self.exchange(Grant::Refresh(&token)).await {
                Ok(payload) => return Ok(payload),
                Err(e) => {
                    tracing::warn!(
                        "{} refresh grant failed ({}), falling back to client credentials",
                        self.config.name,
                        e
                    );
                    self.state.lock().unwrap().refresh_token = None;
                }
            }
        }

        self.exchange(Grant::ClientCredentials).await
    }

    async fn exchange(&self, grant: Grant<'_>) -> Result<TokenPayload, TokenError> {
        let params: Vec<(&str, &str)> = match grant {
            Grant::ClientCredentials => vec![("grant_type", "client_credentials")],
            Grant::Refresh(token) => {
                vec![("grant_type", "refresh_token"), ("refresh_token", token)]
            }
        };

        let basic = general_purpose::STANDARD.encode(format!(
            "{}:{}",
            self.config.client_id, self.config.client_secret
        ));

        let response = self
            .http
            .post(&self.config.token_url)
            .header(AUTHORIZATION, format!("Basic {}", basic))
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| TokenError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenError::Exchange {
                status: status.as_u16(),
                body,
            });
        }

        let raw: RawTokenResponse = response
            .json()
            .await
            .map_err(|e| TokenError::InvalidPayload(e.to_string()))?;

        let access_token = raw
            .access_token
            .ok_or_else(|| TokenError::InvalidPayload("missing access_token".to_string()))?;
        let expires_in = raw
            .expires_in
            .ok_or_else(|| TokenError::InvalidPayload("missing expires_in".to_string()))?;

        Ok(TokenPayload {
            access_token,
            expires_in,
            // refresh_token is optional for client-credential grants
            refresh_token: raw.refresh_token,
        })
    }
}

/// Expiry with the safety buffer applied, clamped so the remaining lifetime
/// is never negative
fn expires_at(now_ms: i64, expires_in_secs: i64, buffer_ms: i64) -> i64 {
    (now_ms + expires_in_secs * 1000 - buffer_ms).max(now_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_at_applies_buffer() {
        let now = 1_000_000;
        assert_eq!(expires_at(now, 3600, 60_000), now + 3_600_000 - 60_000);
    }

    #[test]
    fn test_expires_at_clamps_to_now() {
        let now = 1_000_000;
        // Reported lifetime shorter than the buffer: immediately stale,
        // never negative remaining lifetime
        assert_eq!(expires_at(now, 30, 60_000), now);
        assert_eq!(expires_at(now, 0, 0), now);
    }
}
