//! Key verification
//!
//! Resolves an `Authorization` header to an authenticated principal.
//! Bearer tokens are looked up by fast digest (admin keys first, then
//! per-user API keys where accepted) and verified against the stored slow
//! hash; Basic credentials verify a user's password hash. Every path ends
//! in a terminal classification — nothing else escapes this boundary.
//!
//! "No matching row" and "row matched but slow verify failed" are
//! deliberately indistinguishable to callers, as are "unknown username" and
//! "wrong password".

use crate::auth::hasher::{fast_digest, SecretHasher};
use crate::db::{keys, users};
use crate::time::now_ms;
use base64::{engine::general_purpose, Engine as _};
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;

/// How a principal proved its identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    Password,
    ApiKey,
    Admin,
}

/// An authenticated caller, attached to the request after verification.
/// Never persisted.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: i64,
    pub username: String,
    pub auth_type: AuthType,
}

/// Terminal failure classifications.
///
/// `InvalidCredential` covers wrong key, wrong password, and unknown user —
/// merged so responses cannot be used as an enumeration oracle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("Missing Authorization header")]
    MissingHeader,

    #[error("Invalid Authorization header")]
    MalformedHeader,

    #[error("Invalid credentials")]
    InvalidCredential,

    #[error("Unsupported Authorization scheme")]
    UnsupportedScheme,
}

/// Verifies presented secrets against the credential store
pub struct Verifier {
    db: SqlitePool,
    hasher: Arc<SecretHasher>,
    override_keys: Vec<String>,
}

impl Verifier {
    pub fn new(db: SqlitePool, hasher: SecretHasher, override_keys: Vec<String>) -> Self {
        Self {
            db,
            hasher: Arc::new(hasher),
            override_keys,
        }
    }

    /// Verify a header for an admin-only endpoint.
    ///
    /// Accepts operator override tokens and admin keys, Bearer scheme only.
    pub async fn verify_admin(
        &self,
        header: Option<&str>,
    ) -> Result<Principal, AuthFailure> {
        let header = header.ok_or(AuthFailure::MissingHeader)?;

        if let Some(token) = header.strip_prefix("Bearer ") {
            self.verify_bearer(token, false).await
        } else {
            Err(AuthFailure::UnsupportedScheme)
        }
    }

    /// Verify a header for an end-user endpoint.
    ///
    /// Accepts Bearer (override tokens, admin keys, per-user API keys) and
    /// Basic (username/password) schemes.
    pub async fn verify_user(
        &self,
        header: Option<&str>,
    ) -> Result<Principal, AuthFailure> {
        let header = header.ok_or(AuthFailure::MissingHeader)?;

        if let Some(token) = header.strip_prefix("Bearer ") {
            self.verify_bearer(token, true).await
        } else if let Some(encoded) = header.strip_prefix("Basic ") {
            self.verify_basic(encoded).await
        } else {
            Err(AuthFailure::UnsupportedScheme)
        }
    }

    async fn verify_bearer(
        &self,
        token: &str,
        accept_user_keys: bool,
    ) -> Result<Principal, AuthFailure> {
        // Operator override tokens: small, operator-controlled set, literal
        // membership check, no hashing
        if self.override_keys.iter().any(|k| k == token) {
            tracing::debug!("request authenticated via operator override token");
            return Ok(Principal {
                id: 0,
                username: "operator".to_string(),
                auth_type: AuthType::Admin,
            });
        }

        // One fast digest, at most one slow-hash evaluation per request
        let digest = fast_digest(token);

        match keys::find_admin_key_by_fast_digest(&self.db, &digest).await {
            Ok(Some(row)) => {
                if self.verify_slow(token, &row.slow_hash).await {
                    self.touch_admin_key(row.id);
                    return Ok(Principal {
                        id: row.id,
                        username: row.name.unwrap_or_else(|| "admin".to_string()),
                        auth_type: AuthType::Admin,
                    });
                }
                return Err(AuthFailure::InvalidCredential);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!("admin key lookup failed: {}", e);
                return Err(AuthFailure::InvalidCredential);
            }
        }

        if accept_user_keys {
            match keys::find_user_api_key_by_fast_digest(&self.db, &digest).await {
                Ok(Some(row)) => {
                    if self.verify_slow(token, &row.slow_hash).await {
                        self.touch_api_key(row.id);
                        return Ok(Principal {
                            id: row.user_id,
                            username: row.username,
                            auth_type: AuthType::ApiKey,
                        });
                    }
                    return Err(AuthFailure::InvalidCredential);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("api key lookup failed: {}", e);
                }
            }
        }

        Err(AuthFailure::InvalidCredential)
    }

    async fn verify_basic(&self, encoded: &str) -> Result<Principal, AuthFailure> {
        let decoded = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| AuthFailure::MalformedHeader)?;
        let decoded =
            String::from_utf8(decoded).map_err(|_| AuthFailure::MalformedHeader)?;

        let (username, password) = decoded
            .split_once(':')
            .ok_or(AuthFailure::MalformedHeader)?;

        let user = match users::find_by_username(&self.db, username).await {
            Ok(Some(user)) => user,
            // Same classification as a wrong password
            Ok(None) => return Err(AuthFailure::InvalidCredential),
            Err(e) => {
                tracing::error!("user lookup failed: {}", e);
                return Err(AuthFailure::InvalidCredential);
            }
        };

        if self.verify_slow(password, &user.password_hash).await {
            Ok(Principal {
                id: user.id,
                username: user.username,
                auth_type: AuthType::Password,
            })
        } else {
            Err(AuthFailure::InvalidCredential)
        }
    }

    /// Run the adaptive hash off the async runtime
    async fn verify_slow(&self, secret: &str, stored_hash: &str) -> bool {
        let hasher = Arc::clone(&self.hasher);
        let secret = secret.to_string();
        let stored_hash = stored_hash.to_string();

        match tokio::task::spawn_blocking(move || hasher.verify(&secret, &stored_hash)).await {
            Ok(ok) => ok,
            Err(e) => {
                tracing::error!("slow-hash verification task failed: {}", e);
                false
            }
        }
    }

    /// Fire-and-forget `last_used_at` update; never affects the auth outcome
    fn touch_admin_key(&self, id: i64) {
        let db = self.db.clone();
        tokio::spawn(async move {
            if let Err(e) = keys::touch_admin_key(&db, id, now_ms()).await {
                tracing::debug!("last_used_at update failed for admin key {}: {}", id, e);
            }
        });
    }

    /// Fire-and-forget `last_used_at` update; never affects the auth outcome
    fn touch_api_key(&self, id: i64) {
        let db = self.db.clone();
        tokio::spawn(async move {
            if let Err(e) = keys::touch_api_key(&db, id, now_ms()).await {
                tracing::debug!("last_used_at update failed for api key {}: {}", id, e);
            }
        });
    }
}
