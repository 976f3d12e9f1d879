//! Row models for the MusicImg tables

use sqlx::FromRow;

/// A stored admin key or per-user API key.
///
/// Only the fast digest (lookup index) and slow hash (verification
/// boundary) of the raw secret are persisted.
#[derive(Debug, Clone, FromRow)]
pub struct StoredKey {
    pub id: i64,
    pub name: Option<String>,
    pub fast_digest: String,
    pub slow_hash: String,
    pub created_at: i64,
    pub last_used_at: Option<i64>,
}

/// A per-user API key joined to its owning user
#[derive(Debug, Clone, FromRow)]
pub struct UserApiKey {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub slow_hash: String,
}

/// An end-user account
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub referral_id: Option<i64>,
    pub created_at: i64,
}

/// A referral code gating registration
#[derive(Debug, Clone, FromRow)]
pub struct Referral {
    pub id: i64,
    pub code: String,
    pub uses: i64,
    pub max_uses: i64,
    pub expires_at: Option<i64>,
    pub created_at: i64,
}
