//! API request/response types
//!
//! Request bodies are fully enumerated structs; unknown fields are rejected
//! at the boundary instead of being read ad hoc.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub referral: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateKeyRequest {
    #[serde(default)]
    pub name: Option<String>,
}

/// The raw key is returned exactly once at creation
#[derive(Debug, Serialize)]
pub struct CreatedApiKey {
    pub id: i64,
    pub api_key: String,
}

/// The raw key is returned exactly once at creation
#[derive(Debug, Serialize)]
pub struct CreatedAdminKey {
    pub id: i64,
    pub admin_key: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateReferralRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub max_uses: Option<i64>,
    /// Epoch milliseconds; defaults to 30 days from creation
    #[serde(default)]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ReferralResponse {
    pub id: i64,
    pub code: String,
    pub max_uses: i64,
    pub expires_at: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NowPlayingQuery {
    /// Playback position in seconds
    #[serde(default)]
    pub progress: Option<f64>,
    /// Badge label on the rendered card
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
}
