//! API route handlers

use crate::api::extract::{AdminAuth, UserAuth};
use crate::api::server::AppContext;
use crate::api::types::{
    CreateKeyRequest, CreateReferralRequest, CreatedAdminKey, CreatedApiKey, HealthResponse,
    NowPlayingQuery, ReferralResponse, RegisterRequest, RegisterResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::services::render::render_now_playing;
use crate::services::resolver::TrackSource;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use mimg_common::auth::{fast_digest, generate_secret, AuthType, ADMIN_KEY_PREFIX, USER_KEY_PREFIX};
use mimg_common::db::keys::{self, AdminKeyDeletion};
use mimg_common::db::referrals::{self, ReferralOutcome};
use mimg_common::db::users;
use mimg_common::time::now_ms;
use rand::RngCore;
use std::sync::Arc;

const THIRTY_DAYS_MS: i64 = 30 * 86_400 * 1000;
const DEFAULT_REFERRAL_USES: i64 = 100;
const MAX_NAME_LEN: usize = 64;

// ========================================
// Health
// ========================================

/// GET /health
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(ctx.started_at);

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "mimg-gen".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
    })
}

// ========================================
// Account lifecycle
// ========================================

/// POST /auth/register
pub async fn register(
    State(ctx): State<AppContext>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    if body.username.is_empty() || body.username.len() > MAX_NAME_LEN {
        return Err(ApiError::BadRequest("Invalid username".to_string()));
    }
    // Basic auth splits at the first colon
    if body.username.contains(':') {
        return Err(ApiError::BadRequest(
            "Username must not contain ':'".to_string(),
        ));
    }
    if body.password.is_empty() || body.password.len() > 128 {
        return Err(ApiError::BadRequest("Invalid password".to_string()));
    }

    if users::username_exists(&ctx.db, &body.username).await? {
        return Err(ApiError::Conflict(
            "Username conflicts with another user in the system".to_string(),
        ));
    }

    let referral_id = match referrals::consume_referral(&ctx.db, &body.referral, now_ms()).await? {
        ReferralOutcome::Consumed(id) => id,
        ReferralOutcome::NotFound => {
            return Err(ApiError::BadRequest("Invalid referral".to_string()))
        }
        ReferralOutcome::Exhausted => {
            return Err(ApiError::Forbidden("Referral max uses reached".to_string()))
        }
        ReferralOutcome::Expired => {
            return Err(ApiError::Forbidden("Referral expired".to_string()))
        }
    };

    let password_hash = slow_hash(&ctx, body.password).await?;
    let id = users::insert_user(&ctx.db, &body.username, &password_hash, referral_id, now_ms())
        .await?;

    tracing::info!("registered user {}", body.username);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id,
            username: body.username,
        }),
    ))
}

/// DELETE /auth/account
///
/// Requires Basic credentials: deleting an account re-proves the password,
/// an API key is not enough.
pub async fn delete_account(
    State(ctx): State<AppContext>,
    UserAuth(principal): UserAuth,
) -> ApiResult<impl IntoResponse> {
    if principal.auth_type != AuthType::Password {
        return Err(ApiError::Forbidden(
            "Account deletion requires password authentication".to_string(),
        ));
    }

    if !users::delete_user(&ctx.db, principal.id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!("deleted account {}", principal.username);

    Ok(StatusCode::NO_CONTENT)
}

// ========================================
// Per-user API keys
// ========================================

/// POST /keys
pub async fn create_api_key(
    State(ctx): State<AppContext>,
    UserAuth(principal): UserAuth,
    Json(body): Json<CreateKeyRequest>,
) -> ApiResult<impl IntoResponse> {
    if principal.auth_type == AuthType::Admin {
        return Err(ApiError::Forbidden(
            "Admin credentials cannot own API keys".to_string(),
        ));
    }

    let raw_key = generate_secret(USER_KEY_PREFIX);
    let digest = fast_digest(&raw_key);
    let hash = slow_hash(&ctx, raw_key.clone()).await?;
    let name = sanitize_name(body.name);

    let id = keys::insert_api_key(
        &ctx.db,
        principal.id,
        Some(name.as_str()),
        &digest,
        &hash,
        now_ms(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedApiKey {
            id,
            api_key: raw_key,
        }),
    ))
}

/// DELETE /keys/{id}
pub async fn delete_api_key(
    State(ctx): State<AppContext>,
    UserAuth(principal): UserAuth,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    if principal.auth_type == AuthType::Admin {
        return Err(ApiError::Forbidden(
            "Admin credentials cannot own API keys".to_string(),
        ));
    }

    // Scoped to the caller: someone else's key id reads as absent
    if !keys::delete_api_key(&ctx.db, principal.id, id).await? {
        return Err(ApiError::NotFound("API key not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

// ========================================
// Admin keys
// ========================================

/// POST /admin/keys
pub async fn create_admin_key(
    State(ctx): State<AppContext>,
    AdminAuth(_): AdminAuth,
    Json(body): Json<CreateKeyRequest>,
) -> ApiResult<impl IntoResponse> {
    let raw_key = generate_secret(ADMIN_KEY_PREFIX);
    let digest = fast_digest(&raw_key);
    let hash = slow_hash(&ctx, raw_key.clone()).await?;

    let name = sanitize_name(body.name);
    let id = keys::insert_admin_key(&ctx.db, Some(name.as_str()), &digest, &hash, now_ms()).await?;

    tracing::info!("new admin key generated: {}", name);

    Ok((
        StatusCode::CREATED,
        Json(CreatedAdminKey {
            id,
            admin_key: raw_key,
        }),
    ))
}

/// DELETE /admin/keys/{id}
pub async fn delete_admin_key(
    State(ctx): State<AppContext>,
    AdminAuth(_): AdminAuth,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    match keys::delete_admin_key(&ctx.db, id).await? {
        AdminKeyDeletion::Deleted => Ok(StatusCode::NO_CONTENT),
        AdminKeyDeletion::NotFound => {
            Err(ApiError::NotFound("Admin key not found".to_string()))
        }
        AdminKeyDeletion::LastKey => Err(ApiError::Conflict(
            "Cannot delete the last admin key".to_string(),
        )),
    }
}

// ========================================
// Referrals
// ========================================

/// POST /admin/referrals
pub async fn create_referral(
    State(ctx): State<AppContext>,
    AdminAuth(_): AdminAuth,
    Json(body): Json<CreateReferralRequest>,
) -> ApiResult<impl IntoResponse> {
    let code = match body.code {
        Some(code) => {
            if code.is_empty() || code.len() > MAX_NAME_LEN {
                return Err(ApiError::BadRequest("Invalid referral code".to_string()));
            }
            if referrals::code_exists(&ctx.db, &code).await? {
                return Err(ApiError::Conflict(
                    "Referral code already exists".to_string(),
                ));
            }
            code
        }
        None => random_code(),
    };

    let max_uses = match body.max_uses {
        Some(n) if n > 0 => n,
        Some(_) => {
            return Err(ApiError::BadRequest("max_uses must be positive".to_string()))
        }
        None => DEFAULT_REFERRAL_USES,
    };

    let expires_at = body.expires_at.unwrap_or_else(|| now_ms() + THIRTY_DAYS_MS);

    let id = referrals::insert_referral(&ctx.db, &code, max_uses, Some(expires_at), now_ms())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ReferralResponse {
            id,
            code,
            max_uses,
            expires_at: Some(expires_at),
        }),
    ))
}

/// DELETE /admin/referrals/{id}
pub async fn delete_referral(
    State(ctx): State<AppContext>,
    AdminAuth(_): AdminAuth,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    if !referrals::delete_referral(&ctx.db, id).await? {
        return Err(ApiError::NotFound("Referral code not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

// ========================================
// Now-playing card
// ========================================

/// GET /now/{source}/{id}
pub async fn now_playing(
    State(ctx): State<AppContext>,
    UserAuth(_): UserAuth,
    Path((source, id)): Path<(String, String)>,
    Query(query): Query<NowPlayingQuery>,
) -> ApiResult<impl IntoResponse> {
    let source = TrackSource::parse(&source)
        .ok_or_else(|| ApiError::BadRequest("unsupported source".to_string()))?;

    let track = ctx.resolver.resolve(source, &id).await?;
    let svg = render_now_playing(&track, query.progress, query.label.as_deref());

    Ok((
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "public, max-age=5"),
        ],
        svg,
    ))
}

// ========================================
// Helpers
// ========================================

/// Run the adaptive hash off the async runtime
async fn slow_hash(ctx: &AppContext, secret: String) -> ApiResult<String> {
    let hasher = Arc::clone(&ctx.hasher);
    tokio::task::spawn_blocking(move || hasher.slow_hash(&secret))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

/// Display name for a key; absent or overlong names fall back to "unnamed"
fn sanitize_name(name: Option<String>) -> String {
    name.filter(|n| !n.is_empty() && n.len() <= MAX_NAME_LEN)
        .unwrap_or_else(|| "unnamed".to_string())
}

fn random_code() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
