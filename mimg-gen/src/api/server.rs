//! HTTP server setup and routing

use crate::api::handlers;
use crate::services::resolver::TrackResolver;
use axum::{
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use mimg_common::auth::{SecretHasher, Verifier};
use mimg_common::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub db: SqlitePool,
    pub verifier: Arc<Verifier>,
    pub hasher: Arc<SecretHasher>,
    pub resolver: Arc<TrackResolver>,
    pub started_at: DateTime<Utc>,
}

/// Build application router
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(handlers::health))
        // Account lifecycle
        .route("/auth/register", post(handlers::register))
        .route("/auth/account", delete(handlers::delete_account))
        // Per-user API keys
        .route("/keys", post(handlers::create_api_key))
        .route("/keys/:id", delete(handlers::delete_api_key))
        // Admin key and referral management
        .route("/admin/keys", post(handlers::create_admin_key))
        .route("/admin/keys/:id", delete(handlers::delete_admin_key))
        .route("/admin/referrals", post(handlers::create_referral))
        .route("/admin/referrals/:id", delete(handlers::delete_referral))
        // Now-playing card
        .route("/now/:source/:id", get(handlers::now_playing))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Run the HTTP API server
pub async fn run(ctx: AppContext, host: &str, port: u16) -> Result<()> {
    let app = build_router(ctx);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
