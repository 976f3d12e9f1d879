//! mimg-gen - MusicImg now-playing card service
//!
//! Authenticates callers (admin keys, per-user API keys, Basic credentials)
//! and renders now-playing cards from third-party track metadata.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use mimg_common::auth::{SecretHasher, Verifier};
use mimg_common::config::{Config, ProviderCredentials};
use mimg_common::db::{init_database, keys};
use mimg_gen::api::server::{self, AppContext};
use mimg_gen::services::resolver::TrackResolver;
use mimg_gen::services::token_cache::{
    ProviderConfig, ProviderTokenCache, SOUNDCLOUD_TOKEN_URL, SPOTIFY_TOKEN_URL,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mimg-gen", version, about = "MusicImg now-playing card service")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, env = "MIMG_CONFIG")]
    config: Option<PathBuf>,

    /// Override the database path
    #[arg(long, env = "MIMG_DATABASE")]
    database: Option<PathBuf>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(database) = args.database {
        config.database_path = Some(database);
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    info!("Starting mimg-gen (now-playing card service)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let db_path = config.database_path();
    info!("Database: {}", db_path.display());
    let db = init_database(&db_path).await?;

    if keys::count_admin_keys(&db).await? == 0 && config.override_keys.is_empty() {
        warn!(
            "no admin keys exist and no override keys are configured; \
             admin endpoints are unreachable until one is provisioned"
        );
    }

    let http = reqwest::Client::builder()
        .user_agent(concat!("mimg-gen/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(15))
        .build()?;

    let spotify = build_cache(&http, config.providers.spotify.as_ref(), "spotify", SPOTIFY_TOKEN_URL);
    let soundcloud = build_cache(
        &http,
        config.providers.soundcloud.as_ref(),
        "soundcloud",
        SOUNDCLOUD_TOKEN_URL,
    );

    for (name, cache) in [("spotify", &spotify), ("soundcloud", &soundcloud)] {
        if cache.is_none() {
            info!("{} credentials not configured; source disabled", name);
        }
    }

    let resolver = Arc::new(TrackResolver::new(http, spotify, soundcloud));
    let verifier = Arc::new(Verifier::new(
        db.clone(),
        SecretHasher::new(),
        config.override_keys.clone(),
    ));

    let ctx = AppContext {
        db,
        verifier,
        hasher: Arc::new(SecretHasher::new()),
        resolver,
        started_at: Utc::now(),
    };

    server::run(ctx, &config.host, config.port).await?;

    Ok(())
}

fn build_cache(
    http: &reqwest::Client,
    credentials: Option<&ProviderCredentials>,
    name: &str,
    default_token_url: &str,
) -> Option<Arc<ProviderTokenCache>> {
    credentials.map(|creds| {
        let token_url = creds.token_url.as_deref().unwrap_or(default_token_url);
        Arc::new(ProviderTokenCache::new(
            http.clone(),
            ProviderConfig::new(name, token_url, &creds.client_id, &creds.client_secret),
        ))
    })
}
