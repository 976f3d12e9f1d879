//! Integration tests for the track resolver against stub provider servers

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mimg_gen::services::resolver::{ResolveError, TrackResolver, TrackSource};
use mimg_gen::services::token_cache::{ProviderConfig, ProviderTokenCache};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

const SPOTIFY_ID: &str = "4cOdK2wGLETKBW3PvgPWqT";

#[derive(Clone, Default)]
struct StubState {
    token_hits: Arc<AtomicUsize>,
    /// Answer the first metadata request with 401
    reject_first_lookup: Arc<AtomicBool>,
}

async fn token_endpoint(State(state): State<StubState>) -> Json<serde_json::Value> {
    let n = state.token_hits.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({
        "access_token": format!("tok-{}", n),
        "expires_in": 3600,
    }))
}

async fn spotify_track(
    State(state): State<StubState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if state.reject_first_lookup.swap(false, Ordering::SeqCst) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    // A bearer token from the cache must be attached
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert!(auth.starts_with("Bearer tok-"));

    Json(json!({
        "name": "Test Track",
        "duration_ms": 213_000,
        "artists": [{"name": "Artist A"}, {"name": "Artist B"}],
        "album": {"images": [{"url": "https://img.example/cover.jpg"}]},
        "external_urls": {"spotify": format!("https://open.spotify.com/track/{}", id)},
    }))
    .into_response()
}

async fn soundcloud_resolve(
    State(state): State<StubState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if state.reject_first_lookup.swap(false, Ordering::SeqCst) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let url = params.get("url").cloned().unwrap_or_default();
    assert!(url.starts_with("https://soundcloud.com/"));

    Json(json!({
        "title": "SC Track",
        "user": {"username": "scuser"},
        "duration": 120_000,
        "artwork_url": "https://img.example/sc.jpg",
        "permalink_url": url,
    }))
    .into_response()
}

async fn youtube_oembed(Query(params): Query<HashMap<String, String>>) -> Response {
    let url = params.get("url").cloned().unwrap_or_default();
    assert!(url.starts_with("https://www.youtube.com/watch?v="));

    Json(json!({
        "title": "Video & Friends",
        "author_name": "Some Channel",
    }))
    .into_response()
}

/// Spawn the stub provider; returns (base_url, state)
async fn spawn_stub() -> (String, StubState) {
    let state = StubState::default();
    let app = Router::new()
        .route("/token", post(token_endpoint))
        .route("/v1/tracks/:id", get(spotify_track))
        .route("/resolve", get(soundcloud_resolve))
        .route("/oembed", get(youtube_oembed))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

fn cache_for(base: &str, provider: &str) -> Arc<ProviderTokenCache> {
    Arc::new(ProviderTokenCache::new(
        reqwest::Client::new(),
        ProviderConfig::new(provider, &format!("{}/token", base), "id", "secret"),
    ))
}

fn resolver_for(
    base: &str,
    spotify: Option<Arc<ProviderTokenCache>>,
    soundcloud: Option<Arc<ProviderTokenCache>>,
) -> TrackResolver {
    TrackResolver::new(reqwest::Client::new(), spotify, soundcloud).with_endpoints(
        base,
        base,
        &format!("{}/oembed", base),
    )
}

#[tokio::test]
async fn test_spotify_resolution() {
    let (base, state) = spawn_stub().await;
    let resolver = resolver_for(&base, Some(cache_for(&base, "spotify")), None);

    let track = resolver.resolve(TrackSource::Spotify, SPOTIFY_ID).await.unwrap();

    assert_eq!(track.title, "Test Track");
    assert_eq!(track.author, "Artist A, Artist B");
    assert_eq!(track.duration_seconds, Some(213));
    assert_eq!(track.source, TrackSource::Spotify);
    assert_eq!(track.accent_color, "#1db954");
    assert_eq!(track.thumbnail_url, "https://img.example/cover.jpg");
    assert!(track.canonical_url.contains(SPOTIFY_ID));
    assert_eq!(state.token_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_provider_401_invalidates_once_and_surfaces() {
    let (base, state) = spawn_stub().await;
    state.reject_first_lookup.store(true, Ordering::SeqCst);

    let cache = cache_for(&base, "spotify");
    let resolver = resolver_for(&base, Some(Arc::clone(&cache)), None);

    // First resolution: token acquired, provider rejects it, error surfaces
    // without an automatic retry
    let err = resolver
        .resolve(TrackSource::Spotify, SPOTIFY_ID)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::TokenRejected));
    assert_eq!(state.token_hits.load(Ordering::SeqCst), 1);

    // The cache was invalidated: the next resolution acquires a fresh token
    // and succeeds
    let track = resolver
        .resolve(TrackSource::Spotify, SPOTIFY_ID)
        .await
        .unwrap();
    assert_eq!(track.title, "Test Track");
    assert_eq!(state.token_hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_soundcloud_resolution() {
    let (base, state) = spawn_stub().await;
    let resolver = resolver_for(&base, None, Some(cache_for(&base, "soundcloud")));

    let track = resolver
        .resolve(TrackSource::SoundCloud, "scuser/some-track")
        .await
        .unwrap();

    assert_eq!(track.title, "SC Track");
    assert_eq!(track.author, "scuser");
    assert_eq!(track.duration_seconds, Some(120));
    assert_eq!(track.canonical_url, "https://soundcloud.com/scuser/some-track");
    assert_eq!(track.accent_color, "#ff7700");
    assert_eq!(state.token_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_youtube_resolution_needs_no_token() {
    let (base, state) = spawn_stub().await;
    // No caches configured at all: YouTube still resolves
    let resolver = resolver_for(&base, None, None);

    let track = resolver
        .resolve(TrackSource::YouTube, "dQw4w9WgXcQ")
        .await
        .unwrap();

    assert_eq!(track.title, "Video & Friends");
    assert_eq!(track.author, "Some Channel");
    assert_eq!(track.duration_seconds, None);
    assert_eq!(track.canonical_url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    assert!(track.thumbnail_url.contains("dQw4w9WgXcQ"));
    assert_eq!(state.token_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_id_rejected_before_any_request() {
    // Endpoints point nowhere reachable; validation must short-circuit
    let resolver = TrackResolver::new(reqwest::Client::new(), None, None)
        .with_endpoints("http://127.0.0.1:1", "http://127.0.0.1:1", "http://127.0.0.1:1");

    let err = resolver
        .resolve(TrackSource::Spotify, "not-a-spotify-id")
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::InvalidId));

    let err = resolver
        .resolve(TrackSource::SoundCloud, "a/../../etc/passwd")
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::InvalidId));
}

#[tokio::test]
async fn test_unconfigured_provider_is_unsupported() {
    let resolver = TrackResolver::new(reqwest::Client::new(), None, None);

    let err = resolver
        .resolve(TrackSource::Spotify, SPOTIFY_ID)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::UnsupportedSource(_)));
}
