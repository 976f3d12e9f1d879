//! Track resolution
//!
//! Maps a (source, id) pair to normalized track metadata. YouTube uses the
//! public oEmbed endpoint and needs no token; Spotify and SoundCloud go
//! through their provider token caches. A provider 401 invalidates the
//! cached token exactly once and surfaces the error — retrying is the
//! caller's decision.

use crate::services::token_cache::{ProviderTokenCache, TokenError};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com";
pub const SOUNDCLOUD_API_BASE: &str = "https://api.soundcloud.com";
pub const YOUTUBE_OEMBED_URL: &str = "https://www.youtube.com/oembed";

/// Supported third-party sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSource {
    YouTube,
    Spotify,
    SoundCloud,
}

impl TrackSource {
    /// Parse a path segment, accepting the short aliases `yt` and `sc`
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "youtube" | "yt" => Some(Self::YouTube),
            "spotify" => Some(Self::Spotify),
            "soundcloud" | "sc" => Some(Self::SoundCloud),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::YouTube => "youtube",
            Self::Spotify => "spotify",
            Self::SoundCloud => "soundcloud",
        }
    }

    pub fn accent_color(&self) -> &'static str {
        match self {
            Self::YouTube => "#ff0033",
            Self::Spotify => "#1db954",
            Self::SoundCloud => "#ff7700",
        }
    }

    /// Per-source id shape check, applied before any network call
    pub fn validate_id(&self, id: &str) -> bool {
        if id.is_empty() || id.len() > 200 {
            return false;
        }

        match self {
            Self::YouTube => {
                id.len() == 11
                    && id
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            }
            Self::Spotify => id.len() == 22 && id.chars().all(|c| c.is_ascii_alphanumeric()),
            // SoundCloud ids are user/track permalink paths
            Self::SoundCloud => !id.contains("..") && !id.contains("//"),
        }
    }
}

impl std::fmt::Display for TrackSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized track metadata, produced per resolution call and never cached
#[derive(Debug, Clone)]
pub struct Track {
    pub title: String,
    pub author: String,
    pub duration_seconds: Option<u64>,
    pub is_stream: bool,
    pub source: TrackSource,
    pub canonical_url: String,
    pub thumbnail_url: String,
    pub accent_color: String,
}

/// Track resolution errors
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("invalid track id")]
    InvalidId,

    #[error("track not found")]
    NotFound,

    #[error(transparent)]
    TokenAcquisition(#[from] TokenError),

    /// Provider rejected a token obtained from the cache (401)
    #[error("provider rejected the access token")]
    TokenRejected,

    #[error("provider request failed: {0}")]
    Upstream(String),

    #[error("provider returned an invalid payload: {0}")]
    InvalidPayload(String),
}

/// Resolves (source, id) pairs to normalized `Track`s
pub struct TrackResolver {
    http: reqwest::Client,
    spotify: Option<Arc<ProviderTokenCache>>,
    soundcloud: Option<Arc<ProviderTokenCache>>,
    spotify_api_base: String,
    soundcloud_api_base: String,
    youtube_oembed_url: String,
}

impl TrackResolver {
    /// A provider without a token cache is unavailable; YouTube needs none
    pub fn new(
        http: reqwest::Client,
        spotify: Option<Arc<ProviderTokenCache>>,
        soundcloud: Option<Arc<ProviderTokenCache>>,
    ) -> Self {
        Self {
            http,
            spotify,
            soundcloud,
            spotify_api_base: SPOTIFY_API_BASE.to_string(),
            soundcloud_api_base: SOUNDCLOUD_API_BASE.to_string(),
            youtube_oembed_url: YOUTUBE_OEMBED_URL.to_string(),
        }
    }

    /// Point the resolver at non-default API endpoints (tests, proxies)
    pub fn with_endpoints(
        mut self,
        spotify_api_base: &str,
        soundcloud_api_base: &str,
        youtube_oembed_url: &str,
    ) -> Self {
        self.spotify_api_base = spotify_api_base.to_string();
        self.soundcloud_api_base = soundcloud_api_base.to_string();
        self.youtube_oembed_url = youtube_oembed_url.to_string();
        self
    }

    pub async fn resolve(&self, source: TrackSource, id: &str) -> Result<Track, ResolveError> {
        if !source.validate_id(id) {
            return Err(ResolveError::InvalidId);
        }

        tracing::debug!("resolving {} track {}", source, id);

        match source {
            TrackSource::YouTube => self.resolve_youtube(id).await,
            TrackSource::Spotify => self.resolve_spotify(id).await,
            TrackSource::SoundCloud => self.resolve_soundcloud(id).await,
        }
    }

    async fn resolve_youtube(&self, id: &str) -> Result<Track, ResolveError> {
        let watch_url = format!("https://www.youtube.com/watch?v={}", id);

        let response = self
            .http
            .get(&self.youtube_oembed_url)
            .query(&[("url", watch_url.as_str()), ("format", "json")])
            .send()
            .await
            .map_err(|e| ResolveError::Upstream(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            return Err(ResolveError::NotFound);
        }
        if !status.is_success() {
            return Err(ResolveError::Upstream(format!(
                "oEmbed lookup returned {}",
                status
            )));
        }

        #[derive(Deserialize)]
        struct OEmbed {
            title: String,
            author_name: String,
        }

        let oembed: OEmbed = response
            .json()
            .await
            .map_err(|e| ResolveError::InvalidPayload(e.to_string()))?;

        Ok(Track {
            title: oembed.title,
            author: oembed.author_name,
            duration_seconds: None,
            is_stream: false,
            source: TrackSource::YouTube,
            canonical_url: watch_url,
            thumbnail_url: format!("https://img.youtube.com/vi/{}/hqdefault.jpg", id),
            accent_color: TrackSource::YouTube.accent_color().to_string(),
        })
    }

    async fn resolve_spotify(&self, id: &str) -> Result<Track, ResolveError> {
        let cache = self.spotify.as_ref().ok_or_else(|| {
            ResolveError::UnsupportedSource("spotify credentials not configured".to_string())
        })?;

        let token = cache.get_token().await?;
        let url = format!("{}/v1/tracks/{}", self.spotify_api_base, id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ResolveError::Upstream(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            // One invalidation, no automatic retry
            cache.invalidate();
            return Err(ResolveError::TokenRejected);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ResolveError::NotFound);
        }
        if !status.is_success() {
            return Err(ResolveError::Upstream(format!(
                "track lookup returned {}",
                status
            )));
        }

        #[derive(Deserialize)]
        struct SpotifyTrack {
            name: String,
            duration_ms: Option<u64>,
            #[serde(default)]
            artists: Vec<SpotifyArtist>,
            album: Option<SpotifyAlbum>,
            #[serde(default)]
            external_urls: HashMap<String, String>,
        }

        #[derive(Deserialize)]
        struct SpotifyArtist {
            name: String,
        }

        #[derive(Deserialize)]
        struct SpotifyAlbum {
            #[serde(default)]
            images: Vec<SpotifyImage>,
        }

        #[derive(Deserialize)]
        struct SpotifyImage {
            url: String,
        }

        let track: SpotifyTrack = response
            .json()
            .await
            .map_err(|e| ResolveError::InvalidPayload(e.to_string()))?;

        let author = track
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let canonical_url = track
            .external_urls
            .get("spotify")
            .cloned()
            .unwrap_or_else(|| format!("https://open.spotify.com/track/{}", id));

        let thumbnail_url = track
            .album
            .and_then(|a| a.images.into_iter().next())
            .map(|i| i.url)
            .unwrap_or_default();

        Ok(Track {
            title: track.name,
            author,
            duration_seconds: track.duration_ms.map(|ms| ms / 1000),
            is_stream: false,
            source: TrackSource::Spotify,
            canonical_url,
            thumbnail_url,
            accent_color: TrackSource::Spotify.accent_color().to_string(),
        })
    }

    async fn resolve_soundcloud(&self, id: &str) -> Result<Track, ResolveError> {
        let cache = self.soundcloud.as_ref().ok_or_else(|| {
            ResolveError::UnsupportedSource("soundcloud credentials not configured".to_string())
        })?;

        let token = cache.get_token().await?;
        let permalink = format!("https://soundcloud.com/{}", id);
        let url = format!("{}/resolve", self.soundcloud_api_base);

        let response = self
            .http
            .get(&url)
            .query(&[("url", permalink.as_str())])
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ResolveError::Upstream(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            // One invalidation, no automatic retry
            cache.invalidate();
            return Err(ResolveError::TokenRejected);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ResolveError::NotFound);
        }
        if !status.is_success() {
            return Err(ResolveError::Upstream(format!(
                "resolve lookup returned {}",
                status
            )));
        }

        #[derive(Deserialize)]
        struct SoundCloudTrack {
            title: String,
            user: Option<SoundCloudUser>,
            /// Track length in milliseconds
            duration: Option<u64>,
            artwork_url: Option<String>,
            permalink_url: Option<String>,
        }

        #[derive(Deserialize)]
        struct SoundCloudUser {
            username: String,
        }

        let track: SoundCloudTrack = response
            .json()
            .await
            .map_err(|e| ResolveError::InvalidPayload(e.to_string()))?;

        Ok(Track {
            title: track.title,
            author: track.user.map(|u| u.username).unwrap_or_default(),
            duration_seconds: track.duration.map(|ms| ms / 1000),
            is_stream: false,
            source: TrackSource::SoundCloud,
            canonical_url: track.permalink_url.unwrap_or(permalink),
            thumbnail_url: track.artwork_url.unwrap_or_default(),
            accent_color: TrackSource::SoundCloud.accent_color().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_parse_with_aliases() {
        assert_eq!(TrackSource::parse("youtube"), Some(TrackSource::YouTube));
        assert_eq!(TrackSource::parse("yt"), Some(TrackSource::YouTube));
        assert_eq!(TrackSource::parse("spotify"), Some(TrackSource::Spotify));
        assert_eq!(TrackSource::parse("sc"), Some(TrackSource::SoundCloud));
        assert_eq!(TrackSource::parse("vimeo"), None);
        assert_eq!(TrackSource::parse(""), None);
    }

    #[test]
    fn test_youtube_id_validation() {
        assert!(TrackSource::YouTube.validate_id("dQw4w9WgXcQ"));
        assert!(TrackSource::YouTube.validate_id("abc-DEF_123"));
        assert!(!TrackSource::YouTube.validate_id("tooshort"));
        assert!(!TrackSource::YouTube.validate_id("dQw4w9WgXcQQ"));
        assert!(!TrackSource::YouTube.validate_id("dQw4w9WgXc!"));
    }

    #[test]
    fn test_spotify_id_validation() {
        assert!(TrackSource::Spotify.validate_id("4cOdK2wGLETKBW3PvgPWqT"));
        assert!(!TrackSource::Spotify.validate_id("short"));
        assert!(!TrackSource::Spotify.validate_id("4cOdK2wGLETKBW3PvgPWq-"));
    }

    #[test]
    fn test_soundcloud_id_validation() {
        assert!(TrackSource::SoundCloud.validate_id("artist/some-track"));
        assert!(!TrackSource::SoundCloud.validate_id("artist/../etc"));
        assert!(!TrackSource::SoundCloud.validate_id("artist//track"));
        assert!(!TrackSource::SoundCloud.validate_id(""));
        assert!(!TrackSource::SoundCloud.validate_id(&"x".repeat(201)));
    }
}
