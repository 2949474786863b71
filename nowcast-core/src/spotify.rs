//! Spotify Web API client
//!
//! Stateless: every call is given the token it should use. Token ownership
//! and refresh scheduling live in the engine, not here.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::SpotifyConfig;
use crate::error::{Error, Result};
use crate::model::{PlaybackState, PlaybackUpdate};

const ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com";
const API_BASE_URL: &str = "https://api.spotify.com";

/// Token pair returned by the accounts service.
///
/// `refresh_token` is only present when the service rotates it; absence
/// means the old refresh token remains valid.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Raw currently-playing payload. A missing `item` means nothing is
/// currently playing on the account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentlyPlaying {
    #[serde(default)]
    pub item: Option<Track>,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub is_playing: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    pub name: String,
    pub duration_ms: u64,
    #[serde(default)]
    pub artists: Vec<Artist>,
    pub album: Album,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Artist {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Album {
    pub name: String,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalUrls {
    #[serde(default)]
    pub spotify: Option<String>,
}

/// Account profile, used by the authorization callback to verify that the
/// tokens belong to the configured owner account.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl From<CurrentlyPlaying> for PlaybackUpdate {
    fn from(playing: CurrentlyPlaying) -> Self {
        let state = if playing.is_playing {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        };
        match playing.item {
            Some(track) => Self {
                title: Some(track.name),
                artist: track.artists.into_iter().next().map(|artist| artist.name),
                album: Some(track.album.name),
                album_art: track.album.images.into_iter().next().map(|image| image.url),
                url: track.external_urls.spotify,
                duration: Some(track.duration_ms),
                progress: playing.progress_ms,
                state,
            },
            None => Self::idle(state),
        }
    }
}

/// The two upstream calls the polling engine depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StreamingUpstream: Send + Sync {
    /// Exchange a refresh token for a new access token (and possibly a
    /// rotated refresh token).
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant>;

    /// Fetch what is currently playing on the account.
    async fn currently_playing(&self, access_token: &str) -> Result<CurrentlyPlaying>;
}

pub struct SpotifyClient {
    http: reqwest::Client,
    config: SpotifyConfig,
    accounts_base: String,
    api_base: String,
}

impl SpotifyClient {
    pub fn new(config: SpotifyConfig) -> Self {
        Self::with_endpoints(config, ACCOUNTS_BASE_URL, API_BASE_URL)
    }

    /// Build a client against alternate endpoints (test servers).
    pub fn with_endpoints(
        config: SpotifyConfig,
        accounts_base: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            accounts_base: accounts_base.into(),
            api_base: api_base.into(),
        }
    }

    /// URL the browser is redirected to for the one-shot authorization
    /// exchange.
    pub fn authorize_url(&self, scope: &str) -> Result<String> {
        let url = url::Url::parse_with_params(
            &format!("{}/authorize", self.accounts_base),
            &[
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("scope", scope),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ],
        )
        .map_err(|e| Error::Internal(format!("Failed to build authorize URL: {e}")))?;
        Ok(url.into())
    }

    /// Exchange an authorization code for a token pair (one-shot, driven by
    /// the `/auth/callback` route).
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        let response = self
            .http
            .post(format!("{}/api/token", self.accounts_base))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }
        Ok(response.json().await?)
    }

    /// Fetch the profile of the account the access token belongs to.
    pub async fn profile(&self, access_token: &str) -> Result<Profile> {
        let response = self
            .http
            .get(format!("{}/v1/me", self.api_base))
            .bearer_auth(access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl StreamingUpstream for SpotifyClient {
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant> {
        let response = self
            .http
            .post(format!("{}/api/token", self.accounts_base))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }
        Ok(response.json().await?)
    }

    async fn currently_playing(&self, access_token: &str) -> Result<CurrentlyPlaying> {
        let response = self
            .http
            .get(format!("{}/v1/me/player/currently-playing", self.api_base))
            .bearer_auth(access_token)
            .send()
            .await?;
        match response.status() {
            // 204: nothing is playing on the account right now
            reqwest::StatusCode::NO_CONTENT => Ok(CurrentlyPlaying::default()),
            reqwest::StatusCode::UNAUTHORIZED => Err(Error::Unauthorized),
            status if status.is_success() => Ok(response.json().await?),
            _ => Err(upstream_error(response).await),
        }
    }
}

async fn upstream_error(response: reqwest::Response) -> Error {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    Error::Upstream { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_PAYLOAD: &str = r#"{
        "item": {
            "name": "Weird Fishes / Arpeggi",
            "duration_ms": 318187,
            "artists": [{"name": "Radiohead"}, {"name": "Someone Else"}],
            "album": {
                "name": "In Rainbows",
                "images": [{"url": "https://i.example/cover640.jpg"}, {"url": "https://i.example/cover300.jpg"}]
            },
            "external_urls": {"spotify": "https://open.spotify.com/track/abc"}
        },
        "progress_ms": 61500,
        "is_playing": true
    }"#;

    #[test]
    fn test_maps_full_payload() {
        let playing: CurrentlyPlaying = serde_json::from_str(FULL_PAYLOAD).unwrap();
        let update = PlaybackUpdate::from(playing);
        assert_eq!(update.title.as_deref(), Some("Weird Fishes / Arpeggi"));
        assert_eq!(update.artist.as_deref(), Some("Radiohead"));
        assert_eq!(update.album.as_deref(), Some("In Rainbows"));
        assert_eq!(
            update.album_art.as_deref(),
            Some("https://i.example/cover640.jpg")
        );
        assert_eq!(
            update.url.as_deref(),
            Some("https://open.spotify.com/track/abc")
        );
        assert_eq!(update.duration, Some(318_187));
        assert_eq!(update.progress, Some(61_500));
        assert_eq!(update.state, PlaybackState::Playing);
    }

    #[test]
    fn test_maps_missing_item_to_trackless_update() {
        let playing: CurrentlyPlaying =
            serde_json::from_str(r#"{"is_playing": false}"#).unwrap();
        let update = PlaybackUpdate::from(playing);
        assert_eq!(update, PlaybackUpdate::idle(PlaybackState::Paused));
    }

    #[test]
    fn test_maps_paused_track() {
        let playing: CurrentlyPlaying = serde_json::from_str(
            r#"{
                "item": {
                    "name": "Song",
                    "duration_ms": 1000,
                    "artists": [],
                    "album": {"name": "Album", "images": []}
                },
                "is_playing": false
            }"#,
        )
        .unwrap();
        let update = PlaybackUpdate::from(playing);
        assert_eq!(update.state, PlaybackState::Paused);
        // No artists or images: those fields stay absent, the rest map through
        assert_eq!(update.artist, None);
        assert_eq!(update.album_art, None);
        assert_eq!(update.title.as_deref(), Some("Song"));
        assert_eq!(update.progress, None);
    }

    #[test]
    fn test_authorize_url_carries_query() {
        let client = SpotifyClient::new(SpotifyConfig {
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "https://relay.example/auth/callback".to_string(),
            user_id: "owner".to_string(),
        });
        let url = client.authorize_url("user-read-currently-playing").unwrap();
        assert!(url.starts_with("https://accounts.spotify.com/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=cid"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Frelay.example%2Fauth%2Fcallback"));
    }
}
