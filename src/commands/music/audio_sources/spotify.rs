//! Spotify track lookups. Handles the client credentials flow, URL parsing and
//! the tracks endpoint; the audio itself comes from a YouTube search.

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use regex::Regex;
use reqwest::header;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::info;

use crate::HTTP_CLIENT;
use crate::commands::music::utils::music_manager::{MusicError, MusicResult};
use crate::commands::music::utils::song::{SongMeta, SpotifySong};
use crate::config::SpotifyCredentials;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const TRACKS_URL: &str = "https://api.spotify.com/v1/tracks";

/// Regex to match and capture Spotify track URLs.
static SPOTIFY_TRACK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(open\.spotify\.com|spotify)/(intl-[a-z]+/)?track/([a-zA-Z0-9]+)(\?.*)?$")
        .expect("track regex is valid")
});

/// Response from Spotify's token endpoint.
#[derive(Debug, Deserialize)]
struct SpotifyToken {
    access_token: String,
    expires_in: u64,
    #[serde(skip, default = "Instant::now")]
    created_at: Instant,
}

impl SpotifyToken {
    /// Considers the token expired 30 seconds early.
    fn is_expired(&self) -> bool {
        let expiry = Duration::from_secs(self.expires_in);
        self.created_at.elapsed() > expiry.saturating_sub(Duration::from_secs(30))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyArtist {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyImage {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyAlbum {
    #[serde(default)]
    pub images: Vec<SpotifyImage>,
}

/// Track object as returned by `GET /v1/tracks/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTrack {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
    pub duration_ms: Option<u64>,
    pub album: Option<SpotifyAlbum>,
}

impl SpotifyTrack {
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The query used to find this track on YouTube.
    pub fn search_query(&self) -> String {
        let artists = self
            .artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        format!("{} {}", self.name, artists).trim().to_string()
    }

    pub fn into_song(self) -> SpotifySong {
        let query = self.search_query();
        let title = if self.artists.is_empty() {
            self.name.clone()
        } else {
            format!("{} - {}", self.name, self.artist_names())
        };

        let mut meta = SongMeta::new(self.id.clone(), title, SpotifySong::track_url(&self.id));
        if let Some(ms) = self.duration_ms {
            meta = meta.with_length(ms / 1000);
        }
        meta.thumbnail = self
            .album
            .and_then(|album| album.images.into_iter().next())
            .map(|image| image.url);

        SpotifySong::new(meta, query)
    }
}

/// Spotify Web API client. Caches its access token until shortly before expiry.
pub struct SpotifyApi {
    credentials: SpotifyCredentials,
    token: Mutex<Option<SpotifyToken>>,
}

impl SpotifyApi {
    pub fn new(credentials: SpotifyCredentials) -> Self {
        Self {
            credentials,
            token: Mutex::new(None),
        }
    }

    pub fn extract_track_id(url: &str) -> Option<String> {
        SPOTIFY_TRACK_REGEX
            .captures(url)
            .and_then(|cap| cap.get(4))
            .map(|m| m.as_str().to_string())
    }

    async fn access_token(&self) -> MusicResult<String> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref().filter(|token| !token.is_expired()) {
            return Ok(token.access_token.clone());
        }

        let auth = BASE64_STANDARD.encode(format!(
            "{}:{}",
            self.credentials.client_id, self.credentials.client_secret
        ));

        let response = HTTP_CLIENT
            .post(TOKEN_URL)
            .header(header::AUTHORIZATION, format!("Basic {}", auth))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| {
                MusicError::ExternalApiError(format!("Failed to request Spotify token: {}", e))
            })?;

        let token: SpotifyToken = Self::json(response).await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);

        Ok(access_token)
    }

    /// Fetches a single track by id.
    pub async fn get_track(&self, track_id: &str) -> MusicResult<SpotifyTrack> {
        info!("Fetching Spotify track {}", track_id);
        let token = self.access_token().await?;

        let response = HTTP_CLIENT
            .get(format!("{}/{}", TRACKS_URL, track_id))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| {
                MusicError::ExternalApiError(format!("Failed to request Spotify track: {}", e))
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MusicError::NotFound(track_id.to_string()));
        }

        Self::json(response).await
    }

    async fn json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> MusicResult<T> {
        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Cannot read response".to_string());
            return Err(MusicError::ExternalApiError(format!(
                "Spotify API error: {} - {}",
                status, text
            )));
        }

        response.json::<T>().await.map_err(|e| {
            MusicError::ExternalApiError(format!("Failed to parse Spotify response: {}", e))
        })
    }
}
