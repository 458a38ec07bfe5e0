//! Collaborators that turn user input into songs and songs into audio.
//!
//! The engine only talks to the traits defined here. `yt-dlp` backs all three
//! of them in production (see [`youtube::YtDlpClient`]); Spotify track lookups
//! live in [`spotify::SpotifyApi`] because they only ever produce metadata.

pub mod spotify;
pub mod youtube;

use async_trait::async_trait;
use serenity::model::id::UserId;
use std::sync::Arc;
use tracing::info;
use url::Url;

use crate::commands::music::utils::mix::YoutubeMixSong;
use crate::commands::music::utils::music_manager::{MusicError, MusicResult};
use crate::commands::music::utils::song::{PlaylistSong, Song, SongMeta};
use spotify::SpotifyApi;

/// A playable media location produced by a resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioStream {
    /// Id of the video the stream belongs to.
    pub source_id: String,
    /// Direct media URL.
    pub url: String,
}

impl AudioStream {
    pub fn new(source_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            url: url.into(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait YoutubeResolver: Send + Sync {
    /// Metadata for a single video.
    async fn video(&self, video_id: &str) -> MusicResult<YoutubeSong>;

    /// First search hit for a free-text query.
    async fn search(&self, query: &str) -> MusicResult<Option<YoutubeSong>>;

    /// Direct audio stream for a video.
    async fn stream(&self, video_id: &str) -> MusicResult<AudioStream>;
}

/// Parameters of a mix continuation fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixRequest {
    pub mix_id: String,
    pub last_seen: Option<String>,
    pub session_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixEntry {
    pub id: String,
    pub title: String,
    pub length_seconds: Option<u64>,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MixBatch {
    pub entries: Vec<MixEntry>,
    /// Continuation token to send with the next request, when the provider has one.
    pub session_token: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MixProvider: Send + Sync {
    async fn next_batch(&self, request: &MixRequest) -> MusicResult<MixBatch>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaylistExpander: Send + Sync {
    /// Concrete songs of a playlist, in playlist order.
    async fn expand(&self, playlist_id: &str) -> MusicResult<Vec<Song>>;
}

/// The resolver set a player works with.
#[derive(Clone)]
pub struct Resolvers {
    pub youtube: Arc<dyn YoutubeResolver>,
    pub mix: Arc<dyn MixProvider>,
    pub playlists: Arc<dyn PlaylistExpander>,
}

pub use crate::commands::music::utils::song::YoutubeSong;

/// What a `/play` argument refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Video(String),
    Playlist(String),
    Mix(String),
    SpotifyTrack(String),
    Search(String),
    Unsupported(String),
}

impl Query {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let Ok(url) = Url::parse(input) else {
            return Query::Search(input.to_string());
        };

        if let Some(track_id) = SpotifyApi::extract_track_id(input) {
            return Query::SpotifyTrack(track_id);
        }

        match url.host_str() {
            Some("youtu.be") => url
                .path_segments()
                .and_then(|mut segments| segments.next())
                .filter(|id| !id.is_empty())
                .map(|id| Query::Video(id.to_string()))
                .unwrap_or_else(|| Query::Unsupported(input.to_string())),
            Some("youtube.com" | "www.youtube.com" | "m.youtube.com" | "music.youtube.com") => {
                let param = |name: &str| {
                    url.query_pairs()
                        .find(|(key, _)| key == name)
                        .map(|(_, value)| value.into_owned())
                        .filter(|value| !value.is_empty())
                };

                match (url.path(), param("v"), param("list")) {
                    (_, _, Some(list)) if list.starts_with("RD") => Query::Mix(list),
                    ("/playlist", _, Some(list)) => Query::Playlist(list),
                    ("/watch", Some(video), _) => Query::Video(video),
                    _ => Query::Unsupported(input.to_string()),
                }
            }
            _ => Query::Unsupported(input.to_string()),
        }
    }
}

/// Resolves a `/play` argument into queueable songs, all tagged with the
/// requesting user. Playlists come back already expanded.
pub async fn load_songs(
    input: &str,
    requestor: UserId,
    resolvers: &Resolvers,
    spotify: Option<&SpotifyApi>,
) -> MusicResult<Vec<Song>> {
    let query = Query::parse(input);
    info!(?query, "Loading songs");

    let song = match query {
        Query::Video(id) => Song::Youtube(resolvers.youtube.video(&id).await?),
        Query::Playlist(id) => Song::Playlist(PlaylistSong::new(SongMeta::new(
            id.clone(),
            format!("Playlist {}", id),
            PlaylistSong::playlist_url(&id),
        ))),
        Query::Mix(id) => Song::Mix(YoutubeMixSong::open(id, resolvers.mix.as_ref()).await?),
        Query::SpotifyTrack(id) => {
            let spotify = spotify.ok_or_else(|| {
                MusicError::ConfigError("Spotify credentials are not configured".to_string())
            })?;
            Song::Spotify(spotify.get_track(&id).await?.into_song())
        }
        Query::Search(text) => Song::Youtube(
            resolvers
                .youtube
                .search(&text)
                .await?
                .ok_or(MusicError::NotFound(text))?,
        ),
        Query::Unsupported(url) => {
            return Err(MusicError::AudioSourceError(format!(
                "Unable to resolve URL to a supported provider: {}",
                url
            )));
        }
    };

    let mut songs = song.expand(resolvers).await?;
    songs.iter_mut().for_each(|song| song.set_requestor(requestor));
    Ok(songs)
}
