//! The closed family of queue entries.
//!
//! Every entry is a [`Song`] variant tagged with a [`SongKind`]. What a kind is
//! able to do is described by [`SongKind::capabilities`] instead of being left
//! to call-site discipline: playlists are pointers that must be expanded before
//! they reach a queue, mixes renew themselves in place, everything else streams
//! directly or through another kind.

use serde::{Deserialize, Serialize};
use serenity::model::id::UserId;
use std::time::Duration;

use super::format_duration;
use super::mix::YoutubeMixSong;
use super::music_manager::{MusicError, MusicResult};
use crate::commands::music::audio_sources::{AudioStream, Resolvers};

/// Discriminator for the song variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SongKind {
    Youtube,
    YoutubePlaylist,
    YoutubeMix,
    Spotify,
}

/// What a song kind supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// The kind can produce an audio stream (directly or through another kind).
    pub streamable: bool,
    /// `advance()` renews the entry in place instead of letting the queue move on.
    pub renewable: bool,
}

impl SongKind {
    pub const fn capabilities(self) -> Capabilities {
        match self {
            Self::Youtube | Self::Spotify => Capabilities {
                streamable: true,
                renewable: false,
            },
            Self::YoutubeMix => Capabilities {
                streamable: true,
                renewable: true,
            },
            Self::YoutubePlaylist => Capabilities {
                streamable: false,
                renewable: false,
            },
        }
    }
}

/// Display metadata shared by every variant.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SongMeta {
    pub id: String,
    pub title: String,
    pub uri: String,
    pub thumbnail: Option<String>,
    pub length_seconds: Option<u64>,
    pub length_display: Option<String>,
    pub requestor_id: Option<UserId>,
}

impl SongMeta {
    pub fn new(id: impl Into<String>, title: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            uri: uri.into(),
            ..Default::default()
        }
    }

    /// Sets the length and derives its `m:ss` display form.
    pub fn with_length(mut self, seconds: u64) -> Self {
        self.length_seconds = Some(seconds);
        self.length_display = Some(format_duration(Duration::from_secs(seconds)));
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn requested_by(mut self, user_id: UserId) -> Self {
        self.requestor_id = Some(user_id);
        self
    }

    pub fn length(&self) -> Option<Duration> {
        self.length_seconds.map(Duration::from_secs)
    }
}

/// A single YouTube video.
#[derive(Debug, Clone, PartialEq)]
pub struct YoutubeSong {
    pub meta: SongMeta,
}

impl YoutubeSong {
    pub fn new(meta: SongMeta) -> Self {
        Self { meta }
    }

    pub fn video_id(&self) -> &str {
        &self.meta.id
    }

    pub fn watch_url(video_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", video_id)
    }
}

/// A Spotify track. It has no audio of its own and plays through the first
/// YouTube search hit for its query.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotifySong {
    pub meta: SongMeta,
    pub search_query: String,
}

impl SpotifySong {
    pub fn new(meta: SongMeta, search_query: impl Into<String>) -> Self {
        Self {
            meta,
            search_query: search_query.into(),
        }
    }

    pub fn track_url(track_id: &str) -> String {
        format!("https://open.spotify.com/track/{}", track_id)
    }

    async fn resolve_stream(&self, resolvers: &Resolvers) -> MusicResult<AudioStream> {
        let hit = resolvers
            .youtube
            .search(&self.search_query)
            .await?
            .ok_or_else(|| MusicError::NotFound(self.search_query.clone()))?;

        resolvers.youtube.stream(hit.video_id()).await
    }
}

/// Pointer to a YouTube playlist. Never stored in a queue.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistSong {
    pub meta: SongMeta,
}

impl PlaylistSong {
    pub fn new(meta: SongMeta) -> Self {
        Self { meta }
    }

    pub fn playlist_url(playlist_id: &str) -> String {
        format!("https://www.youtube.com/playlist?list={}", playlist_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Song {
    Youtube(YoutubeSong),
    Playlist(PlaylistSong),
    Mix(YoutubeMixSong),
    Spotify(SpotifySong),
}

impl Song {
    pub fn kind(&self) -> SongKind {
        match self {
            Song::Youtube(_) => SongKind::Youtube,
            Song::Playlist(_) => SongKind::YoutubePlaylist,
            Song::Mix(_) => SongKind::YoutubeMix,
            Song::Spotify(_) => SongKind::Spotify,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.kind().capabilities()
    }

    /// Metadata to display. For a mix this mirrors its current head.
    pub fn meta(&self) -> &SongMeta {
        match self {
            Song::Youtube(song) => &song.meta,
            Song::Playlist(song) => &song.meta,
            Song::Mix(mix) => mix.meta(),
            Song::Spotify(song) => &song.meta,
        }
    }

    pub fn id(&self) -> &str {
        &self.meta().id
    }

    pub fn title(&self) -> &str {
        &self.meta().title
    }

    pub fn set_requestor(&mut self, user_id: UserId) {
        match self {
            Song::Youtube(song) => song.meta.requestor_id = Some(user_id),
            Song::Playlist(song) => song.meta.requestor_id = Some(user_id),
            Song::Mix(mix) => mix.set_requestor(user_id),
            Song::Spotify(song) => song.meta.requestor_id = Some(user_id),
        }
    }

    /// Produces the audio stream for this entry.
    ///
    /// Playlists cannot be streamed; the queue refuses to store them, so
    /// reaching the error arm means a caller skipped [`Song::expand`].
    pub async fn resolve_stream(&self, resolvers: &Resolvers) -> MusicResult<AudioStream> {
        match self {
            Song::Youtube(song) => resolvers.youtube.stream(song.video_id()).await,
            Song::Spotify(song) => song.resolve_stream(resolvers).await,
            Song::Mix(mix) => mix.resolve_stream(resolvers).await,
            Song::Playlist(playlist) => {
                Err(MusicError::UnexpandedPlaylist(playlist.meta.title.clone()))
            }
        }
    }

    /// Renews the entry in place. Returns `true` when the queue should keep it
    /// at its position and replay it.
    pub async fn advance(&mut self, resolvers: &Resolvers) -> bool {
        match self {
            Song::Mix(mix) => mix.advance(resolvers.mix.as_ref()).await,
            _ => false,
        }
    }

    /// Turns a playlist pointer into the concrete songs it lists. Other kinds
    /// are returned as-is.
    pub async fn expand(self, resolvers: &Resolvers) -> MusicResult<Vec<Song>> {
        let Song::Playlist(playlist) = self else {
            return Ok(vec![self]);
        };

        let mut songs = resolvers.playlists.expand(&playlist.meta.id).await?;
        if songs.is_empty() {
            return Err(MusicError::NotFound(playlist.meta.title));
        }
        if let Some(user_id) = playlist.meta.requestor_id {
            songs.iter_mut().for_each(|song| song.set_requestor(user_id));
        }
        Ok(songs)
    }

    pub fn to_record(&self) -> SongRecord {
        let meta = self.meta();
        let id = match self {
            Song::Mix(mix) => mix.mix_id().to_string(),
            _ => meta.id.clone(),
        };

        SongRecord {
            kind: self.kind(),
            id,
            title: meta.title.clone(),
            length_seconds: meta.length_seconds,
            length_display: meta.length_display.clone(),
            thumbnail: meta.thumbnail.clone(),
        }
    }
}

/// Minimal stored form of a song, enough to rebuild it without re-resolving
/// its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongRecord {
    pub kind: SongKind,
    pub id: String,
    pub title: String,
    pub length_seconds: Option<u64>,
    pub length_display: Option<String>,
    pub thumbnail: Option<String>,
}

impl SongRecord {
    /// Rebuilds the song. Only a mix needs the network: it fetches its first
    /// batch so it has something to play.
    pub async fn restore(self, resolvers: &Resolvers) -> MusicResult<Song> {
        if self.kind == SongKind::YoutubeMix {
            let mix = YoutubeMixSong::open(self.id, resolvers.mix.as_ref()).await?;
            return Ok(Song::Mix(mix));
        }

        let uri = match self.kind {
            SongKind::YoutubePlaylist => PlaylistSong::playlist_url(&self.id),
            SongKind::Spotify => SpotifySong::track_url(&self.id),
            _ => YoutubeSong::watch_url(&self.id),
        };
        let length_display = self.length_display.or_else(|| {
            self.length_seconds
                .map(|seconds| format_duration(Duration::from_secs(seconds)))
        });
        let meta = SongMeta {
            id: self.id,
            title: self.title,
            uri,
            thumbnail: self.thumbnail,
            length_seconds: self.length_seconds,
            length_display,
            requestor_id: None,
        };

        Ok(match self.kind {
            SongKind::YoutubePlaylist => Song::Playlist(PlaylistSong::new(meta)),
            SongKind::Spotify => {
                let query = meta.title.clone();
                Song::Spotify(SpotifySong::new(meta, query))
            }
            _ => Song::Youtube(YoutubeSong::new(meta)),
        })
    }
}
