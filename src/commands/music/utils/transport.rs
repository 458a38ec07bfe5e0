//! The voice transport as seen by a [`Player`](super::player::Player).
//!
//! A transport opens sessions bound to one guild and channel. A session plays
//! one resource at a time and reports back through an [`EventSink`]. Every
//! event carries the id it was tagged with when the resource was attached (or
//! the session opened), so the player can tell current events from stale ones.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use super::music_manager::MusicResult;
use crate::commands::music::audio_sources::AudioStream;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique id for a play attempt or a session.
pub fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Why a resource stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackEnd {
    /// Played to its end.
    Completed,
    /// Halted by the player itself (skip, back, remove, disconnect).
    StoppedByOwner,
    /// The audio pipeline failed mid-playback.
    Errored(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    TrackEnded { play_id: u64, end: TrackEnd },
    /// A play attempt failed before any audio was attached.
    Unplayable { play_id: u64, reason: String },
    Disconnected { session_id: u64 },
}

/// Sending half of a player's event channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<SessionEvent>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, event: SessionEvent) {
        if let Err(e) = self.tx.send(event) {
            debug!("Dropping session event, player is gone: {:?}", e.0);
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        session_id: u64,
        events: EventSink,
    ) -> MusicResult<Box<dyn TransportSession>>;
}

#[async_trait]
pub trait TransportSession: Send + Sync {
    fn session_id(&self) -> u64;

    /// Whether the voice connection is still usable.
    async fn is_connected(&self) -> bool;

    /// Attaches a new resource, replacing any current one, and starts it.
    async fn play(&mut self, stream: AudioStream, volume: f32, play_id: u64) -> MusicResult<()>;

    fn has_resource(&self) -> bool;

    fn set_volume(&self, volume: f32) -> MusicResult<()>;

    fn pause(&self) -> MusicResult<()>;

    fn unpause(&self) -> MusicResult<()>;

    /// Stops the current resource. `manual` decides whether its end is
    /// reported as [`TrackEnd::StoppedByOwner`] or [`TrackEnd::Completed`].
    fn halt(&mut self, manual: bool) -> MusicResult<()>;

    /// Tears the session down. Idempotent.
    async fn destroy(&mut self);
}
