//! Per-guild playback state machine.
//!
//! A `Player` owns its guild's [`Queue`] and the transport session. It is only
//! ever touched while its guild lock is held (see
//! [`MusicManager`](super::music_manager::MusicManager)), and that includes the
//! reactions to transport events: the session reports into a channel and a
//! listener task re-enters the player through the same lock.

use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::music_manager::{MusicError, MusicResult};
use super::queue::{LoopPolicy, Queue};
use super::song::{Song, SongMeta};
use super::transport::{self, EventSink, SessionEvent, TrackEnd, Transport, TransportSession};
use crate::commands::music::audio_sources::Resolvers;
use crate::config::{MAX_VOLUME, MusicSettings};

/// Consecutive unplayable attempts before the head is evicted.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Disconnected,
    Idle,
    Playing,
    Paused,
}

/// Read-only view of a player, handed to observers and commands.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub queue: Vec<SongMeta>,
    pub history: Vec<SongMeta>,
    pub loop_policy: LoopPolicy,
    pub volume: f32,
    pub status: PlaybackStatus,
}

impl PlayerSnapshot {
    pub fn current(&self) -> Option<&SongMeta> {
        self.queue.first()
    }
}

/// Presentation hook. Called synchronously while the guild lock is held, so
/// implementations must not block.
pub trait PlayerObserver: Send + Sync {
    fn queue_changed(&self, snapshot: &PlayerSnapshot);
    fn nothing_playing(&self, guild_id: GuildId);
}

/// Observer that only logs.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl PlayerObserver for TracingObserver {
    fn queue_changed(&self, snapshot: &PlayerSnapshot) {
        debug!(
            guild_id = %snapshot.guild_id,
            queued = snapshot.queue.len(),
            current = snapshot.current().map(|meta| meta.title.as_str()),
            "Queue changed"
        );
    }

    fn nothing_playing(&self, guild_id: GuildId) {
        info!(%guild_id, "Nothing left to play");
    }
}

/// Collaborators shared by every player.
#[derive(Clone)]
pub struct PlayerDeps {
    pub transport: Arc<dyn Transport>,
    pub resolvers: Resolvers,
    pub observer: Arc<dyn PlayerObserver>,
}

pub struct Player {
    guild_id: GuildId,
    channel_id: ChannelId,
    queue: Queue,
    volume: f32,
    status: PlaybackStatus,
    session: Option<Box<dyn TransportSession>>,
    /// Tag of the latest play attempt; events carrying any other tag are stale.
    play_id: Option<u64>,
    failures: u32,
    events: EventSink,
    /// Flipped by the registry, without the guild lock, when the player is
    /// about to be destroyed.
    retired: watch::Receiver<bool>,
    deps: PlayerDeps,
    settings: MusicSettings,
}

impl Player {
    pub fn new(
        guild_id: GuildId,
        channel_id: ChannelId,
        settings: MusicSettings,
        deps: PlayerDeps,
        events: EventSink,
        retired: watch::Receiver<bool>,
    ) -> Self {
        Self {
            guild_id,
            channel_id,
            queue: Queue::new(settings.history_size),
            volume: settings.default_volume,
            status: PlaybackStatus::Disconnected,
            session: None,
            play_id: None,
            failures: 0,
            events,
            retired,
            deps,
            settings,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            guild_id: self.guild_id,
            channel_id: self.channel_id,
            queue: self.queue.songs().map(|song| song.meta().clone()).collect(),
            history: self
                .queue
                .history()
                .iter()
                .rev()
                .map(|song| song.meta().clone())
                .collect(),
            loop_policy: self.queue.loop_policy(),
            volume: self.volume,
            status: self.status,
        }
    }

    /// Points the player at another channel. The next `connect()` moves there.
    pub fn rebind(&mut self, channel_id: ChannelId) {
        if self.channel_id != channel_id {
            info!(guild_id = %self.guild_id, from = %self.channel_id, to = %channel_id, "Rebinding player");
            self.channel_id = channel_id;
        }
    }

    /// Ensures a live session on the bound channel. A dead session is torn
    /// down and replaced with a fresh one under a new session id.
    pub async fn connect(&mut self) -> MusicResult<()> {
        if let Some(session) = self.session.as_ref() {
            if session.is_connected().await {
                return Ok(());
            }
        }

        if let Some(mut stale) = self.session.take() {
            debug!(guild_id = %self.guild_id, session_id = stale.session_id(), "Replacing dead session");
            stale.destroy().await;
        }

        let session_id = transport::next_id();
        let session = self
            .deps
            .transport
            .connect(self.guild_id, self.channel_id, session_id, self.events.clone())
            .await?;

        info!(guild_id = %self.guild_id, channel_id = %self.channel_id, session_id, "Connected to voice");
        self.session = Some(session);
        if self.status == PlaybackStatus::Disconnected {
            self.status = PlaybackStatus::Idle;
        }
        Ok(())
    }

    /// Starts the head of the queue. Returns whether anything started.
    ///
    /// A head that cannot be turned into a stream is reported as an
    /// unplayable event instead of being handled inline, so the reaction runs
    /// through the same path as every other transport event.
    pub async fn play(&mut self) -> bool {
        let Some(song) = self.queue.current() else {
            debug!(guild_id = %self.guild_id, "Queue is empty, nothing to play");
            self.play_id = None;
            if self.status != PlaybackStatus::Disconnected {
                self.status = PlaybackStatus::Idle;
            }
            return false;
        };

        let play_id = transport::next_id();
        self.play_id = Some(play_id);
        let title = song.title().to_string();

        // A pending destroy abandons the resolution and leaves the session alone.
        let mut retired = self.retired.clone();
        let resolution = tokio::select! {
            resolution = timeout(
                self.settings.resolve_timeout,
                song.resolve_stream(&self.deps.resolvers),
            ) => resolution,
            Ok(()) = async { retired.wait_for(|retired| *retired).await.map(|_| ()) } => {
                debug!(guild_id = %self.guild_id, play_id, "Player retired while resolving {}", title);
                return false;
            }
        };
        if self.is_retired() {
            debug!(guild_id = %self.guild_id, play_id, "Player retired, dropping stream for {}", title);
            return false;
        }

        let stream = match resolution {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return self.report_unplayable(play_id, &title, e),
            Err(_) => {
                let timeout_error = MusicError::Timeout(self.settings.resolve_timeout);
                return self.report_unplayable(play_id, &title, timeout_error);
            }
        };

        if let Err(e) = self.connect().await {
            error!(guild_id = %self.guild_id, "Failed to connect before playing {}: {}", title, e);
            self.status = PlaybackStatus::Disconnected;
            return false;
        }

        let volume = self.volume;
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if let Err(e) = session.play(stream, volume, play_id).await {
            return self.report_unplayable(play_id, &title, e);
        }

        info!(guild_id = %self.guild_id, play_id, "Now playing: {}", title);
        self.status = PlaybackStatus::Playing;
        self.failures = 0;
        true
    }

    fn is_retired(&self) -> bool {
        *self.retired.borrow()
    }

    fn report_unplayable(&mut self, play_id: u64, title: &str, reason: MusicError) -> bool {
        warn!(guild_id = %self.guild_id, play_id, "Unable to play {}: {}", title, reason);
        self.status = match self.status {
            PlaybackStatus::Disconnected => PlaybackStatus::Disconnected,
            _ => PlaybackStatus::Idle,
        };
        self.events.emit(SessionEvent::Unplayable {
            play_id,
            reason: reason.to_string(),
        });
        false
    }

    /// Halts the current resource. Paused audio is resumed first so the
    /// transport sees a normal stop.
    pub fn stop(&mut self, manual: bool) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.has_resource() {
            return;
        }

        if let Err(e) = session.unpause() {
            debug!(guild_id = %self.guild_id, "Unpause before stop failed: {}", e);
        }
        if let Err(e) = session.halt(manual) {
            warn!(guild_id = %self.guild_id, "Failed to stop track: {}", e);
        }
        self.status = PlaybackStatus::Idle;
    }

    /// Skips the head (see [`Queue::skip`]) and plays whatever is next.
    pub async fn skip(&mut self, force: bool) -> bool {
        let outcome = self.queue.skip(force, &self.deps.resolvers).await;
        debug!(guild_id = %self.guild_id, ?outcome, force, "Skipped");

        self.restart().await
    }

    /// Replays the most recent history entry. Returns `false` when history is
    /// empty, in which case nothing changes.
    pub async fn back(&mut self) -> bool {
        if !self.queue.back() {
            return false;
        }
        self.restart().await;
        true
    }

    pub async fn remove(&mut self, index: usize) -> MusicResult<Song> {
        let removed = self.queue.remove(index)?;
        if index == 0 {
            self.restart().await;
        } else {
            self.notify_changed();
        }
        Ok(removed)
    }

    pub fn shuffle(&mut self) {
        self.queue.shuffle();
        self.notify_changed();
    }

    pub fn set_loop_policy(&mut self, policy: Option<LoopPolicy>) -> LoopPolicy {
        let policy = self.queue.set_loop_policy(policy);
        self.notify_changed();
        policy
    }

    /// Appends songs. Playback starts only when the queue was empty.
    pub async fn add(&mut self, songs: Vec<Song>) -> MusicResult<usize> {
        let outcome = self.queue.add(songs)?;
        if outcome.start_playback {
            if !self.play().await {
                debug!(guild_id = %self.guild_id, "Newly queued head did not start yet");
            }
        } else if outcome.added > 0 {
            self.notify_changed();
        }
        Ok(outcome.added)
    }

    /// Stores the volume (clamped to `0.0..=2.0`) and applies it to the
    /// current resource, if any.
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
        if let Some(session) = self.session.as_ref().filter(|s| s.has_resource()) {
            if let Err(e) = session.set_volume(self.volume) {
                warn!(guild_id = %self.guild_id, "Failed to apply volume: {}", e);
            }
        }
        self.volume
    }

    pub fn pause(&mut self) -> MusicResult<()> {
        let session = self.active_session()?;
        session.pause()?;
        self.status = PlaybackStatus::Paused;
        Ok(())
    }

    pub fn unpause(&mut self) -> MusicResult<()> {
        let session = self.active_session()?;
        session.unpause()?;
        self.status = PlaybackStatus::Playing;
        Ok(())
    }

    fn active_session(&self) -> MusicResult<&dyn TransportSession> {
        self.session
            .as_deref()
            .filter(|session| session.has_resource())
            .ok_or(MusicError::NotConnected)
    }

    /// Reacts to a transport event. Events from older play attempts or older
    /// sessions are ignored.
    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::TrackEnded { play_id, end } if self.play_id == Some(play_id) => {
                match end {
                    TrackEnd::StoppedByOwner => {
                        debug!(guild_id = %self.guild_id, play_id, "Track stopped by player");
                    }
                    TrackEnd::Completed => {
                        debug!(guild_id = %self.guild_id, play_id, "Track finished");
                        self.status = PlaybackStatus::Idle;
                        self.skip(false).await;
                    }
                    TrackEnd::Errored(reason) => {
                        error!(guild_id = %self.guild_id, play_id, "Track errored: {}", reason);
                        self.status = PlaybackStatus::Idle;
                        self.skip(false).await;
                    }
                }
            }
            SessionEvent::Unplayable { play_id, .. } if self.play_id == Some(play_id) => {
                self.recover_from_unplayable().await;
            }
            SessionEvent::Disconnected { session_id }
                if self
                    .session
                    .as_ref()
                    .is_some_and(|session| session.session_id() == session_id) =>
            {
                warn!(guild_id = %self.guild_id, session_id, "Voice session dropped");
                self.session = None;
                self.play_id = None;
                self.status = PlaybackStatus::Disconnected;
            }
            stale => debug!(guild_id = %self.guild_id, ?stale, "Ignoring stale session event"),
        }
    }

    async fn recover_from_unplayable(&mut self) {
        self.failures += 1;
        if self.failures < MAX_CONSECUTIVE_FAILURES {
            self.skip(false).await;
            return;
        }

        self.failures = 0;
        if let Some(title) = self.queue.evict_current() {
            warn!(
                guild_id = %self.guild_id,
                "Evicting {} after {} failed attempts",
                title,
                MAX_CONSECUTIVE_FAILURES
            );
        }
        self.restart().await;
    }

    /// Stops whatever plays, starts the head and tells the observer.
    async fn restart(&mut self) -> bool {
        self.stop(true);
        let playing = self.play().await;
        if playing {
            self.notify_changed();
        } else if self.queue.is_empty() {
            self.deps.observer.nothing_playing(self.guild_id);
        }
        playing
    }

    fn notify_changed(&self) {
        self.deps.observer.queue_changed(&self.snapshot());
    }

    /// Leaves voice. The queue is kept.
    pub async fn disconnect(&mut self) {
        self.stop(true);
        if let Some(mut session) = self.session.take() {
            session.destroy().await;
        }
        self.play_id = None;
        self.status = PlaybackStatus::Disconnected;
    }

    /// Final teardown. Idempotent.
    pub async fn destroy(&mut self) {
        info!(guild_id = %self.guild_id, "Destroying player");
        self.disconnect().await;
    }
}
