//! Songbird-backed voice transport and the songbird event handlers that feed
//! track and driver events back to the player.

use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use serenity::model::id::{ChannelId, GuildId};
use serenity::prelude::Mutex as SerenityMutex;
use songbird::input::HttpRequest;
use songbird::tracks::{PlayMode, Track, TrackHandle};
use songbird::{Call, CoreEvent, Event, EventContext, Songbird, TrackEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info};

use super::music_manager::{MusicError, MusicResult};
use super::transport::{EventSink, SessionEvent, TrackEnd, Transport, TransportSession};
use crate::commands::music::audio_sources::AudioStream;

/// Shared between a track's handlers so its end is reported exactly once,
/// with the reason the player asked for.
#[derive(Debug, Default)]
struct TrackFlags {
    manual: AtomicBool,
    reported: AtomicBool,
}

impl TrackFlags {
    /// Returns `true` for the first caller only.
    fn claim(&self) -> bool {
        !self.reported.swap(true, Ordering::SeqCst)
    }
}

/// Reports the end of a track.
struct TrackEndNotifier {
    play_id: u64,
    flags: Arc<TrackFlags>,
    events: EventSink,
}

#[async_trait]
impl songbird::EventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(_) = ctx {
            if self.flags.claim() {
                let end = if self.flags.manual.load(Ordering::SeqCst) {
                    TrackEnd::StoppedByOwner
                } else {
                    TrackEnd::Completed
                };
                self.events.emit(SessionEvent::TrackEnded {
                    play_id: self.play_id,
                    end,
                });
            }
        }
        None
    }
}

/// Reports a track whose audio pipeline failed.
struct TrackErrorNotifier {
    play_id: u64,
    flags: Arc<TrackFlags>,
    events: EventSink,
}

#[async_trait]
impl songbird::EventHandler for TrackErrorNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            let reason = tracks
                .iter()
                .find_map(|(state, _)| match &state.playing {
                    PlayMode::Errored(e) => Some(format!("{:?}", e)),
                    _ => None,
                })
                .unwrap_or_else(|| "unknown playback error".to_string());

            if self.flags.claim() {
                self.events.emit(SessionEvent::TrackEnded {
                    play_id: self.play_id,
                    end: TrackEnd::Errored(reason),
                });
            }
        }
        None
    }
}

/// Reports that the voice driver lost its connection for good.
struct DisconnectNotifier {
    session_id: u64,
    events: EventSink,
}

#[async_trait]
impl songbird::EventHandler for DisconnectNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::DriverDisconnect(data) = ctx {
            info!(session_id = self.session_id, reason = ?data.reason, "Voice driver disconnected");
            self.events.emit(SessionEvent::Disconnected {
                session_id: self.session_id,
            });
        }
        None
    }
}

/// Opens songbird calls.
pub struct SongbirdTransport {
    songbird: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdTransport {
    pub fn new(songbird: Arc<Songbird>, http: reqwest::Client) -> Self {
        Self { songbird, http }
    }
}

#[async_trait]
impl Transport for SongbirdTransport {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        session_id: u64,
        events: EventSink,
    ) -> MusicResult<Box<dyn TransportSession>> {
        let call = self
            .songbird
            .join(guild_id, channel_id)
            .await
            .map_err(|e| MusicError::JoinError(e.to_string()))?;

        {
            let mut handler = call.lock().await;
            handler.remove_all_global_events();
            handler.add_global_event(
                Event::Core(CoreEvent::DriverDisconnect),
                DisconnectNotifier {
                    session_id,
                    events: events.clone(),
                },
            );
        }

        Ok(Box::new(SongbirdSession {
            session_id,
            guild_id,
            songbird: self.songbird.clone(),
            call,
            http: self.http.clone(),
            events,
            current: None,
            destroyed: false,
        }))
    }
}

struct ActiveTrack {
    handle: TrackHandle,
    flags: Arc<TrackFlags>,
}

/// One voice connection of one player.
pub struct SongbirdSession {
    session_id: u64,
    guild_id: GuildId,
    songbird: Arc<Songbird>,
    call: Arc<SerenityMutex<Call>>,
    http: reqwest::Client,
    events: EventSink,
    current: Option<ActiveTrack>,
    destroyed: bool,
}

impl SongbirdSession {
    fn track(&self) -> MusicResult<&TrackHandle> {
        self.current
            .as_ref()
            .map(|track| &track.handle)
            .ok_or(MusicError::NotConnected)
    }
}

fn control_error(e: songbird::error::ControlError) -> MusicError {
    MusicError::Transport(e.to_string())
}

#[async_trait]
impl TransportSession for SongbirdSession {
    fn session_id(&self) -> u64 {
        self.session_id
    }

    async fn is_connected(&self) -> bool {
        if self.destroyed || self.songbird.get(self.guild_id).is_none() {
            return false;
        }
        self.call.lock().await.current_connection().is_some()
    }

    async fn play(&mut self, stream: AudioStream, volume: f32, play_id: u64) -> MusicResult<()> {
        if let Err(e) = self.halt(true) {
            debug!("Replacing track without a clean stop: {}", e);
        }

        let input = HttpRequest::new(self.http.clone(), stream.url);
        let handle = {
            let mut handler = self.call.lock().await;
            handler.play(Track::from(input).volume(volume))
        };

        let flags = Arc::new(TrackFlags::default());
        handle
            .add_event(
                Event::Track(TrackEvent::End),
                TrackEndNotifier {
                    play_id,
                    flags: flags.clone(),
                    events: self.events.clone(),
                },
            )
            .map_err(control_error)?;
        handle
            .add_event(
                Event::Track(TrackEvent::Error),
                TrackErrorNotifier {
                    play_id,
                    flags: flags.clone(),
                    events: self.events.clone(),
                },
            )
            .map_err(control_error)?;

        debug!(guild_id = %self.guild_id, play_id, source = %stream.source_id, "Track attached");
        self.current = Some(ActiveTrack { handle, flags });
        Ok(())
    }

    fn has_resource(&self) -> bool {
        self.current.is_some()
    }

    fn set_volume(&self, volume: f32) -> MusicResult<()> {
        self.track()?.set_volume(volume).map_err(control_error)
    }

    fn pause(&self) -> MusicResult<()> {
        self.track()?.pause().map_err(control_error)
    }

    fn unpause(&self) -> MusicResult<()> {
        self.track()?.play().map_err(control_error)
    }

    fn halt(&mut self, manual: bool) -> MusicResult<()> {
        let Some(track) = self.current.take() else {
            return Ok(());
        };
        track.flags.manual.store(manual, Ordering::SeqCst);
        track.handle.stop().map_err(control_error)
    }

    async fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        if let Err(e) = self.halt(true) {
            debug!("Track already gone while destroying session: {}", e);
        }
        if let Err(e) = self.songbird.remove(self.guild_id).await {
            error!(guild_id = %self.guild_id, "Failed to leave voice channel: {}", e);
        }
    }
}
