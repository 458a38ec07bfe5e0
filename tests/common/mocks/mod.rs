//! In-memory stand-ins for the engine's collaborators
//! The transport fake records every call and lets tests fire transport events
//! the way songbird would.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId, UserId};
use serenity::model::permissions::Permissions;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use rusty_jukebox::commands::music::audio_sources::{
    AudioStream, MixBatch, MixEntry, MixProvider, MixRequest, PlaylistExpander, YoutubeResolver,
};
use rusty_jukebox::commands::music::utils::music_manager::{MusicError, MusicResult};
use rusty_jukebox::commands::music::utils::player::{PlayerObserver, PlayerSnapshot};
use rusty_jukebox::commands::music::utils::song::{Song, YoutubeSong};
use rusty_jukebox::commands::music::utils::transport::{
    EventSink, SessionEvent, TrackEnd, Transport, TransportSession,
};
use rusty_jukebox::commands::music::utils::voice::VoiceGateway;

use super::fixtures;

#[derive(Debug, Clone, PartialEq)]
pub struct PlayRecord {
    pub guild_id: GuildId,
    pub source_id: String,
    pub play_id: u64,
    pub volume: f32,
}

struct SessionState {
    session_id: u64,
    channel_id: ChannelId,
    events: EventSink,
    connected: bool,
    current: Option<u64>,
    paused: bool,
    volume: f32,
}

#[derive(Default)]
struct TransportLog {
    connects: Vec<(GuildId, ChannelId)>,
    plays: Vec<PlayRecord>,
    halts: Vec<(GuildId, bool)>,
    destroyed: Vec<GuildId>,
    sessions: HashMap<GuildId, SessionState>,
}

/// Voice transport that never touches the network.
#[derive(Default)]
pub struct FakeTransport {
    log: Arc<Mutex<TransportLog>>,
}

impl FakeTransport {
    pub fn connects(&self) -> usize {
        self.log.lock().unwrap().connects.len()
    }

    pub fn connected_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        let log = self.log.lock().unwrap();
        log.sessions
            .get(&guild_id)
            .filter(|session| session.connected)
            .map(|session| session.channel_id)
    }

    pub fn plays(&self, guild_id: GuildId) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .plays
            .iter()
            .filter(|play| play.guild_id == guild_id)
            .map(|play| play.source_id.clone())
            .collect()
    }

    pub fn last_play(&self, guild_id: GuildId) -> Option<PlayRecord> {
        self.log
            .lock()
            .unwrap()
            .plays
            .iter()
            .rev()
            .find(|play| play.guild_id == guild_id)
            .cloned()
    }

    pub fn halts(&self, guild_id: GuildId) -> Vec<bool> {
        self.log
            .lock()
            .unwrap()
            .halts
            .iter()
            .filter(|(guild, _)| *guild == guild_id)
            .map(|(_, manual)| *manual)
            .collect()
    }

    pub fn destroyed(&self, guild_id: GuildId) -> usize {
        self.log
            .lock()
            .unwrap()
            .destroyed
            .iter()
            .filter(|guild| **guild == guild_id)
            .count()
    }

    pub fn is_paused(&self, guild_id: GuildId) -> bool {
        self.log
            .lock()
            .unwrap()
            .sessions
            .get(&guild_id)
            .is_some_and(|session| session.paused)
    }

    pub fn resource_volume(&self, guild_id: GuildId) -> Option<f32> {
        self.log
            .lock()
            .unwrap()
            .sessions
            .get(&guild_id)
            .filter(|session| session.current.is_some())
            .map(|session| session.volume)
    }

    /// The current resource plays to its end.
    pub fn finish_current(&self, guild_id: GuildId) {
        self.end_current(guild_id, TrackEnd::Completed);
    }

    /// The current resource's audio pipeline breaks.
    pub fn fail_current(&self, guild_id: GuildId, reason: &str) {
        self.end_current(guild_id, TrackEnd::Errored(reason.to_string()));
    }

    fn end_current(&self, guild_id: GuildId, end: TrackEnd) {
        let mut log = self.log.lock().unwrap();
        let session = log.sessions.get_mut(&guild_id).expect("no session for guild");
        let play_id = session.current.take().expect("nothing is playing");
        session.events.emit(SessionEvent::TrackEnded { play_id, end });
    }

    /// The voice connection drops on its own.
    pub fn drop_connection(&self, guild_id: GuildId) {
        let mut log = self.log.lock().unwrap();
        let session = log.sessions.get_mut(&guild_id).expect("no session for guild");
        session.connected = false;
        session.current = None;
        session.events.emit(SessionEvent::Disconnected {
            session_id: session.session_id,
        });
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        session_id: u64,
        events: EventSink,
    ) -> MusicResult<Box<dyn TransportSession>> {
        let mut log = self.log.lock().unwrap();
        log.connects.push((guild_id, channel_id));
        log.sessions.insert(
            guild_id,
            SessionState {
                session_id,
                channel_id,
                events,
                connected: true,
                current: None,
                paused: false,
                volume: 0.0,
            },
        );

        Ok(Box::new(FakeSession {
            guild_id,
            session_id,
            log: self.log.clone(),
        }))
    }
}

struct FakeSession {
    guild_id: GuildId,
    session_id: u64,
    log: Arc<Mutex<TransportLog>>,
}

impl FakeSession {
    /// Runs `f` on this session's state, if it is still the guild's session.
    fn with_state<T>(&self, f: impl FnOnce(&mut SessionState) -> T) -> Option<T> {
        let mut log = self.log.lock().unwrap();
        log.sessions
            .get_mut(&self.guild_id)
            .filter(|session| session.session_id == self.session_id)
            .map(f)
    }

    fn with_resource(&self, f: impl FnOnce(&mut SessionState)) -> MusicResult<()> {
        self.with_state(|session| match session.current {
            Some(_) => {
                f(session);
                Ok(())
            }
            None => Err(MusicError::NotConnected),
        })
        .unwrap_or(Err(MusicError::NotConnected))
    }
}

#[async_trait]
impl TransportSession for FakeSession {
    fn session_id(&self) -> u64 {
        self.session_id
    }

    async fn is_connected(&self) -> bool {
        self.with_state(|session| session.connected).unwrap_or(false)
    }

    async fn play(&mut self, stream: AudioStream, volume: f32, play_id: u64) -> MusicResult<()> {
        let guild_id = self.guild_id;
        let mut log = self.log.lock().unwrap();
        log.plays.push(PlayRecord {
            guild_id,
            source_id: stream.source_id,
            play_id,
            volume,
        });
        let session = log
            .sessions
            .get_mut(&guild_id)
            .filter(|session| session.session_id == self.session_id && session.connected)
            .ok_or(MusicError::NotConnected)?;
        session.current = Some(play_id);
        session.paused = false;
        session.volume = volume;
        Ok(())
    }

    fn has_resource(&self) -> bool {
        self.with_state(|session| session.current.is_some())
            .unwrap_or(false)
    }

    fn set_volume(&self, volume: f32) -> MusicResult<()> {
        self.with_resource(|session| session.volume = volume)
    }

    fn pause(&self) -> MusicResult<()> {
        self.with_resource(|session| session.paused = true)
    }

    fn unpause(&self) -> MusicResult<()> {
        self.with_resource(|session| session.paused = false)
    }

    fn halt(&mut self, manual: bool) -> MusicResult<()> {
        self.log.lock().unwrap().halts.push((self.guild_id, manual));
        self.with_state(|session| {
            if let Some(play_id) = session.current.take() {
                let end = if manual {
                    TrackEnd::StoppedByOwner
                } else {
                    TrackEnd::Completed
                };
                session.events.emit(SessionEvent::TrackEnded { play_id, end });
            }
        });
        Ok(())
    }

    async fn destroy(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.destroyed.push(self.guild_id);
        if let Some(session) = log.sessions.get_mut(&self.guild_id) {
            if session.session_id == self.session_id {
                session.connected = false;
                session.current = None;
            }
        }
    }
}

/// Resolver that knows every video id. Ids listed as broken fail to stream,
/// ids listed as hanging never answer.
#[derive(Default)]
pub struct StaticYoutube {
    broken: Mutex<HashSet<String>>,
    hanging: Mutex<HashSet<String>>,
    streamed: Mutex<Vec<String>>,
}

impl StaticYoutube {
    pub fn break_video(&self, id: &str) {
        self.broken.lock().unwrap().insert(id.to_string());
    }

    pub fn hang_video(&self, id: &str) {
        self.hanging.lock().unwrap().insert(id.to_string());
    }

    /// How often `id` was asked for a stream.
    pub fn stream_attempts(&self, id: &str) -> usize {
        self.streamed
            .lock()
            .unwrap()
            .iter()
            .filter(|streamed| *streamed == id)
            .count()
    }
}

#[async_trait]
impl YoutubeResolver for StaticYoutube {
    async fn video(&self, video_id: &str) -> MusicResult<YoutubeSong> {
        Ok(YoutubeSong::new(fixtures::meta(video_id)))
    }

    async fn search(&self, query: &str) -> MusicResult<Option<YoutubeSong>> {
        if query == "nothing" {
            return Ok(None);
        }
        let id = format!("search-{}", query.replace(' ', "-"));
        Ok(Some(YoutubeSong::new(fixtures::meta(&id))))
    }

    async fn stream(&self, video_id: &str) -> MusicResult<AudioStream> {
        self.streamed.lock().unwrap().push(video_id.to_string());

        let hangs = self.hanging.lock().unwrap().contains(video_id);
        if hangs {
            std::future::pending::<()>().await;
        }
        if self.broken.lock().unwrap().contains(video_id) {
            return Err(MusicError::AudioSourceError(format!("{} is unavailable", video_id)));
        }
        Ok(AudioStream::new(video_id, format!("https://media.test/{}", video_id)))
    }
}

/// Mix provider answering from a script of batches. Once the script runs out
/// every request gets an empty batch.
#[derive(Default)]
pub struct ScriptedMix {
    batches: Mutex<VecDeque<MixBatch>>,
    requests: Mutex<Vec<MixRequest>>,
}

impl ScriptedMix {
    pub fn push_batch(&self, ids: &[&str], session_token: Option<&str>) {
        self.batches.lock().unwrap().push_back(MixBatch {
            entries: ids.iter().map(|id| entry(id)).collect(),
            session_token: session_token.map(str::to_string),
        });
    }

    pub fn requests(&self) -> Vec<MixRequest> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn entry(id: &str) -> MixEntry {
    MixEntry {
        id: id.to_string(),
        title: format!("Title {}", id),
        length_seconds: Some(200),
        thumbnail: None,
    }
}

#[async_trait]
impl MixProvider for ScriptedMix {
    async fn next_batch(&self, request: &MixRequest) -> MusicResult<MixBatch> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.batches.lock().unwrap().pop_front().unwrap_or_default())
    }
}

/// Every playlist holds the same three videos.
#[derive(Default)]
pub struct StaticPlaylists;

#[async_trait]
impl PlaylistExpander for StaticPlaylists {
    async fn expand(&self, playlist_id: &str) -> MusicResult<Vec<Song>> {
        Ok((1..=3)
            .map(|n| fixtures::song(&format!("{}-{}", playlist_id, n)))
            .collect())
    }
}

/// Voice states and permissions set by the test.
pub struct FakeVoice {
    channels: Mutex<HashMap<UserId, ChannelId>>,
    permissions: Mutex<Permissions>,
}

impl Default for FakeVoice {
    fn default() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            permissions: Mutex::new(Permissions::CONNECT | Permissions::SPEAK),
        }
    }
}

impl FakeVoice {
    pub fn join(&self, user_id: UserId, channel_id: ChannelId) {
        self.channels.lock().unwrap().insert(user_id, channel_id);
    }

    pub fn set_permissions(&self, permissions: Permissions) {
        *self.permissions.lock().unwrap() = permissions;
    }
}

impl VoiceGateway for FakeVoice {
    fn user_channel(&self, _guild_id: GuildId, user_id: UserId) -> MusicResult<ChannelId> {
        self.channels
            .lock()
            .unwrap()
            .get(&user_id)
            .copied()
            .ok_or(MusicError::UserNotInVoiceChannel)
    }

    fn bot_permissions(&self, _guild_id: GuildId, _channel_id: ChannelId) -> MusicResult<Permissions> {
        Ok(*self.permissions.lock().unwrap())
    }
}

/// Remembers everything the players reported.
#[derive(Default)]
pub struct RecordingObserver {
    snapshots: Mutex<Vec<PlayerSnapshot>>,
    idle: Mutex<Vec<GuildId>>,
}

impl RecordingObserver {
    pub fn snapshots(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }

    pub fn last_snapshot(&self) -> Option<PlayerSnapshot> {
        self.snapshots.lock().unwrap().last().cloned()
    }

    /// How often `guild_id` reported that nothing is left to play.
    pub fn idle_reports(&self, guild_id: GuildId) -> usize {
        self.idle
            .lock()
            .unwrap()
            .iter()
            .filter(|guild| **guild == guild_id)
            .count()
    }
}

impl PlayerObserver for RecordingObserver {
    fn queue_changed(&self, snapshot: &PlayerSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }

    fn nothing_playing(&self, guild_id: GuildId) {
        self.idle.lock().unwrap().push(guild_id);
    }
}
