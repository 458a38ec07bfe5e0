//! Common test utilities, fixtures, and mocks
//! This module contains shared functionality used across different test categories

pub mod mocks;

use std::sync::{Arc, Once};
use std::time::Duration;
use tracing::Level;

use rusty_jukebox::commands::music::audio_sources::Resolvers;
use rusty_jukebox::commands::music::utils::music_manager::{MusicManager, MusicResult};
use rusty_jukebox::commands::music::utils::player::{PlayerDeps, PlayerSnapshot};
use rusty_jukebox::config::MusicSettings;
use serenity::model::id::{GuildId, UserId};

use mocks::{FakeTransport, FakeVoice, RecordingObserver, ScriptedMix, StaticPlaylists, StaticYoutube};

static INIT: Once = Once::new();

/// Initialize tracing once per test binary
pub fn init() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .init();
    });
}

/// Polls `condition` until it holds, panicking after two seconds.
pub async fn eventually<F>(what: &str, condition: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// A registry wired to fakes, plus handles on every fake.
pub struct Harness {
    pub manager: Arc<MusicManager>,
    pub transport: Arc<FakeTransport>,
    pub youtube: Arc<StaticYoutube>,
    pub mix: Arc<ScriptedMix>,
    pub voice: Arc<FakeVoice>,
    pub observer: Arc<RecordingObserver>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(fixtures::settings())
    }

    pub fn with_settings(settings: MusicSettings) -> Self {
        init();

        let transport = Arc::new(FakeTransport::default());
        let youtube = Arc::new(StaticYoutube::default());
        let mix = Arc::new(ScriptedMix::default());
        let voice = Arc::new(FakeVoice::default());
        let observer = Arc::new(RecordingObserver::default());

        let deps = PlayerDeps {
            transport: transport.clone(),
            resolvers: Resolvers {
                youtube: youtube.clone(),
                mix: mix.clone(),
                playlists: Arc::new(StaticPlaylists::default()),
            },
            observer: observer.clone(),
        };

        Self {
            manager: MusicManager::new(settings, deps, voice.clone()),
            transport,
            youtube,
            mix,
            voice,
            observer,
        }
    }

    /// Queues plain videos on behalf of `user_id`.
    pub async fn add(&self, guild_id: GuildId, user_id: UserId, ids: &[&str]) -> MusicResult<usize> {
        let songs = ids.iter().map(|id| fixtures::song(id)).collect();
        self.manager
            .get(guild_id, user_id, move |player| {
                Box::pin(async move { player.add(songs).await })
            })
            .await?
    }

    pub async fn snapshot(&self, guild_id: GuildId) -> Option<PlayerSnapshot> {
        self.manager
            .with_existing(guild_id, |player| Box::pin(async move { player.snapshot() }))
            .await
    }
}
