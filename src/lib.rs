//! Per-guild music playback for a Discord bot.
//!
//! Each guild gets one [`Player`](commands::music::utils::player::Player) that
//! owns its queue and voice session. The
//! [`MusicManager`](commands::music::utils::music_manager::MusicManager)
//! serializes every access to a guild's player, from slash commands and from
//! the voice transport alike.

use poise::serenity_prelude as serenity;
use songbird::Songbird;
use std::sync::{Arc, LazyLock};

pub mod commands;
pub mod config;
pub mod events;

use commands::music::audio_sources::Resolvers;
use commands::music::audio_sources::spotify::SpotifyApi;
use commands::music::audio_sources::youtube::YtDlpClient;
use commands::music::utils::event_handlers::SongbirdTransport;
use commands::music::utils::music_manager::MusicManager;
use commands::music::utils::player::{PlayerDeps, TracingObserver};
use commands::music::utils::voice::CacheVoiceGateway;
use config::BotConfig;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type CommandResult = Result<(), Error>;

/// Shared HTTP client for Spotify and songbird's HTTP inputs.
pub static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(reqwest::Client::new);

/// User data, which is stored and accessible in all command invocations
pub struct Data {
    pub music: Arc<MusicManager>,
    pub spotify: Option<Arc<SpotifyApi>>,
}

impl Data {
    /// Wires the production collaborators: yt-dlp for YouTube, songbird for
    /// voice and the gateway cache for voice states.
    pub fn new(config: &BotConfig, cache: Arc<serenity::Cache>, songbird: Arc<Songbird>) -> Self {
        let ytdlp = Arc::new(YtDlpClient::new(
            config.music.ytdlp_path.clone(),
            HTTP_CLIENT.clone(),
        ));
        let resolvers = Resolvers {
            youtube: ytdlp.clone(),
            mix: ytdlp.clone(),
            playlists: ytdlp,
        };

        let deps = PlayerDeps {
            transport: Arc::new(SongbirdTransport::new(songbird, HTTP_CLIENT.clone())),
            resolvers,
            observer: Arc::new(TracingObserver),
        };

        Self {
            music: MusicManager::new(
                config.music.clone(),
                deps,
                Arc::new(CacheVoiceGateway::new(cache)),
            ),
            spotify: config
                .spotify
                .clone()
                .map(|credentials| Arc::new(SpotifyApi::new(credentials))),
        }
    }
}
