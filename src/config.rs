//! Settings read from the environment (and `.env`, loaded by `main`).

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_HISTORY_SIZE: usize = 5;
pub const DEFAULT_VOLUME: f32 = 0.5;
pub const MAX_VOLUME: f32 = 2.0;
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Per-player settings shared by every guild.
#[derive(Debug, Clone, PartialEq)]
pub struct MusicSettings {
    /// Songs kept for `/back`. Zero disables history.
    pub history_size: usize,
    /// Volume a new player starts with, between 0.0 and 2.0.
    pub default_volume: f32,
    /// Upper bound for resolving a song into a stream.
    pub resolve_timeout: Duration,
    pub ytdlp_path: String,
}

impl Default for MusicSettings {
    fn default() -> Self {
        Self {
            history_size: DEFAULT_HISTORY_SIZE,
            default_volume: DEFAULT_VOLUME,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    pub music: MusicSettings,
    /// Spotify links are refused when this is absent.
    pub spotify: Option<SpotifyCredentials>,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let discord_token = get("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let defaults = MusicSettings::default();
        let default_volume = parse(&get, "MUSIC_DEFAULT_VOLUME", defaults.default_volume)?;
        if !(0.0..=MAX_VOLUME).contains(&default_volume) {
            return Err(ConfigError::Invalid {
                key: "MUSIC_DEFAULT_VOLUME",
                value: default_volume.to_string(),
                reason: format!("must be between 0.0 and {}", MAX_VOLUME),
            });
        }

        let timeout_secs: u64 = parse(
            &get,
            "MUSIC_RESOLVE_TIMEOUT_SECS",
            defaults.resolve_timeout.as_secs(),
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "MUSIC_RESOLVE_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be at least one second".to_string(),
            });
        }

        let music = MusicSettings {
            history_size: parse(&get, "MUSIC_HISTORY_SIZE", defaults.history_size)?,
            default_volume,
            resolve_timeout: Duration::from_secs(timeout_secs),
            ytdlp_path: get("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
        };

        let spotify = match (get("SPOTIFY_CLIENT_ID"), get("SPOTIFY_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(SpotifyCredentials {
                client_id,
                client_secret,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("SPOTIFY_CLIENT_SECRET")),
            (None, Some(_)) => return Err(ConfigError::Missing("SPOTIFY_CLIENT_ID")),
        };

        Ok(Self {
            discord_token,
            music,
            spotify,
        })
    }
}

fn parse<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
