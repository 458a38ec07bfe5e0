use dashmap::DashMap;
use futures::future::BoxFuture;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::watch;
use tracing::{debug, info};

use super::guild_lock::KeyedLock;
use super::player::{Player, PlayerDeps};
use super::transport::{EventSink, SessionEvent};
use super::voice::{VoiceGateway, required_permissions};
use crate::commands::music::audio_sources::Resolvers;
use crate::config::MusicSettings;

/// Errors that can occur during music operations
#[derive(Error, Debug)]
pub enum MusicError {
    #[error("Not in a guild")]
    NotInGuild,

    #[error("Failed to join voice channel: {0}")]
    JoinError(String),

    #[error("Not connected to a voice channel")]
    NotConnected,

    #[error("User is not in a voice channel")]
    UserNotInVoiceChannel,

    #[error("Missing Connect or Speak permission in <#{0}>")]
    MissingPermissions(ChannelId),

    #[error("Already playing in <#{0}>")]
    BoundToOtherChannel(ChannelId),

    #[error("Audio source error: {0}")]
    AudioSourceError(String),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Nothing found for {0}")]
    NotFound(String),

    #[error("Playlist {0} must be expanded before queueing")]
    UnexpandedPlaylist(String),

    #[error("No song at position {index} (queue has {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Voice transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No queue")]
    NoQueue,
}

/// Result type for music operations
pub type MusicResult<T> = Result<T, MusicError>;

/// Registry of per-guild players.
///
/// Every access to a player goes through its guild's lock, commands and
/// transport events alike. Different guilds never contend.
pub struct MusicManager {
    players: KeyedLock<GuildId, Player>,
    /// Retirement switch of each live player, reachable without its lock.
    retire: DashMap<GuildId, watch::Sender<bool>>,
    deps: PlayerDeps,
    voice: Arc<dyn VoiceGateway>,
    settings: MusicSettings,
    this: Weak<MusicManager>,
}

impl MusicManager {
    pub fn new(settings: MusicSettings, deps: PlayerDeps, voice: Arc<dyn VoiceGateway>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            players: KeyedLock::new(),
            retire: DashMap::new(),
            deps,
            voice,
            settings,
            this: this.clone(),
        })
    }

    pub fn resolvers(&self) -> &Resolvers {
        &self.deps.resolvers
    }

    pub fn settings(&self) -> &MusicSettings {
        &self.settings
    }

    /// Runs `callback` on the player of `guild_id` on behalf of `user_id`.
    ///
    /// The user must be in a voice channel the bot may connect and speak in.
    /// A missing player is created bound to that channel; an existing one
    /// bound elsewhere refuses. All checks happen before any state changes.
    pub async fn get<R, F>(&self, guild_id: GuildId, user_id: UserId, callback: F) -> MusicResult<R>
    where
        F: for<'p> FnOnce(&'p mut Player) -> BoxFuture<'p, R> + Send,
        R: Send,
    {
        let channel_id = self.voice.user_channel(guild_id, user_id)?;
        let permissions = self.voice.bot_permissions(guild_id, channel_id)?;
        if !permissions.contains(required_permissions()) {
            return Err(MusicError::MissingPermissions(channel_id));
        }

        self.with_player(guild_id, channel_id, callback).await
    }

    /// Runs `callback` on the player of `guild_id`, creating one bound to
    /// `channel_id` if there is none.
    pub async fn with_player<R, F>(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        callback: F,
    ) -> MusicResult<R>
    where
        F: for<'p> FnOnce(&'p mut Player) -> BoxFuture<'p, R> + Send,
        R: Send,
    {
        let mut slot = self.players.lock(guild_id).await;

        if let Some(player) = slot.as_ref() {
            if player.channel_id() != channel_id {
                return Err(MusicError::BoundToOtherChannel(player.channel_id()));
            }
        }

        let player = slot.get_or_insert_with(|| self.create_player(guild_id, channel_id));
        Ok(callback(player).await)
    }

    /// Runs `callback` only if `guild_id` has a player. Never creates one.
    pub async fn with_existing<R, F>(&self, guild_id: GuildId, callback: F) -> Option<R>
    where
        F: for<'p> FnOnce(&'p mut Player) -> BoxFuture<'p, R> + Send,
        R: Send,
    {
        let mut slot = self.players.lock_existing(&guild_id).await?;
        let player = slot.as_mut()?;
        Some(callback(player).await)
    }

    /// Tears down the player of `guild_id`. Returns whether there was one.
    /// The next access creates a fresh player.
    ///
    /// The player is retired before the lock is taken, so a `play()` still
    /// resolving a stream gives up instead of connecting again.
    pub async fn destroy(&self, guild_id: GuildId) -> bool {
        if let Some(retire) = self.retire.get(&guild_id) {
            retire.send_replace(true);
        }

        let Some(mut slot) = self.players.lock_existing(&guild_id).await else {
            return false;
        };
        self.retire.remove(&guild_id);
        match slot.take() {
            Some(mut player) => {
                player.destroy().await;
                true
            }
            None => false,
        }
    }

    /// Follows the bot's own voice state. Leaving voice destroys the player;
    /// being moved rebinds it.
    pub async fn voice_presence_changed(&self, guild_id: GuildId, channel_id: Option<ChannelId>) {
        match channel_id {
            None => {
                if self.destroy(guild_id).await {
                    info!(%guild_id, "Bot left voice, player destroyed");
                }
            }
            Some(channel_id) => {
                let rebound = self
                    .with_existing(guild_id, move |player| {
                        Box::pin(async move {
                            player.rebind(channel_id);
                        })
                    })
                    .await;
                if rebound.is_some() {
                    debug!(%guild_id, %channel_id, "Player follows bot to new channel");
                }
            }
        }
    }

    /// Whether `guild_id` currently has a player.
    pub async fn is_active(&self, guild_id: GuildId) -> bool {
        match self.players.lock_existing(&guild_id).await {
            Some(slot) => slot.is_some(),
            None => false,
        }
    }

    fn create_player(&self, guild_id: GuildId, channel_id: ChannelId) -> Player {
        info!(%guild_id, %channel_id, "Creating player");
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::forward_events(self.this.clone(), guild_id, rx));
        let (retire, retired) = watch::channel(false);
        self.retire.insert(guild_id, retire);

        Player::new(
            guild_id,
            channel_id,
            self.settings.clone(),
            self.deps.clone(),
            EventSink::new(tx),
            retired,
        )
    }

    /// Feeds transport events back into the player under the guild lock.
    /// Ends when the player (and with it every sender) is dropped.
    async fn forward_events(
        manager: Weak<MusicManager>,
        guild_id: GuildId,
        mut events: UnboundedReceiver<SessionEvent>,
    ) {
        while let Some(event) = events.recv().await {
            let Some(manager) = manager.upgrade() else {
                break;
            };
            let handled = manager
                .with_existing(guild_id, move |player| {
                    Box::pin(async move { player.handle_event(event).await })
                })
                .await;
            if handled.is_none() {
                debug!(%guild_id, "Dropping session event, player was destroyed");
            }
        }
        debug!(%guild_id, "Session event listener stopped");
    }
}
