//! Voice state lookups the registry needs before it touches a player.

use poise::serenity_prelude as serenity;
use serenity::model::id::{ChannelId, GuildId, UserId};
use serenity::model::permissions::Permissions;
use std::sync::Arc;

use super::music_manager::{MusicError, MusicResult};

/// Permissions the bot needs in a voice channel to play there.
pub fn required_permissions() -> Permissions {
    Permissions::CONNECT | Permissions::SPEAK
}

pub trait VoiceGateway: Send + Sync {
    /// The voice channel `user_id` currently sits in.
    fn user_channel(&self, guild_id: GuildId, user_id: UserId) -> MusicResult<ChannelId>;

    /// The bot's effective permissions in `channel_id`.
    fn bot_permissions(&self, guild_id: GuildId, channel_id: ChannelId) -> MusicResult<Permissions>;
}

/// Answers from serenity's gateway cache.
pub struct CacheVoiceGateway {
    cache: Arc<serenity::Cache>,
}

impl CacheVoiceGateway {
    pub fn new(cache: Arc<serenity::Cache>) -> Self {
        Self { cache }
    }
}

impl VoiceGateway for CacheVoiceGateway {
    fn user_channel(&self, guild_id: GuildId, user_id: UserId) -> MusicResult<ChannelId> {
        let guild = self.cache.guild(guild_id).ok_or(MusicError::NotInGuild)?;

        guild
            .voice_states
            .get(&user_id)
            .and_then(|voice_state| voice_state.channel_id)
            .ok_or(MusicError::UserNotInVoiceChannel)
    }

    fn bot_permissions(&self, guild_id: GuildId, channel_id: ChannelId) -> MusicResult<Permissions> {
        let bot_id = self.cache.current_user().id;
        let guild = self.cache.guild(guild_id).ok_or(MusicError::NotInGuild)?;

        let channel = guild
            .channels
            .get(&channel_id)
            .ok_or(MusicError::MissingPermissions(channel_id))?;
        let member = guild
            .members
            .get(&bot_id)
            .ok_or(MusicError::MissingPermissions(channel_id))?;

        Ok(guild.user_permissions_in(channel, member))
    }
}
