use poise::serenity_prelude as serenity;
use tracing::{debug, info};

use crate::{Data, Error};

/// Gateway events the bot reacts to outside of commands.
pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            info!("{} is connected", data_about_bot.user.name);
        }
        serenity::FullEvent::VoiceStateUpdate { new, .. } => {
            let bot_id = ctx.cache.current_user().id;
            if new.user_id != bot_id {
                return Ok(());
            }
            let Some(guild_id) = new.guild_id else {
                return Ok(());
            };

            debug!(%guild_id, channel_id = ?new.channel_id, "Bot voice state changed");
            data.music
                .voice_presence_changed(guild_id, new.channel_id)
                .await;
        }
        _ => {}
    }
    Ok(())
}
