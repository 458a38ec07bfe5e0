pub mod back;
pub mod leave;
pub mod loop_mode;
pub mod pause;
pub mod play;
pub mod queue;
pub mod remove;
pub mod shuffle;
pub mod skip;
pub mod volume;

pub mod audio_sources;
pub mod utils;

use poise::CreateReply;
use serenity::model::id::{GuildId, UserId};

use crate::{CommandResult, Context, Data, Error};
use utils::embedded_messages;
use utils::music_manager::{MusicError, MusicResult};

/// Every music command, in help order.
pub fn commands() -> Vec<poise::Command<Data, Error>> {
    vec![
        play::play(),
        pause::pause(),
        skip::skip(),
        back::back(),
        queue::queue(),
        remove::remove(),
        shuffle::shuffle(),
        loop_mode::loop_mode(),
        volume::volume(),
        leave::leave(),
    ]
}

/// Guild and author of the invocation.
fn invoker(ctx: Context<'_>) -> MusicResult<(GuildId, UserId)> {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;
    Ok((guild_id, ctx.author().id))
}

/// Sends `reply` for a successful operation or the error embed otherwise.
async fn respond<T>(
    ctx: Context<'_>,
    result: MusicResult<T>,
    reply: impl FnOnce(T) -> CreateReply,
) -> CommandResult {
    let message = match result {
        Ok(value) => reply(value),
        Err(err) => embedded_messages::music_error(&err),
    };
    ctx.send(message).await?;
    Ok(())
}
