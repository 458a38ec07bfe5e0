use super::*;
use crate::commands::music::utils::player::PlaybackStatus;

/// Pause or resume the current song
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn pause(ctx: Context<'_>) -> CommandResult {
    let (guild_id, user_id) = invoker(ctx)?;

    let result = ctx
        .data()
        .music
        .get(guild_id, user_id, |player| {
            Box::pin(async move {
                let current = player.queue().current().map(|song| song.meta().clone());
                let paused = player.status() != PlaybackStatus::Paused;
                let toggled = if paused { player.pause() } else { player.unpause() };
                toggled.map(|_| (paused, current))
            })
        })
        .await
        .and_then(|toggled| toggled);

    respond(ctx, result, |(paused, current)| {
        if paused {
            embedded_messages::paused(current.as_ref())
        } else {
            embedded_messages::resumed(current.as_ref())
        }
    })
    .await
}
