use super::*;

/// Replay the previous song
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn back(ctx: Context<'_>) -> CommandResult {
    let (guild_id, user_id) = invoker(ctx)?;

    let result = ctx
        .data()
        .music
        .get(guild_id, user_id, |player| {
            Box::pin(async move {
                if player.back().await {
                    player.queue().current().map(|song| song.meta().clone())
                } else {
                    None
                }
            })
        })
        .await;

    respond(ctx, result, |previous| embedded_messages::went_back(previous.as_ref())).await
}
