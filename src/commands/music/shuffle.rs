use super::*;

/// Shuffle the upcoming songs
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn shuffle(ctx: Context<'_>) -> CommandResult {
    let (guild_id, user_id) = invoker(ctx)?;

    let result = ctx
        .data()
        .music
        .get(guild_id, user_id, |player| {
            Box::pin(async move {
                player.shuffle();
                player.queue().len().saturating_sub(1)
            })
        })
        .await;

    respond(ctx, result, embedded_messages::shuffled).await
}
