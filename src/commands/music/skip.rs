use super::*;

/// Skip the current song
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn skip(
    ctx: Context<'_>,
    #[description = "Skip the whole mix instead of moving to its next video"] force: Option<bool>,
) -> CommandResult {
    let (guild_id, user_id) = invoker(ctx)?;
    let force = force.unwrap_or(false);

    let result = ctx
        .data()
        .music
        .get(guild_id, user_id, move |player| {
            Box::pin(async move {
                player.skip(force).await;
                player.queue().current().map(|song| song.meta().clone())
            })
        })
        .await;

    respond(ctx, result, |next| embedded_messages::skipped(next.as_ref())).await
}
