use super::*;

/// Remove a song from the queue by its position
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Position as shown by /queue (0 removes the current song)"] position: usize,
) -> CommandResult {
    let (guild_id, user_id) = invoker(ctx)?;

    let result = ctx
        .data()
        .music
        .get(guild_id, user_id, move |player| {
            Box::pin(async move { player.remove(position).await })
        })
        .await
        .and_then(|removed| removed);

    respond(ctx, result, |song| {
        embedded_messages::track_removed(song.meta(), position)
    })
    .await
}
