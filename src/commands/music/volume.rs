use super::*;

/// Set the playback volume
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn volume(
    ctx: Context<'_>,
    #[description = "Volume in percent (0-200)"]
    #[min = 0]
    #[max = 200]
    percent: u32,
) -> CommandResult {
    let (guild_id, user_id) = invoker(ctx)?;
    let volume = percent as f32 / 100.0;

    let result = ctx
        .data()
        .music
        .get(guild_id, user_id, move |player| {
            Box::pin(async move { player.set_volume(volume) })
        })
        .await;

    respond(ctx, result, embedded_messages::volume).await
}
