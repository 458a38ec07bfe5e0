use super::*;

/// Show the current queue
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn queue(ctx: Context<'_>) -> CommandResult {
    let (guild_id, _) = invoker(ctx)?;

    let snapshot = ctx
        .data()
        .music
        .with_existing(guild_id, |player| Box::pin(async move { player.snapshot() }))
        .await;

    let reply = match snapshot {
        Some(snapshot) => embedded_messages::music_queue(&snapshot),
        None => embedded_messages::no_player(),
    };
    ctx.send(reply).await?;
    Ok(())
}
