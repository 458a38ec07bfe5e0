use super::*;
use tracing::info;

/// Leave the voice channel and clear the queue
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn leave(ctx: Context<'_>) -> CommandResult {
    let (guild_id, user_id) = invoker(ctx)?;
    let music = &ctx.data().music;

    if !music.is_active(guild_id).await {
        ctx.send(embedded_messages::no_player()).await?;
        return Ok(());
    }

    // Only someone in the player's channel may stop it
    let in_channel = music
        .get(guild_id, user_id, |_player| Box::pin(async {}))
        .await;
    if let Err(err) = in_channel {
        ctx.send(embedded_messages::music_error(&err)).await?;
        return Ok(());
    }

    if music.destroy(guild_id).await {
        info!(%guild_id, "Player destroyed on request");
    }
    ctx.send(embedded_messages::left_voice()).await?;
    Ok(())
}
