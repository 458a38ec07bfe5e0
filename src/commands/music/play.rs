use super::*;
use crate::commands::music::audio_sources::load_songs;
use tracing::info;

/// Play a song, playlist or mix from YouTube or Spotify, or search YouTube
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn play(
    ctx: Context<'_>,
    #[description = "URL or search query"] query: String,
) -> CommandResult {
    info!("Received play command with query: {}", query);
    let (guild_id, user_id) = invoker(ctx)?;

    // Resolving can take a while (yt-dlp, Spotify)
    ctx.defer().await?;

    let data = ctx.data();
    let songs = match load_songs(&query, user_id, data.music.resolvers(), data.spotify.as_deref()).await {
        Ok(songs) if !songs.is_empty() => songs,
        Ok(_) => {
            ctx.send(embedded_messages::music_error(&MusicError::NotFound(query)))
                .await?;
            return Ok(());
        }
        Err(err) => {
            ctx.send(embedded_messages::music_error(&err)).await?;
            return Ok(());
        }
    };
    let first = songs[0].meta().clone();
    let count = songs.len();

    let result = data
        .music
        .get(guild_id, user_id, move |player| {
            Box::pin(async move {
                let position = player.queue().len();
                player.add(songs).await.map(|_| position)
            })
        })
        .await
        .and_then(|added| added);

    respond(ctx, result, |position| {
        if position == 0 {
            embedded_messages::now_playing(&first)
        } else {
            embedded_messages::added_to_queue(&first, position, count)
        }
    })
    .await
}
