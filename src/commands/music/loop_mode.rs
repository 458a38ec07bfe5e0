use super::*;
use crate::commands::music::utils::queue::LoopPolicy;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum LoopChoice {
    #[name = "Off"]
    Off,
    #[name = "Song"]
    Song,
    #[name = "Queue"]
    Queue,
}

impl From<LoopChoice> for LoopPolicy {
    fn from(choice: LoopChoice) -> Self {
        match choice {
            LoopChoice::Off => LoopPolicy::None,
            LoopChoice::Song => LoopPolicy::Song,
            LoopChoice::Queue => LoopPolicy::All,
        }
    }
}

/// Set the loop mode, or cycle through off, song and queue
#[poise::command(slash_command, guild_only, rename = "loop", category = "Music")]
pub async fn loop_mode(
    ctx: Context<'_>,
    #[description = "Loop mode (cycles when left out)"] mode: Option<LoopChoice>,
) -> CommandResult {
    let (guild_id, user_id) = invoker(ctx)?;
    let policy = mode.map(LoopPolicy::from);

    let result = ctx
        .data()
        .music
        .get(guild_id, user_id, move |player| {
            Box::pin(async move { player.set_loop_policy(policy) })
        })
        .await;

    respond(ctx, result, embedded_messages::loop_policy).await
}
