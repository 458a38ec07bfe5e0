use poise::{CreateReply, serenity_prelude as serenity};
use serenity::all::CreateEmbed;
use std::time::Duration;

use super::music_manager::MusicError;
use super::player::{PlaybackStatus, PlayerSnapshot};
use super::queue::LoopPolicy;
use super::song::SongMeta;
use super::format_duration;

const SUCCESS: u32 = 0x00ff00;
const FAILURE: u32 = 0xff0000;

/// Rows shown by `/queue` before the list is cut off.
const QUEUE_PAGE: usize = 10;

fn reply(embed: CreateEmbed) -> CreateReply {
    CreateReply::default().embed(embed)
}

fn link(meta: &SongMeta) -> String {
    format!("[{}]({})", meta.title, meta.uri)
}

fn length(meta: &SongMeta) -> String {
    meta.length_display
        .clone()
        .unwrap_or_else(|| "Unknown duration".to_string())
}

fn with_thumbnail(embed: CreateEmbed, meta: &SongMeta) -> CreateEmbed {
    match &meta.thumbnail {
        Some(url) => embed.thumbnail(url),
        None => embed,
    }
}

/// Create an embed for when a song is now playing
pub fn now_playing(meta: &SongMeta) -> CreateReply {
    let embed = CreateEmbed::new()
        .title("🎵 Now Playing")
        .description(link(meta))
        .field("Duration", format!("`{}`", length(meta)), true)
        .color(SUCCESS);

    reply(with_thumbnail(embed, meta))
}

/// Create an embed for songs added to the queue. `position` is where the
/// first one landed.
pub fn added_to_queue(meta: &SongMeta, position: usize, count: usize) -> CreateReply {
    let mut embed = CreateEmbed::new()
        .title("🎵 Added to Queue")
        .description(link(meta))
        .field("Duration", format!("`{}`", length(meta)), true)
        .field("Position", format!("`#{}`", position), true)
        .color(SUCCESS);

    if count > 1 {
        embed = embed.field("Songs", format!("`{}` added", count), true);
    }

    reply(with_thumbnail(embed, meta))
}

/// Create an embed for the music queue
pub fn music_queue(snapshot: &PlayerSnapshot) -> CreateReply {
    let mut description = String::new();

    match snapshot.current() {
        Some(current) => {
            let label = match snapshot.status {
                PlaybackStatus::Paused => "⏸️ Paused",
                _ => "🎵 Now Playing",
            };
            description.push_str(&format!("**{}**\n**{}** `{}`\n\n", label, link(current), length(current)));
        }
        None => description.push_str("**🔇 Nothing playing**\n\n"),
    }

    let upcoming = &snapshot.queue[snapshot.queue.len().min(1)..];
    if upcoming.is_empty() {
        description.push_str("**📭 Queue is empty**");
    } else {
        description.push_str(&format!("**📋 Up next - {} songs**\n", upcoming.len()));
        for (index, meta) in upcoming.iter().take(QUEUE_PAGE).enumerate() {
            description.push_str(&format!("`{}.` {} `{}`\n", index + 1, link(meta), length(meta)));
        }
        if upcoming.len() > QUEUE_PAGE {
            description.push_str(&format!("…and {} more\n", upcoming.len() - QUEUE_PAGE));
        }

        let total: Duration = upcoming.iter().filter_map(SongMeta::length).sum();
        if !total.is_zero() {
            description.push_str(&format!("\n**⏱️ Total Duration:** `{}`", format_duration(total)));
        }
    }

    reply(
        CreateEmbed::new()
            .title("🎵 Music Queue")
            .description(description)
            .field("Loop", format!("`{}`", snapshot.loop_policy), true)
            .field("Volume", format!("`{:.0}%`", snapshot.volume * 100.0), true)
            .color(SUCCESS),
    )
}

/// Create an embed for when a skip or back moved playback on
pub fn skipped(next: Option<&SongMeta>) -> CreateReply {
    let description = match next {
        Some(meta) => format!("Up next: {}", link(meta)),
        None => "Nothing left in the queue".to_string(),
    };

    reply(
        CreateEmbed::new()
            .title("⏭️ Skipped")
            .description(description)
            .color(SUCCESS),
    )
}

pub fn went_back(meta: Option<&SongMeta>) -> CreateReply {
    match meta {
        Some(meta) => reply(
            CreateEmbed::new()
                .title("⏮️ Back")
                .description(format!("Replaying {}", link(meta)))
                .color(SUCCESS),
        ),
        None => error_message("There is no previous song"),
    }
}

/// Create an embed for when a track is removed from the queue
pub fn track_removed(meta: &SongMeta, position: usize) -> CreateReply {
    reply(
        CreateEmbed::new()
            .title("🗑️ Track Removed")
            .description(format!("Removed {} from position `#{}`", link(meta), position))
            .color(SUCCESS),
    )
}

pub fn shuffled(count: usize) -> CreateReply {
    reply(
        CreateEmbed::new()
            .title("🔀 Shuffled")
            .description(format!("Shuffled `{}` upcoming songs", count))
            .color(SUCCESS),
    )
}

pub fn loop_policy(policy: LoopPolicy) -> CreateReply {
    let description = match policy {
        LoopPolicy::None => "Looping is off",
        LoopPolicy::Song => "Looping the current song",
        LoopPolicy::All => "Looping the whole queue",
    };

    reply(
        CreateEmbed::new()
            .title("🔁 Loop")
            .description(description)
            .color(SUCCESS),
    )
}

/// Create an embed for when a track is paused
pub fn paused(meta: Option<&SongMeta>) -> CreateReply {
    let description = meta
        .map(|meta| format!("Paused {}", link(meta)))
        .unwrap_or_else(|| "Paused".to_string());

    reply(
        CreateEmbed::new()
            .title("⏸️ Paused")
            .description(description)
            .color(SUCCESS),
    )
}

/// Create an embed for when a track is resumed
pub fn resumed(meta: Option<&SongMeta>) -> CreateReply {
    let description = meta
        .map(|meta| format!("Resumed {}", link(meta)))
        .unwrap_or_else(|| "Resumed".to_string());

    reply(
        CreateEmbed::new()
            .title("▶️ Resumed")
            .description(description)
            .color(SUCCESS),
    )
}

pub fn volume(volume: f32) -> CreateReply {
    reply(
        CreateEmbed::new()
            .title("🔊 Volume")
            .description(format!("Volume set to `{:.0}%`", volume * 100.0))
            .color(SUCCESS),
    )
}

pub fn left_voice() -> CreateReply {
    reply(
        CreateEmbed::new()
            .title("👋 Left")
            .description("Disconnected and cleared the queue")
            .color(SUCCESS),
    )
}

/// Create an embed for when there is no active player in this guild
pub fn no_player() -> CreateReply {
    error_message("Nothing is playing in this server")
}

/// Create an embed for a failed music operation. Errors caused by the
/// caller's own voice state are only shown to them.
pub fn music_error(err: &MusicError) -> CreateReply {
    let ephemeral = matches!(
        err,
        MusicError::UserNotInVoiceChannel
            | MusicError::BoundToOtherChannel(_)
            | MusicError::MissingPermissions(_)
            | MusicError::IndexOutOfRange { .. }
    );

    error_message(&err.to_string()).ephemeral(ephemeral)
}

fn error_message(description: &str) -> CreateReply {
    reply(
        CreateEmbed::new()
            .title("❌ Error")
            .description(description)
            .color(FAILURE),
    )
}
