use poise::{CreateReply, serenity_prelude as serenity};
use serenity::all::CreateEmbed;

use super::format_duration;
use super::messaging::PlayerMessage;
use super::music_manager::MusicError;
use super::queue_manager::{QueueSnapshot, Song};

/// The channel message for the song that is playing, with the player controls
pub fn now_playing(title: &str) -> PlayerMessage {
    PlayerMessage {
        content: format!("Now playing: {}", title),
        controls: true,
    }
}

/// The channel message announcing a song queued behind the current one
pub fn added_to_queue(title: &str) -> PlayerMessage {
    PlayerMessage {
        content: format!("Added to the queue: {}", title),
        controls: false,
    }
}

fn describe(song: &Song) -> String {
    match song.duration {
        Some(duration) => format!("{} `{}`", song.title, format_duration(duration)),
        None => song.title.clone(),
    }
}

/// Reply to a play command that started playback right away
pub fn playing_now(song: &Song) -> CreateReply {
    CreateReply::default()
        .embed(
            CreateEmbed::new()
                .title("🎵 Now Playing")
                .description(describe(song))
                .color(0x00ff00),
        )
        .ephemeral(true)
}

/// Reply to a play command that queued its song
pub fn queued(song: &Song, position: usize) -> CreateReply {
    CreateReply::default()
        .embed(
            CreateEmbed::new()
                .title("🎵 Added to Queue")
                .description(describe(song))
                .field("Position", format!("`#{}`", position), true)
                .color(0x00ff00),
        )
        .ephemeral(true)
}

fn queue_description(snapshot: &QueueSnapshot) -> String {
    let mut description = String::new();

    match &snapshot.current {
        Some(song) => description.push_str(&format!("**🎵 Now Playing**\n{}\n\n", describe(song))),
        None => description.push_str("**🔇 Nothing playing**\n\n"),
    }

    if snapshot.upcoming.is_empty() {
        description.push_str("**📭 Queue is empty**");
    } else {
        description.push_str(&format!(
            "**📋 Queue - {} tracks**\n",
            snapshot.upcoming.len()
        ));
        for (index, song) in snapshot.upcoming.iter().enumerate() {
            description.push_str(&format!("{}. {}\n", index + 1, describe(song)));
        }
    }

    description.push_str(&format!("\nPlayer messages in <#{}>", snapshot.text_channel));
    description
}

/// Create an embed for the music queue
pub fn music_queue(snapshot: &QueueSnapshot) -> CreateEmbed {
    CreateEmbed::new()
        .title("🎵 Music Queue")
        .description(queue_description(snapshot))
        .color(0x00ff00)
}

/// A short ephemeral notice, used for control feedback
pub fn notice(text: impl Into<String>) -> CreateReply {
    CreateReply::default().content(text).ephemeral(true)
}

/// Create an embed for when a user is not connected to a voice channel
pub fn user_not_in_voice_channel() -> CreateReply {
    notice("You are not in a voice channel!")
}

/// Create an embed for a failed play request
pub fn failed_to_play(query: &str, err: &MusicError) -> CreateReply {
    let description = match err {
        MusicError::ResolveError(_) => format!("No results found for {}.", query),
        MusicError::JoinError(_) => err.to_string(),
        _ => format!("Failed to play {}: {}", query, err),
    };

    CreateReply::default()
        .embed(
            CreateEmbed::new()
                .title("❌ Error")
                .description(description)
                .color(0xff0000),
        )
        .ephemeral(true)
}

/// Create an embed for when the bot stops playing music
pub fn stopped() -> CreateReply {
    CreateReply::default().content("Stopped the music and cleared the queue.")
}

/// Reply to a skip command
pub fn skipped() -> CreateReply {
    CreateReply::default().content("Skipped the current song.")
}
