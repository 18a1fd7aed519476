//! A per-guild music bot: queue songs from YouTube into a voice channel, with
//! player controls and automatic cleanup once the queue runs dry.

pub mod commands;
pub mod config;
pub mod events;

pub use commands::music::audio_sources::{SearchResolver, TrackMetadata, YoutubeResolver};
pub use commands::music::utils::event_handlers::TrackEndNotifier;
pub use commands::music::utils::messaging::{Messenger, PlayerMessage, SerenityMessenger};
pub use commands::music::utils::music_manager::{
    Enqueued, MusicError, MusicResult, PlayRequest, Player,
};
pub use commands::music::utils::queue_manager::{PlaybackState, QueueSnapshot, Song, SongId};
pub use commands::music::utils::transport::{
    SongbirdTransport, StreamPolicy, TransportHandle, VoiceTransport,
};
pub use config::{Config, PlayerConfig};

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type CommandResult = Result<(), Error>;

/// User data, which is stored and accessible in all command invocations
pub struct Data {
    pub player: Player,
}

#[poise::command(slash_command, category = "General")]
async fn help(
    ctx: Context<'_>,
    #[description = "Specific command to show help about"]
    #[autocomplete = "poise::builtins::autocomplete_command"]
    command: Option<String>,
) -> CommandResult {
    poise::builtins::help(
        ctx,
        command.as_deref(),
        poise::builtins::HelpConfiguration {
            show_context_menu_commands: true,
            ..Default::default()
        },
    )
    .await
    .map_err(|e| e.into())
}

#[poise::command(prefix_command, owners_only, hide_in_help)]
async fn register(ctx: Context<'_>) -> Result<(), Error> {
    poise::builtins::register_application_commands_buttons(ctx)
        .await
        .map_err(|e| e.into())
}

/// Every command the bot registers
pub fn commands() -> Vec<poise::Command<Data, Error>> {
    use commands::music::{pause::*, play::*, queue::*, shuffle::*, skip::*, stop::*};

    vec![
        // Default commands
        register(),
        help(),
        // Music commands
        play(),
        pause(),
        resume(),
        queue(),
        shuffle(),
        skip(),
        stop(),
    ]
}
