use ::serenity::all::{
    ComponentInteraction, CreateInteractionResponse, CreateInteractionResponseMessage, GuildId,
};
use poise::serenity_prelude::Context;
use tracing::{debug, warn};

use super::button_controls::ButtonAction;
use super::music_manager::{MusicError, Player};

type ButtonInteractionResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Apply a player button to `guild_id` and return the notice for the user.
pub async fn dispatch(player: &Player, guild_id: GuildId, action: ButtonAction) -> String {
    let outcome = match action {
        ButtonAction::Shuffle => player
            .shuffle(guild_id)
            .await
            .map(|_| "The queue has been shuffled!"),
        ButtonAction::Skip => player
            .skip(guild_id)
            .await
            .map(|_| "Skipped the current song."),
        ButtonAction::Pause => player
            .pause(guild_id)
            .await
            .map(|_| "Paused the music."),
        ButtonAction::Resume => player
            .resume(guild_id)
            .await
            .map(|_| "Resumed the music."),
    };

    match outcome {
        Ok(notice) => notice.to_string(),
        Err(MusicError::QueueEmpty) => "No songs to shuffle!".to_string(),
        Err(MusicError::NothingPlaying) => "No music is currently playing.".to_string(),
        Err(MusicError::NotPaused) => "No music is currently paused.".to_string(),
        Err(e) => {
            warn!("Button {:?} failed in guild {}: {}", action, guild_id, e);
            format!("Something went wrong: {}", e)
        }
    }
}

/// Handle a button interaction
pub async fn handle_interaction(
    ctx: &Context,
    player: &Player,
    interaction: &ComponentInteraction,
) -> ButtonInteractionResult {
    let Some(action) = ButtonAction::from_custom_id(&interaction.data.custom_id) else {
        debug!("Ignoring unknown button {}", interaction.data.custom_id);
        return Ok(());
    };

    let notice = match interaction.guild_id {
        Some(guild_id) => dispatch(player, guild_id, action).await,
        None => MusicError::NotInGuild.to_string(),
    };

    interaction
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(notice)
                    .ephemeral(true),
            ),
        )
        .await?;

    Ok(())
}
