use super::*;
use utils::music_manager::{Enqueued, PlayRequest};

/// Play a song from YouTube or a direct URL
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn play(
    ctx: Context<'_>,
    #[description = "URL or search query"] query: String,
) -> CommandResult {
    info!("Received play command with query: {}", query);
    let guild_id = guild_id(ctx)?;

    let voice_channel =
        match Player::get_user_voice_channel(ctx.serenity_context(), guild_id, ctx.author().id) {
            Ok(channel_id) => channel_id,
            Err(err) => {
                debug!("Play rejected in guild {}: {}", guild_id, err);
                ctx.send(embedded_messages::user_not_in_voice_channel())
                    .await?;
                return Ok(());
            }
        };

    // Resolving and joining might take time
    ctx.defer_ephemeral().await?;

    let request = PlayRequest {
        query: query.clone(),
        voice_channel,
        text_channel: ctx.channel_id(),
        requested_by: Some(ctx.author().name.clone()),
    };

    let player = &ctx.data().player;
    let reply = match player.enqueue(guild_id, request).await {
        Ok(outcome) => {
            // Let the channel announcement land before the reply
            player.flush_messages(guild_id).await;
            match outcome {
                Enqueued::PlayingNow(song) => embedded_messages::playing_now(&song),
                Enqueued::Queued { song, position } => embedded_messages::queued(&song, position),
            }
        }
        Err(err) => {
            info!("Play failed in guild {}: {}", guild_id, err);
            embedded_messages::failed_to_play(&query, &err)
        }
    };

    ctx.send(reply).await?;
    Ok(())
}
