use super::*;

/// Stop the music, clear the queue and leave the voice channel
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn stop(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;

    // Cleaning up the channel can take a while. Ephemeral, so the cleanup scan never sees it
    ctx.defer_ephemeral().await?;

    match ctx.data().player.stop(guild_id).await {
        Ok(()) => {
            ctx.send(embedded_messages::stopped()).await?;
        }
        Err(MusicError::NothingPlaying) => {
            ctx.send(embedded_messages::notice("No music is currently playing."))
                .await?;
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
