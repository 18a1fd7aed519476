use super::*;
use std::time::Duration;

/// Skip the currently playing song
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn skip(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;

    match ctx.data().player.skip(guild_id).await {
        Ok(_) => {
            let reply = ctx.send(embedded_messages::skipped()).await?;
            tokio::time::sleep(Duration::from_secs(5)).await;
            // A stop within those seconds may already have cleaned it up
            if let Err(e) = reply.delete(ctx).await {
                debug!("Skip reply in guild {} was already gone: {}", guild_id, e);
            }
        }
        Err(MusicError::NothingPlaying) => {
            ctx.send(embedded_messages::notice("No music is currently playing."))
                .await?;
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
