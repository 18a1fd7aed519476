use super::*;

/// View the current music queue
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn queue(ctx: Context<'_>) -> CommandResult {
    let guild_id = guild_id(ctx)?;

    let reply = match ctx.data().player.queue(guild_id).await {
        Some(snapshot) => CreateReply::default()
            .embed(embedded_messages::music_queue(&snapshot))
            .ephemeral(true),
        None => embedded_messages::notice("No music is currently playing."),
    };

    ctx.send(reply).await?;
    Ok(())
}
