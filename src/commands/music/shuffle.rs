use super::*;

/// Shuffle the songs waiting in the queue
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn shuffle(ctx: Context<'_>) -> CommandResult {
    control(ctx, ButtonAction::Shuffle).await
}
