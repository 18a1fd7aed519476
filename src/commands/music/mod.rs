pub(crate) mod pause;
pub(crate) mod play;
pub(crate) mod queue;
pub(crate) mod shuffle;
pub(crate) mod skip;
pub(crate) mod stop;

pub mod audio_sources;
pub mod utils;

use crate::{CommandResult, Context, Error};
use poise::CreateReply;
use poise::serenity_prelude::GuildId;
use tracing::{debug, info};
use utils::button_controls::ButtonAction;
use utils::component_handlers::dispatch;
use utils::embedded_messages;
use utils::music_manager::{MusicError, Player};

/// The guild a music command was run in
fn guild_id(ctx: Context<'_>) -> Result<GuildId, Error> {
    ctx.guild_id()
        .ok_or_else(|| Box::new(MusicError::NotInGuild) as Error)
}

/// Run a player control and reply with its notice
async fn control(ctx: Context<'_>, action: ButtonAction) -> CommandResult {
    let guild_id = guild_id(ctx)?;
    let notice = dispatch(&ctx.data().player, guild_id, action).await;
    debug!("{:?} in guild {}: {}", action, guild_id, notice);
    ctx.send(embedded_messages::notice(notice)).await?;
    Ok(())
}
