use serenity::all::ComponentInteraction;
use serenity::async_trait;
use serenity::model::application::Interaction;
use serenity::prelude::*;
use tracing::error;

use crate::commands::music::utils::component_handlers;
use crate::commands::music::utils::music_manager::Player;

/// Routes player button presses to the [`Player`].
pub struct Handler {
    player: Player,
}

impl Handler {
    pub fn new(player: Player) -> Self {
        Self { player }
    }
}

#[async_trait]
impl serenity::prelude::EventHandler for Handler {
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Component(component) = interaction {
            if component.data.custom_id.starts_with("music_") {
                music_component_interaction(&ctx, &self.player, &component).await;
            }
        }
    }
}

/// Handle component interactions for components with identities starting with "music_"
async fn music_component_interaction(ctx: &Context, player: &Player, component: &ComponentInteraction) {
    if let Err(e) = component_handlers::handle_interaction(ctx, player, component).await {
        error!("Error handling component interaction: {}", e);
    }
}
