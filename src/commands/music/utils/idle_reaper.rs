//! Disconnects guilds that have sat with an empty queue for too long.

use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::music_manager::Player;
use super::queue_manager::{GuildSlot, GuildState};

/// An armed idle timer. Only the timer whose epoch is still recorded in the
/// guild's state may tear the session down.
#[derive(Debug)]
pub(crate) struct IdleTimer {
    pub(crate) epoch: u64,
    pub(crate) task: JoinHandle<()>,
}

impl Player {
    /// Arm the guild's idle timer, superseding any earlier one.
    pub(crate) fn arm_idle_timer(&self, slot: &Arc<GuildSlot>, state: &mut GuildState) {
        let epoch = state.next_idle_epoch();
        let timeout = self.config().idle_timeout;
        let guild_id = slot.guild_id();

        let player = self.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            player.reap_idle(guild_id, epoch).await;
        });

        debug!(
            "Armed idle timer epoch {} for guild {} ({:?})",
            epoch, guild_id, timeout
        );
        state.set_idle(IdleTimer { epoch, task });
    }

    /// Tear down the session if it is still idle under `epoch`.
    /// Returns whether the session was torn down.
    pub(crate) async fn reap_idle(&self, guild_id: GuildId, epoch: u64) -> bool {
        let Some(slot) = self.store().get(guild_id) else {
            debug!("Idle timer fired for guild {} with no session", guild_id);
            return false;
        };

        let teardown = {
            let mut state = slot.lock().await;

            if state.is_closed() || !state.idle_matches(epoch) {
                debug!(
                    "Idle timer epoch {} for guild {} was superseded",
                    epoch, guild_id
                );
                return false;
            }

            let busy = state.current.is_some()
                || state
                    .transport
                    .as_ref()
                    .is_some_and(|transport| transport.is_playing());
            if busy {
                debug!("Guild {} is playing again, keeping the session", guild_id);
                return false;
            }

            // This task is the timer; detach it so closing doesn't abort us
            state.release_idle();
            self.close_session(&slot, &mut state).await
        };

        teardown.run().await;
        info!("Left guild {} after being idle", guild_id);
        true
    }
}
