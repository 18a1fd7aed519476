//! Keeps a guild's player messages in step with its queue.
//!
//! Each guild gets one tracker task. The player issues [`UiCommand`]s while it
//! holds the guild lock, so the tracker sees them in transition order; the
//! tracker then does the messaging I/O on its own time.

use futures::future::join_all;
use serenity::all::MessageId;
use serenity::model::id::{ChannelId, GuildId};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::embedded_messages;
use super::messaging::Messenger;
use super::queue_manager::SongId;

/// A UI update, in the order the guild's state changed.
#[derive(Debug)]
pub enum UiCommand {
    /// A song was queued behind the one playing.
    SongQueued { song_id: SongId, title: String },
    /// A song became current.
    SongStarted { song_id: SongId, title: String },
    /// The session is over. The tracker cleans up and exits, then signals `done`.
    SessionEnded { done: Option<oneshot::Sender<()>> },
    /// Signalled once every earlier command has been applied.
    Flush(oneshot::Sender<()>),
}

/// Handle for issuing UI commands to a guild's tracker.
#[derive(Debug, Clone)]
pub struct UiSender {
    tx: mpsc::UnboundedSender<UiCommand>,
}

impl UiSender {
    fn channel() -> (Self, mpsc::UnboundedReceiver<UiCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A sender with no tracker behind it.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<UiCommand>) {
        Self::channel()
    }

    pub fn send(&self, command: UiCommand) {
        if self.tx.send(command).is_err() {
            debug!("Message tracker has stopped, dropping UI update");
        }
    }

    /// Wait until every command sent before this call has been applied.
    /// Returns immediately if the tracker has already exited.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(UiCommand::Flush(done_tx));
        let _ = done_rx.await;
    }
}

/// Owner of one guild's now-playing message and queue announcements.
pub struct MessageTracker {
    guild_id: GuildId,
    channel: ChannelId,
    messenger: Arc<dyn Messenger>,
    scan_limit: u8,
    now_playing: Option<MessageId>,
    queued: VecDeque<(SongId, MessageId)>,
}

impl MessageTracker {
    pub fn new(
        guild_id: GuildId,
        channel: ChannelId,
        messenger: Arc<dyn Messenger>,
        scan_limit: u8,
    ) -> Self {
        Self {
            guild_id,
            channel,
            messenger,
            scan_limit,
            now_playing: None,
            queued: VecDeque::new(),
        }
    }

    /// Start the tracker task and return its command handle.
    pub fn spawn(self) -> UiSender {
        let (ui, rx) = UiSender::channel();
        tokio::spawn(self.run(rx));
        ui
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<UiCommand>) {
        debug!("Message tracker started for guild {}", self.guild_id);

        while let Some(command) = rx.recv().await {
            match command {
                UiCommand::SongQueued { song_id, title } => {
                    self.on_song_queued(song_id, &title).await
                }
                UiCommand::SongStarted { song_id, title } => {
                    self.on_song_start(song_id, &title).await
                }
                UiCommand::Flush(done) => {
                    let _ = done.send(());
                }
                UiCommand::SessionEnded { done } => {
                    self.on_session_end().await;
                    if let Some(done) = done {
                        let _ = done.send(());
                    }
                    break;
                }
            }
        }

        debug!("Message tracker finished for guild {}", self.guild_id);
    }

    async fn on_song_queued(&mut self, song_id: SongId, title: &str) {
        let message = embedded_messages::added_to_queue(title);
        match self.messenger.send(self.channel, &message).await {
            Ok(message_id) => self.queued.push_back((song_id, message_id)),
            Err(e) => warn!(
                "Failed to announce {} in guild {}: {}",
                song_id, self.guild_id, e
            ),
        }
    }

    async fn on_song_start(&mut self, song_id: SongId, title: &str) {
        self.on_queue_message_consume(song_id).await;

        let message = embedded_messages::now_playing(title);

        if let Some(message_id) = self.now_playing {
            match self.messenger.edit(self.channel, message_id, &message).await {
                Ok(()) => return,
                Err(e) => debug!(
                    "Failed to update now playing message in guild {}, sending a new one: {}",
                    self.guild_id, e
                ),
            }
        }

        self.now_playing = match self.messenger.send(self.channel, &message).await {
            Ok(message_id) => Some(message_id),
            Err(e) => {
                warn!(
                    "Failed to send now playing message in guild {}: {}",
                    self.guild_id, e
                );
                None
            }
        };
    }

    /// Retire the announcement for `song_id`, if it has one.
    async fn on_queue_message_consume(&mut self, song_id: SongId) {
        let Some(index) = self.queued.iter().position(|(id, _)| *id == song_id) else {
            return;
        };

        if let Some((_, message_id)) = self.queued.remove(index) {
            self.delete(message_id).await;
        }
    }

    async fn on_session_end(&mut self) {
        let mut tracked: HashSet<MessageId> = self.queued.drain(..).map(|(_, id)| id).collect();
        tracked.extend(self.now_playing.take());

        join_all(tracked.iter().map(|id| self.delete(*id))).await;

        match self
            .messenger
            .recent_bot_messages(self.channel, self.scan_limit)
            .await
        {
            Ok(recent) => {
                let leftovers: Vec<_> = recent
                    .into_iter()
                    .filter(|id| !tracked.contains(id))
                    .collect();
                join_all(leftovers.iter().map(|id| self.delete(*id))).await;
            }
            Err(e) => warn!(
                "Failed to list messages for cleanup in guild {}: {}",
                self.guild_id, e
            ),
        }

        info!("Cleared player messages for guild {}", self.guild_id);
    }

    async fn delete(&self, message_id: MessageId) {
        if let Err(e) = self.messenger.delete(self.channel, message_id).await {
            warn!(
                "Failed to delete message {} in guild {}: {}",
                message_id, self.guild_id, e
            );
        }
    }
}
