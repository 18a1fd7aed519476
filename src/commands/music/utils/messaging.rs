//! Text-channel seam used by the message tracker.

use ::serenity::all::{CreateMessage, EditMessage, GetMessages, Http, MessageId, UserId};
use serenity::async_trait;
use serenity::model::id::ChannelId;
use std::sync::Arc;

use super::button_controls::create_music_control_buttons;
use super::music_manager::{MusicError, MusicResult};

/// A message the player posts in a guild's text channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerMessage {
    pub content: String,
    /// Attach the player control buttons.
    pub controls: bool,
}

/// Sends, edits and deletes the player's messages.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, channel: ChannelId, message: &PlayerMessage) -> MusicResult<MessageId>;

    async fn edit(
        &self,
        channel: ChannelId,
        message_id: MessageId,
        message: &PlayerMessage,
    ) -> MusicResult<()>;

    async fn delete(&self, channel: ChannelId, message_id: MessageId) -> MusicResult<()>;

    /// Ids of the bot's own messages among the `limit` most recent in `channel`.
    async fn recent_bot_messages(&self, channel: ChannelId, limit: u8)
    -> MusicResult<Vec<MessageId>>;
}

/// Messenger backed by serenity's HTTP client.
pub struct SerenityMessenger {
    http: Arc<Http>,
    bot_id: UserId,
}

impl SerenityMessenger {
    pub fn new(http: Arc<Http>, bot_id: UserId) -> Self {
        Self { http, bot_id }
    }
}

fn messaging_error(e: impl std::fmt::Display) -> MusicError {
    MusicError::MessagingError(e.to_string())
}

#[async_trait]
impl Messenger for SerenityMessenger {
    async fn send(&self, channel: ChannelId, message: &PlayerMessage) -> MusicResult<MessageId> {
        let mut create_message = CreateMessage::new().content(&message.content);
        if message.controls {
            create_message = create_message.components(create_music_control_buttons());
        }

        let sent = channel
            .send_message(self.http.clone(), create_message)
            .await
            .map_err(messaging_error)?;

        Ok(sent.id)
    }

    async fn edit(
        &self,
        channel: ChannelId,
        message_id: MessageId,
        message: &PlayerMessage,
    ) -> MusicResult<()> {
        let components = if message.controls {
            create_music_control_buttons()
        } else {
            Vec::new()
        };

        let edit_message = EditMessage::new()
            .content(&message.content)
            .components(components);

        channel
            .edit_message(self.http.clone(), message_id, edit_message)
            .await
            .map_err(messaging_error)?;

        Ok(())
    }

    async fn delete(&self, channel: ChannelId, message_id: MessageId) -> MusicResult<()> {
        self.http
            .delete_message(channel, message_id, None)
            .await
            .map_err(messaging_error)
    }

    async fn recent_bot_messages(
        &self,
        channel: ChannelId,
        limit: u8,
    ) -> MusicResult<Vec<MessageId>> {
        let messages = channel
            .messages(self.http.clone(), GetMessages::new().limit(limit))
            .await
            .map_err(messaging_error)?;

        Ok(messages
            .into_iter()
            .filter(|message| message.author.id == self.bot_id)
            .map(|message| message.id)
            .collect())
    }
}
