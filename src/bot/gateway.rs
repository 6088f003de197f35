//! Outbound side of the conversation: replies, keyboards, media downloads.

use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileId, MessageId};
use tracing::debug;

use super::events::MediaRef;
use super::ui_builder::create_action_keyboard;
use crate::draft::{ConversationId, MessageRef};
use crate::errors::GatewayError;

/// Everything the controller needs from the chat platform
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Send a plain reply
    async fn send_text(&self, conversation: ConversationId, text: &str) -> Result<(), GatewayError>;

    /// Send a reply carrying the submit/clear keyboard
    async fn send_control_message(
        &self,
        conversation: ConversationId,
        text: &str,
        language: &str,
    ) -> Result<MessageRef, GatewayError>;

    /// Strip the keyboard from a previously sent message
    async fn remove_keyboard(&self, message: MessageRef) -> Result<(), GatewayError>;

    /// Fetch a media file as bytes
    async fn download(&self, media: &MediaRef) -> Result<Vec<u8>, GatewayError>;
}

/// [`ChatGateway`] over the Telegram Bot API
#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatGateway for TelegramGateway {
    async fn send_text(&self, conversation: ConversationId, text: &str) -> Result<(), GatewayError> {
        self.bot
            .send_message(ChatId(conversation.0), text)
            .await?;
        Ok(())
    }

    async fn send_control_message(
        &self,
        conversation: ConversationId,
        text: &str,
        language: &str,
    ) -> Result<MessageRef, GatewayError> {
        let sent = self
            .bot
            .send_message(ChatId(conversation.0), text)
            .reply_markup(create_action_keyboard(language))
            .await?;
        Ok(MessageRef {
            conversation,
            message_id: sent.id.0,
        })
    }

    async fn remove_keyboard(&self, message: MessageRef) -> Result<(), GatewayError> {
        // No reply_markup in the edit request means "remove it"
        self.bot
            .edit_message_reply_markup(ChatId(message.conversation.0), MessageId(message.message_id))
            .await?;
        Ok(())
    }

    async fn download(&self, media: &MediaRef) -> Result<Vec<u8>, GatewayError> {
        let file = self.bot.get_file(FileId(media.file_id.clone())).await?;
        let mut bytes = Vec::new();
        self.bot.download_file(&file.path, &mut bytes).await?;
        debug!(file_id = %media.file_id, size = bytes.len(), "Downloaded media file");
        Ok(bytes)
    }
}
