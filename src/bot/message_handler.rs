//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::Me;
use tracing::debug;

use super::controller::SubmissionController;
use super::events::decode_message;
use super::worker::{route, RecognitionQueue};

pub async fn message_handler(
    msg: Message,
    me: Me,
    controller: Arc<SubmissionController>,
    queue: Arc<RecognitionQueue>,
) -> Result<()> {
    let event = decode_message(&msg, me.username(), controller.default_language());
    debug!(chat_id = %msg.chat.id, payload = ?event.payload, "Received message");

    route(event, &controller, &queue).await;
    Ok(())
}
