//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, warn};

use super::controller::SubmissionController;
use super::events::decode_callback;
use super::worker::{route, RecognitionQueue};

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    controller: Arc<SubmissionController>,
    queue: Arc<RecognitionQueue>,
) -> Result<()> {
    debug!(user_id = %q.from.id, data = ?q.data, "Received callback query from user");

    // Answer first so the button stops spinning even if submission is slow
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!(user_id = %q.from.id, error = %e, "Failed to answer callback query");
    }

    if let Some(event) = decode_callback(&q, controller.default_language()) {
        route(event, &controller, &queue).await;
    }

    Ok(())
}
