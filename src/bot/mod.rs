//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `events`: Decodes Telegram updates into bot events
//! - `controller`: Reacts to events, owns the draft store
//! - `gateway`: Sends replies and downloads media
//! - `worker`: Runs voice and photo events off the dispatcher
//! - `message_handler` / `callback_handler`: teloxide endpoints
//! - `ui_builder`: Creates keyboards and formats messages

pub mod callback_handler;
pub mod controller;
pub mod events;
pub mod gateway;
pub mod message_handler;
pub mod ui_builder;
pub mod worker;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;

pub use callback_handler::callback_handler;
pub use controller::{Collaborators, SubmissionController};
pub use events::{ButtonAction, Command, EventPayload, InboundEvent, MediaRef};
pub use gateway::{ChatGateway, TelegramGateway};
pub use message_handler::message_handler;
pub use worker::RecognitionQueue;

/// Dispatcher tree: messages and keyboard presses
pub fn schema() -> UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(Update::filter_message().endpoint(message_handler))
        .branch(Update::filter_callback_query().endpoint(callback_handler))
}
