//! Decoding Telegram updates into bot events.
//!
//! Handlers downstream only ever see [`InboundEvent`], a conversation id plus
//! one payload variant carrying exactly the data that variant needs.

use teloxide::types::{CallbackQuery, Message};
use teloxide::utils::command::BotCommands;
use tracing::{debug, warn};

use crate::draft::{ConversationId, MessageRef};
use crate::localization::detect_language;

/// Commands listed in the bot menu
#[derive(BotCommands, Clone, Copy, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Доступні команди:")]
pub enum Command {
    #[command(description = "почати роботу")]
    Start,
    #[command(description = "як користуватися ботом")]
    Help,
    #[command(description = "перевірити, що бот працює")]
    Ping,
    #[command(description = "показати чернетку")]
    Draft,
}

/// Actions behind the inline keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Submit,
    Clear,
}

impl ButtonAction {
    pub const SUBMIT_DATA: &'static str = "new_task";
    pub const CLEAR_DATA: &'static str = "clear_buf";

    pub fn from_callback_data(data: &str) -> Option<Self> {
        match data {
            Self::SUBMIT_DATA => Some(ButtonAction::Submit),
            Self::CLEAR_DATA => Some(ButtonAction::Clear),
            _ => None,
        }
    }

    pub fn callback_data(self) -> &'static str {
        match self {
            ButtonAction::Submit => Self::SUBMIT_DATA,
            ButtonAction::Clear => Self::CLEAR_DATA,
        }
    }
}

/// A file stored on Telegram's side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub file_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    Text(String),
    Voice(MediaRef),
    Photo(MediaRef),
    Button {
        action: ButtonAction,
        /// Message the pressed keyboard belongs to
        source: Option<MessageRef>,
    },
    Command(Command),
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub conversation: ConversationId,
    /// Reply language
    pub language: String,
    pub payload: EventPayload,
}

impl InboundEvent {
    /// Voice and photo events wait on external recognition and are run by
    /// the worker pool instead of the dispatcher
    pub fn is_slow(&self) -> bool {
        matches!(self.payload, EventPayload::Voice(_) | EventPayload::Photo(_))
    }
}

/// Classify a text message as a known command or plain draft text
pub fn parse_text(text: &str, bot_username: &str) -> EventPayload {
    if text.starts_with('/') {
        if let Ok(command) = Command::parse(text.trim(), bot_username) {
            return EventPayload::Command(command);
        }
    }
    EventPayload::Text(text.to_string())
}

/// Decode an incoming message. Never fails: unknown kinds become
/// [`EventPayload::Unsupported`].
pub fn decode_message(msg: &Message, bot_username: &str, default_language: &str) -> InboundEvent {
    let language = detect_language(
        msg.from.as_ref().and_then(|user| user.language_code.as_deref()),
        default_language,
    );

    let payload = if let Some(text) = msg.text() {
        parse_text(text, bot_username)
    } else if let Some(voice) = msg.voice() {
        EventPayload::Voice(MediaRef {
            file_id: voice.file.id.0.clone(),
        })
    } else if let Some(audio) = msg.audio() {
        EventPayload::Voice(MediaRef {
            file_id: audio.file.id.0.clone(),
        })
    } else if let Some(largest_photo) = msg.photo().and_then(|photos| photos.last()) {
        EventPayload::Photo(MediaRef {
            file_id: largest_photo.file.id.0.clone(),
        })
    } else if let Some(doc) = msg.document() {
        let mime_type = doc.mime_type.as_ref().map(|m| m.to_string()).unwrap_or_default();
        let media = MediaRef {
            file_id: doc.file.id.0.clone(),
        };
        if mime_type.starts_with("image/") {
            EventPayload::Photo(media)
        } else if mime_type.starts_with("audio/") {
            EventPayload::Voice(media)
        } else {
            debug!(chat_id = %msg.chat.id, mime_type = %mime_type, "Unsupported document type");
            EventPayload::Unsupported
        }
    } else {
        EventPayload::Unsupported
    };

    InboundEvent {
        conversation: ConversationId(msg.chat.id.0),
        language,
        payload,
    }
}

/// Decode a keyboard press. Returns `None` for data the bot never sends or
/// presses without an originating message.
pub fn decode_callback(q: &CallbackQuery, default_language: &str) -> Option<InboundEvent> {
    let data = q.data.as_deref().unwrap_or("");
    let Some(action) = ButtonAction::from_callback_data(data) else {
        warn!(user_id = %q.from.id, data = %data, "Unknown callback data");
        return None;
    };
    let Some(message) = q.message.as_ref() else {
        warn!(user_id = %q.from.id, "Callback query without message");
        return None;
    };

    let conversation = ConversationId(message.chat().id.0);
    Some(InboundEvent {
        conversation,
        language: detect_language(q.from.language_code.as_deref(), default_language),
        payload: EventPayload::Button {
            action,
            source: Some(MessageRef {
                conversation,
                message_id: message.id().0,
            }),
        },
    })
}
