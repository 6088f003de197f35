//! Submission controller: the per-event reaction logic.
//!
//! Every inbound event for a conversation goes through [`SubmissionController::dispatch`].
//! The controller turns text, voice and photos into draft entries, keeps a
//! single live action keyboard per conversation, and flushes the draft into
//! one persisted task when the user presses submit.
//!
//! No error escapes a handler: every failure becomes a reply to the user and
//! a log line.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::events::{ButtonAction, Command, EventPayload, InboundEvent, MediaRef};
use super::gateway::ChatGateway;
use super::ui_builder::{
    draft_full_message, format_draft, format_entry_added, help_message, welcome_message,
    EntrySource,
};
use crate::config::DraftSettings;
use crate::draft::{ConversationId, Draft, DraftStore, MessageRef};
use crate::errors::{DraftError, RecognitionError};
use crate::localization::t_lang;
use crate::ocr::TextExtractor;
use crate::sheets::TaskSink;
use crate::speech::Transcriber;

/// External services the controller talks to
pub struct Collaborators {
    pub gateway: Arc<dyn ChatGateway>,
    pub transcriber: Arc<dyn Transcriber>,
    pub extractor: Arc<dyn TextExtractor>,
    pub tasks: Arc<dyn TaskSink>,
}

pub struct SubmissionController {
    drafts: DraftStore,
    gateway: Arc<dyn ChatGateway>,
    transcriber: Arc<dyn Transcriber>,
    extractor: Arc<dyn TextExtractor>,
    tasks: Arc<dyn TaskSink>,
    settings: DraftSettings,
}

async fn with_timeout<T, E, F>(limit: Duration, call: F) -> Result<T, String>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {}s", limit.as_secs())),
    }
}

impl SubmissionController {
    pub fn new(settings: DraftSettings, collaborators: Collaborators) -> Self {
        Self {
            drafts: DraftStore::new(settings.capacity),
            gateway: collaborators.gateway,
            transcriber: collaborators.transcriber,
            extractor: collaborators.extractor,
            tasks: collaborators.tasks,
            settings,
        }
    }

    pub fn drafts(&self) -> &DraftStore {
        &self.drafts
    }

    pub fn default_language(&self) -> &str {
        &self.settings.language
    }

    /// Handle one event to completion
    pub async fn dispatch(&self, event: InboundEvent) {
        let InboundEvent {
            conversation,
            language,
            payload,
        } = event;
        let lang = language.as_str();

        match payload {
            EventPayload::Text(text) => self.on_text(conversation, lang, &text).await,
            EventPayload::Voice(media) => self.on_voice(conversation, lang, &media).await,
            EventPayload::Photo(media) => self.on_photo(conversation, lang, &media).await,
            EventPayload::Button { action, source } => {
                self.on_button(conversation, lang, action, source).await
            }
            EventPayload::Command(command) => self.on_command(conversation, lang, command).await,
            EventPayload::Unsupported => {
                self.notify(conversation, &t_lang("unsupported-message", lang))
                    .await
            }
        }
    }

    pub async fn on_text(&self, conversation: ConversationId, lang: &str, raw_text: &str) {
        self.ingest(conversation, lang, raw_text, EntrySource::Text)
            .await
    }

    pub async fn on_voice(&self, conversation: ConversationId, lang: &str, media: &MediaRef) {
        if self.is_full(conversation, lang).await {
            return;
        }
        self.notify(conversation, &t_lang("processing-voice", lang))
            .await;

        let recognized = self
            .recognize(conversation, media, |audio| async move {
                self.transcriber
                    .transcribe(&audio, &self.settings.speech_language)
                    .await
            })
            .await;

        match recognized {
            Some(text) => self.ingest(conversation, lang, &text, EntrySource::Voice).await,
            None => {
                self.notify(conversation, &t_lang("error-voice-not-recognized", lang))
                    .await
            }
        }
    }

    pub async fn on_photo(&self, conversation: ConversationId, lang: &str, media: &MediaRef) {
        if self.is_full(conversation, lang).await {
            return;
        }
        self.notify(conversation, &t_lang("processing-photo", lang))
            .await;

        let recognized = self
            .recognize(conversation, media, |image| async move {
                self.extractor.extract(&image).await
            })
            .await;

        match recognized {
            Some(text) => self.ingest(conversation, lang, &text, EntrySource::Photo).await,
            None => {
                self.notify(conversation, &t_lang("error-photo-not-recognized", lang))
                    .await
            }
        }
    }

    pub async fn on_button(
        &self,
        conversation: ConversationId,
        lang: &str,
        action: ButtonAction,
        source: Option<MessageRef>,
    ) {
        let shared = self.drafts.get_or_create(conversation);
        let mut draft = shared.lock().await;

        if let Some(pressed) = source {
            if draft.active_control_message() != Some(pressed) {
                info!(chat_id = %conversation, message_id = pressed.message_id, "Stale button pressed");
                self.retire_control_message(pressed).await;
                self.notify(conversation, &t_lang("error-stale-button", lang))
                    .await;
                return;
            }
        }

        match action {
            ButtonAction::Clear => {
                draft.clear();
                if let Some(active) = draft.take_active_control_message() {
                    self.retire_control_message(active).await;
                }
                info!(chat_id = %conversation, "Draft cleared");
                self.notify(conversation, &t_lang("draft-cleared", lang))
                    .await;
            }
            ButtonAction::Submit => self.submit(conversation, lang, &mut draft).await,
        }
    }

    pub async fn on_command(&self, conversation: ConversationId, lang: &str, command: Command) {
        debug!(chat_id = %conversation, command = ?command, "Command received");
        match command {
            Command::Start => {
                let shared = self.drafts.get_or_create(conversation);
                let mut draft = shared.lock().await;
                self.post_control_message(&mut draft, conversation, &welcome_message(lang), lang)
                    .await;
            }
            Command::Help => {
                self.notify(conversation, &help_message(self.settings.capacity, lang))
                    .await
            }
            Command::Ping => self.notify(conversation, &t_lang("ping-ok", lang)).await,
            Command::Draft => {
                let shared = self.drafts.get_or_create(conversation);
                let mut draft = shared.lock().await;
                if draft.is_empty() {
                    self.notify(conversation, &t_lang("draft-empty", lang))
                        .await;
                } else {
                    let listing = format_draft(draft.entries(), draft.capacity(), lang);
                    self.post_control_message(&mut draft, conversation, &listing, lang)
                        .await;
                }
            }
        }
    }

    /// Tell the user the recognition queue is saturated
    pub async fn notify_busy(&self, conversation: ConversationId, lang: &str) {
        warn!(chat_id = %conversation, "Recognition queue full, rejecting media");
        self.notify(conversation, &t_lang("error-busy", lang)).await
    }

    /// Trim, append and confirm with a fresh control message
    async fn ingest(&self, conversation: ConversationId, lang: &str, raw_text: &str, source: EntrySource) {
        let text = raw_text.trim();
        if text.is_empty() {
            debug!(chat_id = %conversation, "Ignoring empty input");
            self.notify(conversation, &t_lang("error-empty-input", lang))
                .await;
            return;
        }

        let shared = self.drafts.get_or_create(conversation);
        let mut draft = shared.lock().await;

        match draft.append(text) {
            Ok(()) => {
                info!(
                    chat_id = %conversation,
                    source = ?source,
                    entries = draft.len(),
                    "Entry added to draft"
                );
                let confirmation =
                    format_entry_added(source, text, draft.len(), draft.capacity(), lang);
                self.post_control_message(&mut draft, conversation, &confirmation, lang)
                    .await;
            }
            Err(DraftError::CapacityExceeded { capacity }) => {
                info!(chat_id = %conversation, capacity, "Draft full, entry rejected");
                self.notify(conversation, &draft_full_message(capacity, lang))
                    .await;
            }
            Err(DraftError::EmptyEntry) => {
                self.notify(conversation, &t_lang("error-empty-input", lang))
                    .await;
            }
        }
    }

    /// Flush the draft into one task. The draft is only cleared once the
    /// persistence call has reported success.
    async fn submit(&self, conversation: ConversationId, lang: &str, draft: &mut Draft) {
        if draft.is_empty() {
            self.notify(conversation, &t_lang("draft-empty", lang))
                .await;
            return;
        }

        let description = draft.description();
        let result = with_timeout(
            self.settings.persistence_timeout,
            self.tasks.append_task(
                &self.settings.task_name,
                &description,
                &self.settings.task_tag,
            ),
        )
        .await;

        match result {
            Ok(()) => {
                info!(chat_id = %conversation, entries = draft.len(), "Task submitted");
                if let Some(active) = draft.take_active_control_message() {
                    self.retire_control_message(active).await;
                }
                self.notify(conversation, &t_lang("task-created", lang))
                    .await;
                draft.clear();
            }
            Err(e) => {
                error!(chat_id = %conversation, error = %e, "Task submission failed, draft kept");
                self.notify(conversation, &t_lang("error-persistence", lang))
                    .await;
            }
        }
    }

    /// Download media and run it through a recognizer. `None` covers every
    /// failure mode as well as "nothing recognized".
    ///
    /// The recognition timeout bounds the download and the recognizer call
    /// together.
    async fn recognize<F, Fut>(
        &self,
        conversation: ConversationId,
        media: &MediaRef,
        recognizer: F,
    ) -> Option<String>
    where
        F: FnOnce(Vec<u8>) -> Fut,
        Fut: Future<Output = Result<Option<String>, RecognitionError>>,
    {
        let pipeline = async {
            match self.gateway.download(media).await {
                Ok(bytes) => recognizer(bytes).await,
                Err(e) => Err(RecognitionError::Download(e.to_string())),
            }
        };

        match with_timeout(self.settings.recognition_timeout, pipeline).await {
            Ok(Some(text)) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                info!(chat_id = %conversation, "Nothing recognized");
                None
            }
            Err(e) => {
                warn!(chat_id = %conversation, file_id = %media.file_id, error = %e, "Recognition failed");
                None
            }
        }
    }

    async fn is_full(&self, conversation: ConversationId, lang: &str) -> bool {
        let shared = self.drafts.get_or_create(conversation);
        let draft = shared.lock().await;
        if draft.has_space() {
            return false;
        }
        let capacity = draft.capacity();
        drop(draft);
        self.notify(conversation, &draft_full_message(capacity, lang))
            .await;
        true
    }

    /// Send a message with the action keyboard, retiring the previous one
    async fn post_control_message(
        &self,
        draft: &mut Draft,
        conversation: ConversationId,
        text: &str,
        lang: &str,
    ) {
        if let Some(previous) = draft.take_active_control_message() {
            self.retire_control_message(previous).await;
        }

        match self.gateway.send_control_message(conversation, text, lang).await {
            Ok(sent) => draft.set_active_control_message(Some(sent)),
            Err(e) => {
                error!(chat_id = %conversation, error = %e, "Failed to send control message");
                // Still answer the user, without a keyboard
                self.notify(conversation, text).await;
            }
        }
    }

    /// Best-effort keyboard removal; the message may be gone or too old to edit
    async fn retire_control_message(&self, message: MessageRef) {
        if let Err(e) = self.gateway.remove_keyboard(message).await {
            debug!(
                chat_id = %message.conversation,
                message_id = message.message_id,
                error = %e,
                "Could not remove keyboard from old control message"
            );
        }
    }

    async fn notify(&self, conversation: ConversationId, text: &str) {
        if let Err(e) = self.gateway.send_text(conversation, text).await {
            error!(chat_id = %conversation, error = %e, "Failed to send reply");
        }
    }
}
