//! Per-conversation draft buffer.
//!
//! Every conversation owns one [`Draft`]: an ordered list of pending text
//! entries bounded by a capacity, plus a pointer to the control message that
//! currently carries the action keyboard. Drafts are created lazily and are
//! emptied, never removed, by a flush.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::errors::DraftError;

/// Identity of an end-user conversation (the Telegram chat id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationId(pub i64);

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a message the bot has sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub conversation: ConversationId,
    pub message_id: i32,
}

/// Where a draft sits in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftState {
    Empty,
    Accumulating,
    Full,
}

/// Pending entries for one conversation
#[derive(Debug, Clone)]
pub struct Draft {
    entries: Vec<String>,
    capacity: usize,
    active_control_message: Option<MessageRef>,
}

impl Draft {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            active_control_message: None,
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True iff another entry fits
    pub fn has_space(&self) -> bool {
        self.entries.len() < self.capacity
    }

    pub fn state(&self) -> DraftState {
        if self.entries.is_empty() {
            DraftState::Empty
        } else if self.has_space() {
            DraftState::Accumulating
        } else {
            DraftState::Full
        }
    }

    /// Append an entry, rejecting it when the draft is full.
    ///
    /// Blank text is refused with [`DraftError::EmptyEntry`]; callers trim
    /// and filter input before getting here, so this only guards the
    /// invariant that entries are never blank.
    pub fn append(&mut self, text: &str) -> Result<(), DraftError> {
        if text.trim().is_empty() {
            return Err(DraftError::EmptyEntry);
        }
        if !self.has_space() {
            return Err(DraftError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.entries.push(text.to_string());
        Ok(())
    }

    /// Drop all entries. The active control message is left alone.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries joined into one task description, one entry per line
    pub fn description(&self) -> String {
        self.entries.join("\n")
    }

    pub fn active_control_message(&self) -> Option<MessageRef> {
        self.active_control_message
    }

    pub fn set_active_control_message(&mut self, message: Option<MessageRef>) {
        self.active_control_message = message;
    }

    /// Take the active control message, leaving none
    pub fn take_active_control_message(&mut self) -> Option<MessageRef> {
        self.active_control_message.take()
    }
}

/// Shared handle to one conversation's draft.
///
/// The async mutex serializes every handler touching the same conversation,
/// including recognition workers that finish out of band.
pub type SharedDraft = Arc<tokio::sync::Mutex<Draft>>;

/// Process-wide map from conversation to draft
#[derive(Debug)]
pub struct DraftStore {
    capacity: usize,
    drafts: Mutex<HashMap<ConversationId, SharedDraft>>,
}

impl DraftStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            drafts: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Return the conversation's draft, creating an empty one on first use
    pub fn get_or_create(&self, conversation: ConversationId) -> SharedDraft {
        let mut drafts = self
            .drafts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(
            drafts
                .entry(conversation)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(Draft::new(self.capacity)))),
        )
    }

    /// Number of conversations seen so far
    pub fn conversation_count(&self) -> usize {
        self.drafts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control(id: i32) -> MessageRef {
        MessageRef {
            conversation: ConversationId(1),
            message_id: id,
        }
    }

    #[test]
    fn test_append_until_full() {
        let mut draft = Draft::new(3);
        assert_eq!(draft.state(), DraftState::Empty);

        draft.append("one").unwrap();
        assert_eq!(draft.state(), DraftState::Accumulating);
        draft.append("two").unwrap();
        draft.append("three").unwrap();
        assert_eq!(draft.state(), DraftState::Full);

        let err = draft.append("four").unwrap_err();
        assert_eq!(err, DraftError::CapacityExceeded { capacity: 3 });
        assert_eq!(draft.entries(), &["one", "two", "three"]);
    }

    #[test]
    fn test_blank_entry_rejected() {
        let mut draft = Draft::new(3);
        assert_eq!(draft.append("  \n\t"), Err(DraftError::EmptyEntry));
        assert!(draft.is_empty());
    }

    #[test]
    fn test_duplicates_kept_in_order() {
        let mut draft = Draft::new(3);
        draft.append("same").unwrap();
        draft.append("other").unwrap();
        draft.append("same").unwrap();
        assert_eq!(draft.entries(), &["same", "other", "same"]);
    }

    #[test]
    fn test_clear_keeps_control_message() {
        let mut draft = Draft::new(2);
        draft.append("a").unwrap();
        draft.set_active_control_message(Some(control(10)));

        draft.clear();
        assert!(draft.is_empty());
        assert_eq!(draft.active_control_message(), Some(control(10)));

        // Clearing an empty draft is a no-op
        draft.clear();
        assert!(draft.is_empty());
    }

    #[test]
    fn test_description_joins_with_newlines() {
        let mut draft = Draft::new(3);
        draft.append("buy milk").unwrap();
        draft.append("call Alex").unwrap();
        assert_eq!(draft.description(), "buy milk\ncall Alex");
    }

    #[tokio::test]
    async fn test_store_returns_same_draft_per_conversation() {
        let store = DraftStore::new(3);
        let first = store.get_or_create(ConversationId(7));
        first.lock().await.append("hello").unwrap();

        let again = store.get_or_create(ConversationId(7));
        assert_eq!(again.lock().await.entries(), &["hello"]);

        let other = store.get_or_create(ConversationId(8));
        assert!(other.lock().await.is_empty());
        assert_eq!(store.conversation_count(), 2);
    }
}
