//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use super::events::ButtonAction;
use crate::localization::{t_args_lang, t_lang};

/// How an entry reached the draft
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySource {
    Text,
    Voice,
    Photo,
}

/// Create the submit/clear keyboard attached to control messages
pub fn create_action_keyboard(language: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            t_lang("button-create-task", language),
            ButtonAction::Submit.callback_data(),
        )],
        vec![InlineKeyboardButton::callback(
            t_lang("button-clear-draft", language),
            ButtonAction::Clear.callback_data(),
        )],
    ])
}

/// Telegram rejects messages longer than 4096 characters; echoed entries
/// share this budget, leaving room for headers.
pub const MAX_ECHO_CHARS: usize = 3500;

/// Shorten `text` to at most `max_chars` characters, marking the cut with "…"
pub fn truncate_for_display(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut shortened: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    shortened.push('…');
    shortened
}

/// Format draft entries as a numbered list
pub fn format_entries_list(entries: &[String]) -> String {
    let per_entry = MAX_ECHO_CHARS / entries.len().max(1);
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| format!("{}. {}", i + 1, truncate_for_display(entry, per_entry)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Confirmation shown after an entry was appended
pub fn format_entry_added(
    source: EntrySource,
    entry: &str,
    count: usize,
    capacity: usize,
    language: &str,
) -> String {
    let count = count.to_string();
    let capacity = capacity.to_string();
    let entry = truncate_for_display(entry, MAX_ECHO_CHARS);
    let header = t_args_lang(
        "draft-added",
        &[("count", &count), ("capacity", &capacity)],
        language,
    );

    match source {
        EntrySource::Text => format!("{header}\n\n{entry}"),
        EntrySource::Voice => format!(
            "{}\n{entry}\n\n{header}",
            t_lang("draft-recognized-voice", language)
        ),
        EntrySource::Photo => format!(
            "{}\n{entry}\n\n{header}",
            t_lang("draft-recognized-photo", language)
        ),
    }
}

/// Full draft listing for the /draft command
pub fn format_draft(entries: &[String], capacity: usize, language: &str) -> String {
    let count = entries.len().to_string();
    let capacity = capacity.to_string();
    format!(
        "{}\n\n{}",
        t_args_lang(
            "draft-current",
            &[("count", &count), ("capacity", &capacity)],
            language
        ),
        format_entries_list(entries)
    )
}

pub fn welcome_message(language: &str) -> String {
    format!(
        "{}\n{}",
        t_lang("welcome-title", language),
        t_lang("welcome-action", language)
    )
}

pub fn help_message(capacity: usize, language: &str) -> String {
    let capacity = capacity.to_string();
    [
        t_lang("help-title", language),
        t_lang("help-text", language),
        t_lang("help-voice", language),
        t_lang("help-photo", language),
        t_args_lang("help-limit", &[("capacity", &capacity)], language),
        t_lang("help-commands", language),
    ]
    .join("\n\n")
}

pub fn draft_full_message(capacity: usize, language: &str) -> String {
    t_args_lang("error-draft-full", &[("capacity", &capacity.to_string())], language)
}
