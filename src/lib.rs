//! # Task Draft Telegram Bot
//!
//! A Telegram bot that collects text, voice and photo messages into a
//! per-conversation draft and, on request, appends the draft as a single
//! task row to a Google Sheets task list.

pub mod bot;
pub mod circuit_breaker;
pub mod config;
pub mod draft;
pub mod errors;
pub mod google_auth;
pub mod localization;
pub mod ocr;
pub mod retry;
pub mod sheets;
pub mod speech;
