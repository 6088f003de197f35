//! # Configuration Module
//!
//! This module defines the bot configuration, loaded from environment
//! variables (optionally via a `.env` file), together with the recovery and
//! media-limit settings used by the external service clients.

use std::time::Duration;

use crate::errors::ConfigError;

// Constants for bot configuration
pub const DEFAULT_DRAFT_CAPACITY: usize = 3;
pub const DEFAULT_SPEECH_LANGUAGE: &str = "uk-UA";
pub const DEFAULT_BOT_LANGUAGE: &str = "uk";
pub const DEFAULT_TASK_NAME: &str = "Задача з Telegram";
pub const DEFAULT_TASK_TAG: &str = "#інше";
pub const DEFAULT_SHEET_RANGE: &str = "A:L";
pub const DEFAULT_PORT: u16 = 10000;
pub const DEFAULT_RECOGNITION_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_PERSISTENCE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RECOGNITION_WORKERS: usize = 2;
pub const DEFAULT_RECOGNITION_QUEUE_SIZE: usize = 32;
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024; // 10MB limit for photos
pub const MAX_AUDIO_SIZE: usize = 20 * 1024 * 1024; // Telegram bot download limit

/// Recovery configuration for calls to external services
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of attempts for idempotent calls
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_retry_delay_ms: 1000, // 1 second
            max_retry_delay_ms: 10000, // 10 seconds
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60, // 1 minute
        }
    }
}

/// Size limits for downloaded media
#[derive(Debug, Clone)]
pub struct MediaLimits {
    pub max_image_bytes: usize,
    pub max_audio_bytes: usize,
}

impl Default for MediaLimits {
    fn default() -> Self {
        Self {
            max_image_bytes: MAX_IMAGE_SIZE,
            max_audio_bytes: MAX_AUDIO_SIZE,
        }
    }
}

/// Which backend turns photos into text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    /// Google Cloud Vision `TEXT_DETECTION`
    Vision,
    /// Local Tesseract engine (requires the `tesseract` feature)
    Tesseract,
}

/// Draft and submission behaviour
#[derive(Debug, Clone)]
pub struct DraftSettings {
    /// Maximum number of entries in one draft
    pub capacity: usize,
    /// Fixed name written for every submitted task
    pub task_name: String,
    /// Fixed tag written for every submitted task
    pub task_tag: String,
    /// Language code for replies (`uk`, `en`)
    pub language: String,
    /// Language hint passed to the transcription service
    pub speech_language: String,
    pub recognition_timeout: Duration,
    pub persistence_timeout: Duration,
}

impl Default for DraftSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_DRAFT_CAPACITY,
            task_name: DEFAULT_TASK_NAME.to_string(),
            task_tag: DEFAULT_TASK_TAG.to_string(),
            language: DEFAULT_BOT_LANGUAGE.to_string(),
            speech_language: DEFAULT_SPEECH_LANGUAGE.to_string(),
            recognition_timeout: Duration::from_secs(DEFAULT_RECOGNITION_TIMEOUT_SECS),
            persistence_timeout: Duration::from_secs(DEFAULT_PERSISTENCE_TIMEOUT_SECS),
        }
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub spreadsheet_id: String,
    /// Raw service-account key JSON
    pub google_credentials_json: String,
    pub sheet_range: String,
    /// Public base URL; webhook mode when present, long polling otherwise
    pub webhook_url: Option<String>,
    pub port: u16,
    pub recognition_workers: usize,
    pub recognition_queue_size: usize,
    pub extractor: ExtractorKind,
    pub draft: DraftSettings,
    pub recovery: RecoveryConfig,
    pub media_limits: MediaLimits,
}

impl BotConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let capacity: usize = parse_or(&get, "DRAFT_CAPACITY", DEFAULT_DRAFT_CAPACITY)?;
        if capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "DRAFT_CAPACITY",
                value: "0".to_string(),
            });
        }

        let recognition_workers: usize =
            parse_or(&get, "RECOGNITION_WORKERS", DEFAULT_RECOGNITION_WORKERS)?;
        if recognition_workers == 0 {
            return Err(ConfigError::Invalid {
                key: "RECOGNITION_WORKERS",
                value: "0".to_string(),
            });
        }

        let extractor = match get("TEXT_EXTRACTOR").as_deref().map(str::trim) {
            None | Some("vision") => ExtractorKind::Vision,
            Some("tesseract") => ExtractorKind::Tesseract,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "TEXT_EXTRACTOR",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            bot_token: required("TELEGRAM_BOT_TOKEN")?,
            spreadsheet_id: required("SPREADSHEET_ID")?,
            google_credentials_json: required("GOOGLE_CREDENTIALS_JSON")?,
            sheet_range: get("SHEET_RANGE").unwrap_or_else(|| DEFAULT_SHEET_RANGE.to_string()),
            webhook_url: get("WEBHOOK_URL").map(|url| url.trim_end_matches('/').to_string()),
            port: parse_or(&get, "PORT", DEFAULT_PORT)?,
            recognition_workers,
            recognition_queue_size: parse_or(
                &get,
                "RECOGNITION_QUEUE_SIZE",
                DEFAULT_RECOGNITION_QUEUE_SIZE,
            )?
            .max(1),
            extractor,
            draft: DraftSettings {
                capacity,
                task_name: get("TASK_NAME").unwrap_or_else(|| DEFAULT_TASK_NAME.to_string()),
                task_tag: get("TASK_TAG").unwrap_or_else(|| DEFAULT_TASK_TAG.to_string()),
                language: get("BOT_LANGUAGE").unwrap_or_else(|| DEFAULT_BOT_LANGUAGE.to_string()),
                speech_language: get("SPEECH_LANGUAGE")
                    .unwrap_or_else(|| DEFAULT_SPEECH_LANGUAGE.to_string()),
                recognition_timeout: Duration::from_secs(parse_or(
                    &get,
                    "RECOGNITION_TIMEOUT_SECS",
                    DEFAULT_RECOGNITION_TIMEOUT_SECS,
                )?),
                persistence_timeout: Duration::from_secs(parse_or(
                    &get,
                    "PERSISTENCE_TIMEOUT_SECS",
                    DEFAULT_PERSISTENCE_TIMEOUT_SECS,
                )?),
            },
            recovery: RecoveryConfig::default(),
            media_limits: MediaLimits::default(),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}
