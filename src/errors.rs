//! # Error Types Module
//!
//! This module defines the error types used throughout the bot. Each external
//! boundary (draft buffer, recognition, persistence, Telegram, Google auth,
//! configuration) gets its own enum so handlers can map failures to the right
//! user-facing notice.

/// Errors raised by the draft buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    /// The draft already holds `capacity` entries
    CapacityExceeded { capacity: usize },
    /// The entry was empty after trimming
    EmptyEntry,
}

impl std::fmt::Display for DraftError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DraftError::CapacityExceeded { capacity } => {
                write!(f, "Draft is full ({capacity} entries)")
            }
            DraftError::EmptyEntry => write!(f, "Draft entry is empty"),
        }
    }
}

impl std::error::Error for DraftError {}

/// Errors from the transcription and text-extraction services.
///
/// The controller never shows these to the user verbatim: every variant
/// collapses into "nothing recognized".
#[derive(Debug, Clone)]
pub enum RecognitionError {
    /// Media could not be fetched from Telegram
    Download(String),
    /// Media bytes are not in a supported format or too large
    UnsupportedFormat(String),
    /// ffmpeg or local temp file handling failed
    Conversion(String),
    /// HTTP transport errors
    Request(String),
    /// The remote API answered with an error payload
    Api(String),
    /// The call exceeded its time budget
    Timeout(String),
    /// The circuit breaker is open for this service
    CircuitOpen,
}

impl std::fmt::Display for RecognitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecognitionError::Download(msg) => write!(f, "Download error: {msg}"),
            RecognitionError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {msg}"),
            RecognitionError::Conversion(msg) => write!(f, "Conversion error: {msg}"),
            RecognitionError::Request(msg) => write!(f, "Request error: {msg}"),
            RecognitionError::Api(msg) => write!(f, "API error: {msg}"),
            RecognitionError::Timeout(msg) => write!(f, "Timeout error: {msg}"),
            RecognitionError::CircuitOpen => write!(f, "Circuit breaker is open"),
        }
    }
}

impl std::error::Error for RecognitionError {}

impl From<reqwest::Error> for RecognitionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RecognitionError::Timeout(err.to_string())
        } else {
            RecognitionError::Request(err.to_string())
        }
    }
}

impl From<AuthError> for RecognitionError {
    fn from(err: AuthError) -> Self {
        RecognitionError::Request(err.to_string())
    }
}

/// Errors from the task persistence service
#[derive(Debug, Clone)]
pub enum PersistenceError {
    /// Access token could not be obtained
    Auth(String),
    /// HTTP transport errors
    Request(String),
    /// The remote API rejected the append
    Api(String),
    /// The call exceeded its time budget
    Timeout(String),
    /// The circuit breaker is open for this service
    CircuitOpen,
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceError::Auth(msg) => write!(f, "Authentication error: {msg}"),
            PersistenceError::Request(msg) => write!(f, "Request error: {msg}"),
            PersistenceError::Api(msg) => write!(f, "API error: {msg}"),
            PersistenceError::Timeout(msg) => write!(f, "Timeout error: {msg}"),
            PersistenceError::CircuitOpen => write!(f, "Circuit breaker is open"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<reqwest::Error> for PersistenceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PersistenceError::Timeout(err.to_string())
        } else {
            PersistenceError::Request(err.to_string())
        }
    }
}

impl From<AuthError> for PersistenceError {
    fn from(err: AuthError) -> Self {
        PersistenceError::Auth(err.to_string())
    }
}

/// Errors talking to Telegram (sending, editing, downloading)
#[derive(Debug, Clone)]
pub struct GatewayError(pub String);

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Telegram error: {}", self.0)
    }
}

impl std::error::Error for GatewayError {}

impl From<teloxide::RequestError> for GatewayError {
    fn from(err: teloxide::RequestError) -> Self {
        GatewayError(err.to_string())
    }
}

impl From<teloxide::DownloadError> for GatewayError {
    fn from(err: teloxide::DownloadError) -> Self {
        GatewayError(err.to_string())
    }
}

/// Errors obtaining Google access tokens
#[derive(Debug, Clone)]
pub enum AuthError {
    /// The service-account key JSON is malformed
    InvalidKey(String),
    /// JWT signing failed
    Signing(String),
    /// The token endpoint rejected the assertion or was unreachable
    TokenExchange(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidKey(msg) => write!(f, "Invalid service account key: {msg}"),
            AuthError::Signing(msg) => write!(f, "JWT signing error: {msg}"),
            AuthError::TokenExchange(msg) => write!(f, "Token exchange error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Errors loading configuration from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set
    Missing(&'static str),
    /// A variable is set but cannot be parsed
    Invalid { key: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{key} must be set"),
            ConfigError::Invalid { key, value } => write!(f, "Invalid value for {key}: {value:?}"),
        }
    }
}

impl std::error::Error for ConfigError {}
