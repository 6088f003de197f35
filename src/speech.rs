//! Voice transcription through Google Speech-to-Text.
//!
//! Telegram voice notes arrive as OGG/Opus. They are converted with `ffmpeg`
//! to 16 kHz mono 16-bit PCM WAV and sent inline to `speech:recognize`.
//! Both intermediate files are [`NamedTempFile`]s, removed when they drop on
//! every exit path.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::{MediaLimits, RecoveryConfig};
use crate::errors::RecognitionError;
use crate::google_auth::TokenSource;
use crate::retry::with_retry;

pub const SPEECH_ENDPOINT: &str = "https://speech.googleapis.com/v1/speech:recognize";
pub const SAMPLE_RATE_HERTZ: u32 = 16000;
pub const SPEECH_MODEL: &str = "latest_long";

/// Turns audio into text.
///
/// `Ok(None)` means nothing was recognized. Callers treat errors the same
/// way, the distinction only matters for logging.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: &[u8],
        language_hint: &str,
    ) -> Result<Option<String>, RecognitionError>;
}

/// Convert any audio container to WAV PCM 16-bit, mono, 16 kHz.
///
/// The returned temp file owns the converted audio.
pub async fn convert_to_wav(audio: &[u8]) -> Result<NamedTempFile, RecognitionError> {
    let input = tempfile::Builder::new()
        .prefix("voice-")
        .suffix(".ogg")
        .tempfile()
        .map_err(|e| RecognitionError::Conversion(e.to_string()))?;
    tokio::fs::write(input.path(), audio)
        .await
        .map_err(|e| RecognitionError::Conversion(e.to_string()))?;

    let output = tempfile::Builder::new()
        .prefix("voice-")
        .suffix(".wav")
        .tempfile()
        .map_err(|e| RecognitionError::Conversion(e.to_string()))?;

    let result = tokio::process::Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
        .arg(input.path())
        .args(["-vn", "-ac", "1", "-ar", "16000", "-sample_fmt", "s16"])
        .arg(output.path())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| RecognitionError::Conversion(format!("failed to run ffmpeg: {e}")))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(RecognitionError::Conversion(format!(
            "ffmpeg exited with {}: {}",
            result.status,
            stderr.trim()
        )));
    }

    debug!(path = %output.path().display(), "Audio converted to WAV");
    Ok(output)
}

/// Build the `speech:recognize` request body for LINEAR16 audio
pub fn recognize_request(wav: &[u8], language_code: &str) -> Value {
    json!({
        "config": {
            "encoding": "LINEAR16",
            "sampleRateHertz": SAMPLE_RATE_HERTZ,
            "languageCode": language_code,
            "enableAutomaticPunctuation": true,
            "model": SPEECH_MODEL,
        },
        "audio": {
            "content": base64::engine::general_purpose::STANDARD.encode(wav),
        }
    })
}

/// Join the top alternative of every result into one string.
///
/// Returns `None` when there are no results or every transcript is blank.
pub fn transcript_from_response(body: &Value) -> Result<Option<String>, RecognitionError> {
    if let Some(message) = body.pointer("/error/message").and_then(Value::as_str) {
        return Err(RecognitionError::Api(message.to_string()));
    }

    let parts: Vec<&str> = body
        .get("results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .filter_map(|result| result.pointer("/alternatives/0/transcript"))
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if parts.is_empty() {
        Ok(None)
    } else {
        Ok(Some(parts.join(" ")))
    }
}

/// [`Transcriber`] backed by Google Speech-to-Text
pub struct GoogleSpeechTranscriber {
    client: reqwest::Client,
    auth: Arc<dyn TokenSource>,
    breaker: CircuitBreaker,
    recovery: RecoveryConfig,
    limits: MediaLimits,
}

impl GoogleSpeechTranscriber {
    pub fn new(
        client: reqwest::Client,
        auth: Arc<dyn TokenSource>,
        recovery: RecoveryConfig,
        limits: MediaLimits,
    ) -> Self {
        Self {
            client,
            auth,
            breaker: CircuitBreaker::new("speech", &recovery),
            recovery,
            limits,
        }
    }

    async fn recognize(&self, body: &Value) -> Result<Option<String>, RecognitionError> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .post(SPEECH_ENDPOINT)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let payload: Value = response.json().await?;
        if status.is_server_error() {
            return Err(RecognitionError::Request(format!("speech API returned {status}")));
        }
        transcript_from_response(&payload)
    }
}

#[async_trait]
impl Transcriber for GoogleSpeechTranscriber {
    async fn transcribe(
        &self,
        audio: &[u8],
        language_hint: &str,
    ) -> Result<Option<String>, RecognitionError> {
        if audio.len() > self.limits.max_audio_bytes {
            return Err(RecognitionError::UnsupportedFormat(format!(
                "audio too large: {} bytes",
                audio.len()
            )));
        }

        let wav_file = convert_to_wav(audio).await?;
        let wav = tokio::fs::read(wav_file.path())
            .await
            .map_err(|e| RecognitionError::Conversion(e.to_string()))?;
        drop(wav_file);

        let body = recognize_request(&wav, language_hint);
        let transcript = with_retry(&self.breaker, &self.recovery, || self.recognize(&body)).await;

        match &transcript {
            Ok(Some(text)) => info!(chars = text.len(), "Speech recognized"),
            Ok(None) => info!("Speech API returned no transcript"),
            Err(e) => warn!(error = %e, "Speech recognition failed"),
        }
        transcript
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_joins_top_alternatives() {
        let body = json!({
            "results": [
                {"alternatives": [{"transcript": " купити молоко "}, {"transcript": "ignored"}]},
                {"alternatives": []},
                {"alternatives": [{"transcript": "подзвонити Олексі"}]}
            ]
        });
        assert_eq!(
            transcript_from_response(&body).unwrap().as_deref(),
            Some("купити молоко подзвонити Олексі")
        );
    }

    #[test]
    fn test_empty_results_mean_nothing_recognized() {
        assert_eq!(transcript_from_response(&json!({})).unwrap(), None);
        let blank = json!({"results": [{"alternatives": [{"transcript": "   "}]}]});
        assert_eq!(transcript_from_response(&blank).unwrap(), None);
    }

    #[test]
    fn test_api_error_surfaces() {
        let body = json!({"error": {"code": 400, "message": "Invalid audio"}});
        assert!(matches!(
            transcript_from_response(&body),
            Err(RecognitionError::Api(msg)) if msg == "Invalid audio"
        ));
    }

    #[test]
    fn test_request_carries_language_and_encoding() {
        let body = recognize_request(b"RIFF", "uk-UA");
        assert_eq!(body["config"]["languageCode"], "uk-UA");
        assert_eq!(body["config"]["encoding"], "LINEAR16");
        assert_eq!(body["config"]["sampleRateHertz"], 16000);
        assert_eq!(body["audio"]["content"], "UklGRg==");
    }
}
