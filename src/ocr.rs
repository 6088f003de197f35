//! Text extraction from photos.
//!
//! The default backend is Google Cloud Vision `TEXT_DETECTION`. With the
//! `tesseract` feature a local Tesseract engine can be used instead.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::{MediaLimits, RecoveryConfig};
use crate::errors::RecognitionError;
use crate::google_auth::TokenSource;
use crate::retry::with_retry;

pub const VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";
pub const MIN_FORMAT_BYTES: usize = 8;

/// Turns an image into text; `Ok(None)` when no text was found
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, image: &[u8]) -> Result<Option<String>, RecognitionError>;
}

/// Check that the bytes look like an image format the OCR backends accept
pub fn validate_image(image: &[u8], limits: &MediaLimits) -> Result<image::ImageFormat, RecognitionError> {
    if image.len() < MIN_FORMAT_BYTES {
        return Err(RecognitionError::UnsupportedFormat(format!(
            "only {} bytes, need at least {MIN_FORMAT_BYTES}",
            image.len()
        )));
    }
    if image.len() > limits.max_image_bytes {
        return Err(RecognitionError::UnsupportedFormat(format!(
            "image too large: {} bytes (limit {})",
            image.len(),
            limits.max_image_bytes
        )));
    }

    let format = image::guess_format(image)
        .map_err(|e| RecognitionError::UnsupportedFormat(e.to_string()))?;

    let supported = matches!(
        format,
        image::ImageFormat::Png
            | image::ImageFormat::Jpeg
            | image::ImageFormat::Bmp
            | image::ImageFormat::Tiff
            | image::ImageFormat::WebP
            | image::ImageFormat::Gif
    );
    if supported {
        Ok(format)
    } else {
        Err(RecognitionError::UnsupportedFormat(format!("{format:?}")))
    }
}

/// Collapse blank lines and surrounding whitespace in OCR output
pub fn clean_extracted_text(raw: &str) -> Option<String> {
    let cleaned = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<&str>>()
        .join("\n");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

pub fn annotate_request(image: &[u8]) -> Value {
    json!({
        "requests": [{
            "image": { "content": base64::engine::general_purpose::STANDARD.encode(image) },
            "features": [{ "type": "TEXT_DETECTION" }]
        }]
    })
}

/// Pull the full detected text out of an `images:annotate` response
pub fn text_from_annotate_response(body: &Value) -> Result<Option<String>, RecognitionError> {
    if let Some(message) = body.pointer("/error/message").and_then(Value::as_str) {
        return Err(RecognitionError::Api(message.to_string()));
    }
    let Some(first) = body.pointer("/responses/0") else {
        return Ok(None);
    };
    if let Some(message) = first.pointer("/error/message").and_then(Value::as_str) {
        if !message.is_empty() {
            return Err(RecognitionError::Api(message.to_string()));
        }
    }

    Ok(first
        .pointer("/textAnnotations/0/description")
        .and_then(Value::as_str)
        .and_then(clean_extracted_text))
}

/// [`TextExtractor`] backed by Google Cloud Vision
pub struct GoogleVisionExtractor {
    client: reqwest::Client,
    auth: Arc<dyn TokenSource>,
    breaker: CircuitBreaker,
    recovery: RecoveryConfig,
    limits: MediaLimits,
}

impl GoogleVisionExtractor {
    pub fn new(
        client: reqwest::Client,
        auth: Arc<dyn TokenSource>,
        recovery: RecoveryConfig,
        limits: MediaLimits,
    ) -> Self {
        Self {
            client,
            auth,
            breaker: CircuitBreaker::new("vision", &recovery),
            recovery,
            limits,
        }
    }

    async fn annotate(&self, body: &Value) -> Result<Option<String>, RecognitionError> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .post(VISION_ENDPOINT)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let payload: Value = response.json().await?;
        if status.is_server_error() {
            return Err(RecognitionError::Request(format!("vision API returned {status}")));
        }
        text_from_annotate_response(&payload)
    }
}

#[async_trait]
impl TextExtractor for GoogleVisionExtractor {
    async fn extract(&self, image: &[u8]) -> Result<Option<String>, RecognitionError> {
        let format = validate_image(image, &self.limits)?;
        info!(format = ?format, bytes = image.len(), "Sending image to Vision API");

        let body = annotate_request(image);
        let text = with_retry(&self.breaker, &self.recovery, || self.annotate(&body)).await;
        if let Err(e) = &text {
            warn!(error = %e, "Vision text detection failed");
        }
        text
    }
}

#[cfg(feature = "tesseract")]
pub use local::{TesseractExtractor, DEFAULT_LANGUAGES as TESSERACT_LANGUAGES};

#[cfg(feature = "tesseract")]
mod local {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use leptess::LepTess;
    use tracing::info;

    use super::{clean_extracted_text, validate_image, TextExtractor};
    use crate::config::MediaLimits;
    use crate::errors::RecognitionError;

    pub const DEFAULT_LANGUAGES: &str = "ukr+eng";

    /// Local OCR with a single reused Tesseract engine.
    ///
    /// Engine initialisation is slow, so it is created on first use and
    /// kept for the lifetime of the extractor.
    pub struct TesseractExtractor {
        languages: String,
        limits: MediaLimits,
        engine: Mutex<Option<Arc<Mutex<LepTess>>>>,
    }

    impl TesseractExtractor {
        pub fn new(languages: impl Into<String>, limits: MediaLimits) -> Self {
            Self {
                languages: languages.into(),
                limits,
                engine: Mutex::new(None),
            }
        }

        fn engine(&self) -> Result<Arc<Mutex<LepTess>>, RecognitionError> {
            let mut slot = self.engine.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(engine) = slot.as_ref() {
                return Ok(Arc::clone(engine));
            }
            info!(languages = %self.languages, "Creating Tesseract instance");
            let tess = LepTess::new(None, &self.languages)
                .map_err(|e| RecognitionError::Api(format!("Tesseract init failed: {e}")))?;
            let engine = Arc::new(Mutex::new(tess));
            *slot = Some(Arc::clone(&engine));
            Ok(engine)
        }
    }

    impl Default for TesseractExtractor {
        fn default() -> Self {
            Self::new(DEFAULT_LANGUAGES, MediaLimits::default())
        }
    }

    #[async_trait]
    impl TextExtractor for TesseractExtractor {
        async fn extract(&self, image: &[u8]) -> Result<Option<String>, RecognitionError> {
            validate_image(image, &self.limits)?;
            let engine = self.engine()?;
            let bytes = image.to_vec();

            tokio::task::spawn_blocking(move || {
                let mut tess = engine.lock().unwrap_or_else(|p| p.into_inner());
                tess.set_image_from_mem(&bytes)
                    .map_err(|e| RecognitionError::UnsupportedFormat(e.to_string()))?;
                let text = tess
                    .get_utf8_text()
                    .map_err(|e| RecognitionError::Api(e.to_string()))?;
                Ok(clean_extracted_text(&text))
            })
            .await
            .map_err(|e| RecognitionError::Api(format!("OCR task panicked: {e}")))?
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    #[test]
    fn test_png_accepted() {
        let format = validate_image(PNG_HEADER, &MediaLimits::default()).unwrap();
        assert_eq!(format, image::ImageFormat::Png);
    }

    #[test]
    fn test_jpeg_accepted() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
        assert!(validate_image(&jpeg, &MediaLimits::default()).is_ok());
    }

    #[test]
    fn test_short_or_unknown_data_rejected() {
        let limits = MediaLimits::default();
        assert!(matches!(
            validate_image(b"abc", &limits),
            Err(RecognitionError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            validate_image(b"plain text, not an image", &limits),
            Err(RecognitionError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_oversized_image_rejected() {
        let limits = MediaLimits {
            max_image_bytes: 10,
            ..Default::default()
        };
        let mut big = PNG_HEADER.to_vec();
        big.extend_from_slice(&[0; 64]);
        assert!(validate_image(&big, &limits).is_err());
    }

    #[test]
    fn test_clean_text_drops_blank_lines() {
        assert_eq!(
            clean_extracted_text("  Купити хліб \n\n   \n Молоко  \n").as_deref(),
            Some("Купити хліб\nМолоко")
        );
        assert_eq!(clean_extracted_text(" \n \n"), None);
    }

    #[test]
    fn test_annotate_response_parsing() {
        let body = json!({
            "responses": [{
                "textAnnotations": [
                    {"description": "Купити хліб\nМолоко\n"},
                    {"description": "Купити"}
                ]
            }]
        });
        assert_eq!(
            text_from_annotate_response(&body).unwrap().as_deref(),
            Some("Купити хліб\nМолоко")
        );
    }

    #[test]
    fn test_annotate_response_without_text() {
        let body = json!({"responses": [{}]});
        assert_eq!(text_from_annotate_response(&body).unwrap(), None);
    }

    #[test]
    fn test_annotate_response_error() {
        let body = json!({"responses": [{"error": {"code": 3, "message": "Bad image data."}}]});
        assert!(matches!(
            text_from_annotate_response(&body),
            Err(RecognitionError::Api(_))
        ));
    }
}
