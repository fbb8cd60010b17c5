// src/models.rs
use crate::error::{MoodSyncError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};

const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// A still image encoded as a `data:` URI, the form the server expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedImage(String);

impl EncodedImage {
    pub fn from_jpeg_bytes(bytes: &[u8]) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self(format!("{JPEG_DATA_URI_PREFIX}{encoded}"))
    }

    /// Accepts an existing `data:image/...` URI
    pub fn from_data_uri(uri: impl Into<String>) -> Option<Self> {
        let uri = uri.into();
        uri.starts_with("data:image/").then_some(Self(uri))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the URI carries no payload after the header
    pub fn is_empty(&self) -> bool {
        match self.0.split_once(',') {
            Some((_, payload)) => payload.is_empty(),
            None => self.0.is_empty(),
        }
    }

    /// Decodes the base64 payload back into raw image bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = self
            .0
            .split_once(',')
            .map(|(_, data)| data)
            .unwrap_or(&self.0);
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| MoodSyncError::InvalidInput(format!("bad image payload: {e}")))
    }
}

/// A classification returned by the server
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub emotion_label: String,
    /// Confidence level (0.0 to 1.0)
    pub confidence: f64,
}

impl DetectionResult {
    pub fn new(emotion_label: impl Into<String>, confidence: f64) -> Self {
        Self {
            emotion_label: emotion_label.into(),
            confidence,
        }
    }

    /// Returns the confidence as a percentage (0-100)
    pub fn confidence_percent(&self) -> u8 {
        (self.confidence.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}

impl std::fmt::Display for DetectionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}% confidence)",
            self.emotion_label,
            self.confidence_percent()
        )
    }
}

/// Where the capture workflow currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Live,
    Frozen,
    FrozenDetected,
}

/// A suggestion the user can rate with one to five stars
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    /// 0 when not rated yet
    #[serde(default)]
    pub rating: u8,
}
