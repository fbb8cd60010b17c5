// src/error.rs
use thiserror::Error;

/// Errors surfaced by the MoodSync client
#[derive(Debug, Error)]
pub enum MoodSyncError {
    #[error("No camera is available on this system")]
    CameraUnavailable,

    #[error("Camera access denied: {0}")]
    CameraAccessDenied(String),

    #[error("Frame capture failed: {0}")]
    FrameCapture(String),

    #[error("Image encoding failed: {0}")]
    ImageEncode(String),

    #[error("No image to send")]
    EmptyImage,

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("{0}")]
    Server(String),

    #[error("Malformed server response: {0}")]
    BadResponse(String),

    #[error("Page is missing required element '{0}'")]
    MissingHook(&'static str),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MoodSyncError>;

impl From<nokhwa::NokhwaError> for MoodSyncError {
    fn from(err: nokhwa::NokhwaError) -> Self {
        match err {
            nokhwa::NokhwaError::OpenDeviceError(device, error) => {
                MoodSyncError::CameraAccessDenied(format!("device {device}: {error}"))
            }
            nokhwa::NokhwaError::OpenStreamError(error) => {
                MoodSyncError::CameraAccessDenied(error)
            }
            nokhwa::NokhwaError::ReadFrameError(error) => MoodSyncError::FrameCapture(error),
            _ => MoodSyncError::FrameCapture(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for MoodSyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            MoodSyncError::BadResponse(err.to_string())
        } else {
            MoodSyncError::Transport(err.to_string())
        }
    }
}

impl From<image::ImageError> for MoodSyncError {
    fn from(err: image::ImageError) -> Self {
        MoodSyncError::ImageEncode(err.to_string())
    }
}

impl MoodSyncError {
    /// Camera errors end the capture session; everything else can be retried by the user
    pub fn is_terminal_for_capture(&self) -> bool {
        matches!(
            self,
            MoodSyncError::CameraUnavailable | MoodSyncError::CameraAccessDenied(_)
        )
    }
}
