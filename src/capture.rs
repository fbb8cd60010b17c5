// src/capture.rs - Camera session: live preview, frame freeze and release
use crate::error::{MoodSyncError, Result};
use crate::models::{CaptureState, EncodedImage};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ImageBuffer};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::{Camera, NokhwaError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Latest live frame, or `None` while the live feed is not visible
pub type LiveFeed = watch::Receiver<Option<Arc<DynamicImage>>>;

/// Anything that can hand out camera frames
pub trait FrameSource {
    /// Acquires the device and starts streaming
    fn open(&mut self) -> Result<()>;
    fn is_streaming(&self) -> bool;
    fn grab(&mut self) -> Result<DynamicImage>;
    /// Stops the stream and gives the device back to the OS
    fn release(&mut self);
}

/// Webcam frame source backed by nokhwa
pub struct NokhwaCamera {
    index: u32,
    camera: Option<Camera>,
}

impl NokhwaCamera {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            camera: None,
        }
    }

    /// Lists available camera devices
    pub fn list_devices() -> Result<Vec<String>> {
        let devices = nokhwa::query(nokhwa::utils::ApiBackend::Auto)
            .map_err(|e| MoodSyncError::FrameCapture(format!("Failed to query cameras: {e}")))?;

        Ok(devices
            .iter()
            .map(|info| info.human_name().to_string())
            .collect())
    }
}

impl FrameSource for NokhwaCamera {
    fn open(&mut self) -> Result<()> {
        if self.camera.is_some() {
            return Ok(());
        }

        require_devices(nokhwa::query(nokhwa::utils::ApiBackend::Auto))?;

        use nokhwa::utils::{CameraFormat, FrameFormat, Resolution};

        let format = CameraFormat::new(Resolution::new(640, 480), FrameFormat::MJPEG, 30);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

        let mut camera = Camera::new(CameraIndex::Index(self.index), requested)
            .map_err(|e| MoodSyncError::CameraAccessDenied(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| MoodSyncError::CameraAccessDenied(e.to_string()))?;

        info!(
            camera = %camera.info().human_name(),
            index = self.index,
            "camera stream opened"
        );
        self.camera = Some(camera);
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.camera
            .as_ref()
            .map(|cam| cam.is_stream_open())
            .unwrap_or(false)
    }

    fn grab(&mut self) -> Result<DynamicImage> {
        let cam = self
            .camera
            .as_mut()
            .ok_or_else(|| MoodSyncError::FrameCapture("camera is not open".to_string()))?;

        let frame = cam.frame()?;
        let decoded = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| MoodSyncError::FrameCapture(format!("Failed to decode frame: {e}")))?;

        let (width, height) = (decoded.width(), decoded.height());
        let img: ImageBuffer<image::Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_raw(width, height, decoded.into_raw()).ok_or_else(|| {
                MoodSyncError::FrameCapture("Failed to create image buffer".to_string())
            })?;

        // Mirror so the preview behaves like a mirror
        let flipped = image::imageops::flip_horizontal(&img);
        Ok(DynamicImage::ImageRgb8(flipped))
    }

    fn release(&mut self) {
        if let Some(mut cam) = self.camera.take() {
            if let Err(e) = cam.stop_stream() {
                error!("Error stopping camera stream: {}", e);
            }
        }
    }
}

/// An empty device list means the system has no camera; a failed query keeps its reason
fn require_devices<T>(query: std::result::Result<Vec<T>, NokhwaError>) -> Result<()> {
    let devices = query.map_err(|e| MoodSyncError::CameraAccessDenied(e.to_string()))?;
    if devices.is_empty() {
        return Err(MoodSyncError::CameraUnavailable);
    }
    Ok(())
}

/// Whether the session got hold of a camera
#[derive(Debug, Clone, PartialEq)]
pub enum CameraStatus {
    Pending,
    Streaming,
    Unavailable(String),
    Released,
}

/// One capture session per view. Owns the camera exclusively.
///
/// `frame_image` is present exactly when the session is frozen.
pub struct CaptureSession<S: FrameSource> {
    source: S,
    status: CameraStatus,
    jpeg_quality: u8,
    frame_image: Option<EncodedImage>,
    frozen_frame: Option<Arc<DynamicImage>>,
    last_frame: Option<Arc<DynamicImage>>,
    detected: bool,
    captured_at: Option<chrono::DateTime<chrono::Local>>,
    feed: watch::Sender<Option<Arc<DynamicImage>>>,
    released: bool,
}

impl<S: FrameSource> CaptureSession<S> {
    pub fn new(source: S, jpeg_quality: u8) -> Self {
        let (feed, _) = watch::channel(None);
        Self {
            source,
            status: CameraStatus::Pending,
            jpeg_quality,
            frame_image: None,
            frozen_frame: None,
            last_frame: None,
            detected: false,
            captured_at: None,
            feed,
            released: false,
        }
    }

    /// Requests the camera. Failure is terminal for this session: capture stays disabled.
    pub fn start(&mut self) -> Result<()> {
        if self.released {
            warn!("start called on a torn down capture session");
            return Ok(());
        }

        match self.source.open() {
            Ok(()) => {
                self.status = CameraStatus::Streaming;
                info!("capture session started");
                Ok(())
            }
            Err(e) => {
                error!("Camera initialization failed: {}", e);
                self.status = CameraStatus::Unavailable(e.to_string());
                Err(e)
            }
        }
    }

    pub fn status(&self) -> &CameraStatus {
        &self.status
    }

    pub fn state(&self) -> CaptureState {
        match (&self.frame_image, self.detected) {
            (None, _) => CaptureState::Live,
            (Some(_), false) => CaptureState::Frozen,
            (Some(_), true) => CaptureState::FrozenDetected,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frame_image.is_some()
    }

    /// True when capture is allowed: a live, playing stream
    pub fn can_capture(&self) -> bool {
        self.status == CameraStatus::Streaming && self.source.is_streaming() && !self.is_frozen()
    }

    pub fn frame_image(&self) -> Option<&EncodedImage> {
        self.frame_image.as_ref()
    }

    pub fn captured_at(&self) -> Option<chrono::DateTime<chrono::Local>> {
        self.captured_at
    }

    /// The frame to show: the frozen still, or the latest live frame
    pub fn display_frame(&self) -> Option<&Arc<DynamicImage>> {
        self.frozen_frame.as_ref().or(self.last_frame.as_ref())
    }

    /// Receiver for the live feed used by live detection
    pub fn subscribe_feed(&self) -> LiveFeed {
        self.feed.subscribe()
    }

    /// Pulls a fresh preview frame while live and publishes it on the feed
    pub fn refresh(&mut self) {
        if self.is_frozen() || self.status != CameraStatus::Streaming {
            return;
        }

        match self.source.grab() {
            Ok(frame) => {
                let frame = Arc::new(frame);
                self.last_frame = Some(frame.clone());
                self.feed.send_replace(Some(frame));
            }
            Err(e) => warn!("Failed to capture preview frame: {}", e),
        }
    }

    /// Freezes the current frame. Returns `Ok(false)` without touching state when there is no live stream.
    pub fn capture(&mut self) -> Result<bool> {
        if !self.can_capture() {
            debug!("capture ignored: no active stream");
            return Ok(false);
        }

        let frame = match self.source.grab() {
            Ok(frame) => Arc::new(frame),
            Err(e) => match self.last_frame.clone() {
                Some(frame) => {
                    warn!("Using last preview frame, grab failed: {}", e);
                    frame
                }
                None => return Err(e),
            },
        };

        let encoded = encode_jpeg(&frame, self.jpeg_quality)?;
        info!(bytes = encoded.as_str().len(), "frame captured");

        self.frame_image = Some(encoded);
        self.frozen_frame = Some(frame);
        self.detected = false;
        self.captured_at = Some(chrono::Local::now());
        self.feed.send_replace(None);
        Ok(true)
    }

    /// Drops the frozen frame and goes back to the live feed. No-op when not frozen.
    pub fn retake(&mut self) -> bool {
        if !self.is_frozen() {
            return false;
        }

        self.frame_image = None;
        self.frozen_frame = None;
        self.detected = false;
        self.captured_at = None;
        if let Some(frame) = &self.last_frame {
            self.feed.send_replace(Some(frame.clone()));
        }
        true
    }

    /// Records a successful detection for the frozen frame
    pub fn mark_detected(&mut self) {
        if self.is_frozen() {
            self.detected = true;
        }
    }

    /// Writes the frozen frame to `dir` as a uniquely named JPEG
    pub fn export_snapshot(&self, dir: &Path) -> Result<PathBuf> {
        let image = self
            .frame_image
            .as_ref()
            .ok_or_else(|| MoodSyncError::InvalidInput("nothing captured yet".to_string()))?;

        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("snapshot_{}.jpg", uuid::Uuid::new_v4()));
        std::fs::write(&path, image.to_bytes()?)?;
        info!(path = %path.display(), "snapshot saved");
        Ok(path)
    }

    /// Releases the camera. Only the first call does anything.
    pub fn teardown(&mut self) {
        if self.released {
            debug!("capture session already torn down");
            return;
        }

        self.released = true;
        self.source.release();
        self.status = CameraStatus::Released;
        self.feed.send_replace(None);
        info!("capture session torn down, camera released");
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl<S: FrameSource> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Encodes a frame as JPEG and wraps it in a data URI
pub fn encode_jpeg(frame: &DynamicImage, quality: u8) -> Result<EncodedImage> {
    let rgb = frame.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100)).encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ColorType::Rgb8,
    )?;
    Ok(EncodedImage::from_jpeg_bytes(&bytes))
}
