// src/logger.rs - The mood logger workflow: capture, detect, fill the form
use crate::capture::{CameraStatus, CaptureSession, FrameSource, LiveFeed};
use crate::emotion_client::{Classify, EmotionClient, LivePoller, LiveSink};
use crate::error::{MoodSyncError, Result};
use crate::form::{EntryDraft, FormBridge, MoodSubmission};
use crate::models::{CaptureState, DetectionResult, EncodedImage};
use crate::notify::Notices;
use crate::page::{Element, Hook, Page};
use std::time::Duration;
use tracing::{info, warn};

const LIVE_PLACEHOLDER: &str = "Detecting...";

/// Ties the capture session to its page. Every transition checks its precondition first.
pub struct MoodLogger<S: FrameSource> {
    session: CaptureSession<S>,
    page: Page,
    pub notices: Notices,
    detecting: bool,
    poller: Option<LivePoller>,
}

impl<S: FrameSource> MoodLogger<S> {
    pub fn new(session: CaptureSession<S>, page: Page) -> Self {
        Self {
            session,
            page,
            notices: Notices::default(),
            detecting: false,
            poller: None,
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn session(&self) -> &CaptureSession<S> {
        &self.session
    }

    pub fn state(&self) -> CaptureState {
        self.session.state()
    }

    /// Asks for the camera and enables capture if it was granted
    pub fn start_camera(&mut self) {
        let granted = match self.session.start() {
            Ok(()) => true,
            Err(e) => {
                let message = match &e {
                    MoodSyncError::CameraUnavailable => {
                        "Your system does not provide camera access.".to_string()
                    }
                    other => format!("Error accessing webcam: {other}"),
                };
                self.notices.error(message);
                false
            }
        };

        self.page
            .update_control(Hook::CaptureButton, |c| c.enabled = granted);
    }

    pub fn camera_error(&self) -> Option<&str> {
        match self.session.status() {
            CameraStatus::Unavailable(reason) => Some(reason.as_str()),
            _ => None,
        }
    }

    pub fn refresh(&mut self) {
        self.session.refresh();
    }

    pub fn live_feed(&self) -> LiveFeed {
        self.session.subscribe_feed()
    }

    /// Freezes the current frame and swaps capture for retake/detect
    pub fn capture(&mut self) {
        match self.session.capture() {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                warn!("Capture failed: {}", e);
                self.notices.error(format!("Could not capture image: {e}"));
                return;
            }
        }

        if let Some(image) = self.session.frame_image() {
            FormBridge::write_capture(&mut self.page, image);
        }
        self.page
            .update_control(Hook::CaptureButton, |c| c.visible = false);
        self.page
            .update_control(Hook::RetakeButton, |c| c.visible = true);
        self.page
            .update_control(Hook::DetectButton, |c| c.visible = true);
        self.notices
            .success("Image captured successfully! Would you like to detect emotions?");
    }

    /// Back to the live feed with the original controls
    pub fn retake(&mut self) {
        if !self.session.retake() {
            return;
        }

        FormBridge::clear_capture(&mut self.page);
        self.page
            .update_control(Hook::CaptureButton, |c| c.visible = true);
        self.page
            .update_control(Hook::RetakeButton, |c| c.visible = false);
        self.page
            .update_control(Hook::DetectButton, |c| c.visible = false);
    }

    /// Returns the image to classify and marks the detect button busy, or `None` if detection can't start
    pub fn begin_detection(&mut self) -> Option<EncodedImage> {
        if self.detecting {
            return None;
        }

        let Some(image) = self.session.frame_image().cloned() else {
            self.notices.warning("Please capture an image first.");
            return None;
        };

        self.detecting = true;
        self.page.update_control(Hook::DetectButton, |c| {
            c.busy = true;
            c.enabled = false;
        });
        Some(image)
    }

    /// Applies the outcome of a one-shot detection. Failures leave the form untouched.
    pub fn finish_detection(&mut self, outcome: Result<DetectionResult>) {
        self.detecting = false;
        self.page.update_control(Hook::DetectButton, |c| {
            c.busy = false;
            c.enabled = true;
        });

        match outcome {
            Ok(result) => {
                info!(emotion = %result.emotion_label, "detection applied to form");
                FormBridge::write_detection(&mut self.page, &result);
                self.session.mark_detected();
            }
            Err(e) => {
                self.notices.error(format!("Error detecting emotion: {e}"));
            }
        }
    }

    /// Creates the live status display
    pub fn show_live_display(&mut self) {
        if !self.page.has(Hook::LiveEmotionText) {
            self.page
                .insert(Hook::LiveEmotionText, Element::Text(LIVE_PLACEHOLDER.to_string()));
        }
    }

    pub fn hide_live_display(&mut self) {
        self.page.remove(Hook::LiveEmotionText);
    }

    /// Shows the latest live label; ignored once the display is gone
    pub fn apply_live(&mut self, result: &DetectionResult) {
        self.page
            .set_text(Hook::LiveEmotionText, result.emotion_label.as_str());
    }

    /// Fills the emotion field with a hand-picked emotion; works with or without a camera
    pub fn select_emotion(&mut self, emotion: &str) {
        info!(emotion, "emotion picked by hand");
        FormBridge::select_emotion(&mut self.page, emotion);
    }

    /// Clears the saved entry: back to live with empty emotion fields
    pub fn reset_entry(&mut self) {
        self.retake();
        FormBridge::clear_detection(&mut self.page);
    }

    pub fn is_live(&self) -> bool {
        self.poller.is_some()
    }

    /// Starts live detection on the session's feed and shows its display
    pub fn start_live<C: Classify>(
        &mut self,
        client: &EmotionClient<C>,
        interval: Duration,
        sink: LiveSink,
    ) {
        if self.poller.is_some() {
            return;
        }

        self.show_live_display();
        self.poller = Some(client.start_live_polling(self.live_feed(), interval, sink));
    }

    pub fn stop_live(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
        self.hide_live_display();
    }

    /// Moves running live detection onto `client`. Nothing happens when live detection is off.
    pub fn restart_live<C: Classify>(
        &mut self,
        client: &EmotionClient<C>,
        interval: Duration,
        sink: LiveSink,
    ) {
        if self.poller.is_none() {
            return;
        }

        self.stop_live();
        self.start_live(client, interval, sink);
    }

    pub fn submission(&self, draft: &EntryDraft) -> Result<MoodSubmission> {
        FormBridge::submission(&self.page, draft, self.session.captured_at())
    }

    pub fn export_snapshot(&mut self, dir: &std::path::Path) {
        match self.session.export_snapshot(dir) {
            Ok(path) => self
                .notices
                .success(format!("Snapshot saved to {}", path.display())),
            Err(e) => self.notices.error(format!("Could not save snapshot: {e}")),
        }
    }

    pub fn teardown(&mut self) {
        self.stop_live();
        self.session.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::tests::FakeCamera;
    use crate::notify::NoticeLevel;
    use crate::page::Control;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::runtime::Handle;

    struct CountingClassifier(Arc<AtomicUsize>);

    impl Classify for CountingClassifier {
        fn classify(
            &self,
            _image: EncodedImage,
        ) -> impl Future<Output = Result<DetectionResult>> + Send {
            self.0.fetch_add(1, Ordering::SeqCst);
            async { Ok(DetectionResult::new("Calm", 0.5)) }
        }
    }

    fn counting_client() -> (EmotionClient<CountingClassifier>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = EmotionClient::new(
            CountingClassifier(calls.clone()),
            Handle::current(),
            90,
        );
        (client, calls)
    }

    fn logger() -> MoodLogger<FakeCamera> {
        MoodLogger::new(CaptureSession::new(FakeCamera::new(), 90), Page::mood_logger())
    }

    fn controls(logger: &MoodLogger<FakeCamera>) -> Vec<Control> {
        [Hook::CaptureButton, Hook::RetakeButton, Hook::DetectButton]
            .iter()
            .map(|hook| logger.page().control(*hook).unwrap().clone())
            .collect()
    }

    #[test]
    fn capture_without_camera_changes_nothing() {
        let mut logger = logger();
        let before = controls(&logger);

        logger.capture();

        assert_eq!(controls(&logger), before);
        assert_eq!(logger.page().field(Hook::CapturedImageField), Some(""));
        assert!(logger.notices.is_empty());
    }

    #[test]
    fn denied_camera_keeps_capture_disabled_and_says_why() {
        let mut camera = FakeCamera::new();
        camera.fail_open = Some(MoodSyncError::CameraAccessDenied("NotAllowedError".into()));
        let mut logger = MoodLogger::new(CaptureSession::new(camera, 90), Page::mood_logger());

        logger.start_camera();

        assert!(!logger.page().control(Hook::CaptureButton).unwrap().enabled);
        let notice = logger.notices.last().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.message.contains("NotAllowedError"));
        assert!(logger.camera_error().is_some());
    }

    #[test]
    fn missing_camera_has_its_own_message() {
        let mut camera = FakeCamera::new();
        camera.fail_open = Some(MoodSyncError::CameraUnavailable);
        let mut logger = MoodLogger::new(CaptureSession::new(camera, 90), Page::mood_logger());

        logger.start_camera();
        assert_eq!(
            logger.notices.last().unwrap().message,
            "Your system does not provide camera access."
        );
    }

    #[test]
    fn capture_then_retake_restores_controls() {
        let mut logger = logger();
        logger.start_camera();
        let before = controls(&logger);
        assert!(before[0].enabled);

        logger.capture();
        assert_eq!(logger.state(), CaptureState::Frozen);
        assert!(!logger.page().control(Hook::CaptureButton).unwrap().visible);
        assert!(logger.page().control(Hook::RetakeButton).unwrap().visible);
        assert!(logger.page().control(Hook::DetectButton).unwrap().visible);
        assert!(logger
            .page()
            .field(Hook::CapturedImageField)
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));

        logger.retake();
        assert_eq!(controls(&logger), before);
        assert_eq!(logger.page().field(Hook::CapturedImageField), Some(""));
        assert!(logger.session().frame_image().is_none());
    }

    #[test]
    fn detect_needs_a_capture() {
        let mut logger = logger();
        logger.start_camera();

        assert!(logger.begin_detection().is_none());
        assert_eq!(
            logger.notices.last().unwrap().message,
            "Please capture an image first."
        );
    }

    #[test]
    fn successful_detection_fills_form() {
        let mut logger = logger();
        logger.start_camera();
        logger.capture();

        let image = logger.begin_detection().unwrap();
        assert!(!image.is_empty());
        assert!(logger.page().control(Hook::DetectButton).unwrap().busy);
        assert!(logger.begin_detection().is_none());

        logger.finish_detection(Ok(DetectionResult::new("Happy", 0.92)));

        let page = logger.page();
        assert_eq!(page.field(Hook::EmotionField), Some("Happy"));
        assert_eq!(page.field(Hook::ConfidenceField), Some("0.92"));
        assert_eq!(page.text(Hook::DetectedEmotion), Some("Happy"));
        assert!(!page.control(Hook::DetectButton).unwrap().busy);
        assert_eq!(logger.state(), CaptureState::FrozenDetected);
    }

    #[test]
    fn failed_detection_leaves_fields_alone() {
        let mut logger = logger();
        logger.start_camera();
        logger.capture();
        logger.begin_detection().unwrap();
        logger.finish_detection(Ok(DetectionResult::new("Sad", 0.7)));

        logger.begin_detection().unwrap();
        logger.finish_detection(Err(MoodSyncError::Server("model unavailable".into())));

        let page = logger.page();
        assert_eq!(page.field(Hook::EmotionField), Some("Sad"));
        assert_eq!(page.field(Hook::ConfidenceField), Some("0.7"));
        assert!(page.control(Hook::DetectButton).unwrap().enabled);
        let notice = logger.notices.last().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.message, "Error detecting emotion: model unavailable");
    }

    #[test]
    fn failed_first_detection_mutates_nothing() {
        let mut logger = logger();
        logger.start_camera();
        logger.capture();
        logger.begin_detection().unwrap();
        logger.finish_detection(Err(MoodSyncError::Server("model unavailable".into())));

        assert_eq!(logger.page().field(Hook::EmotionField), Some(""));
        assert_eq!(logger.page().field(Hook::ConfidenceField), Some(""));
        assert!(!logger.page().panel_visible(Hook::EmotionDetails));
        assert_eq!(logger.state(), CaptureState::Frozen);
    }

    #[test]
    fn live_updates_need_the_display() {
        let mut logger = logger();
        logger.apply_live(&DetectionResult::new("Happy", 0.5));
        assert!(logger.page().text(Hook::LiveEmotionText).is_none());

        logger.show_live_display();
        assert_eq!(logger.page().text(Hook::LiveEmotionText), Some("Detecting..."));
        logger.apply_live(&DetectionResult::new("Happy", 0.5));
        logger.apply_live(&DetectionResult::new("Sad", 0.5));
        assert_eq!(logger.page().text(Hook::LiveEmotionText), Some("Sad"));

        // A response arriving after teardown finds no display
        logger.teardown();
        logger.apply_live(&DetectionResult::new("Angry", 0.5));
        assert!(logger.page().text(Hook::LiveEmotionText).is_none());
    }

    #[test]
    fn submission_carries_capture_time() {
        let mut logger = logger();
        logger.start_camera();
        logger.capture();
        logger.begin_detection().unwrap();
        logger.finish_detection(Ok(DetectionResult::new("Happy", 0.92)));

        let submission = logger.submission(&EntryDraft::default()).unwrap();
        assert_eq!(submission.emotion, "Happy");
        assert!(submission.captured_at.is_some());
        assert!(submission.image.is_some());
    }

    #[test]
    fn picked_emotion_works_without_a_camera() {
        let mut camera = FakeCamera::new();
        camera.fail_open = Some(MoodSyncError::CameraUnavailable);
        let mut logger = MoodLogger::new(CaptureSession::new(camera, 90), Page::mood_logger());
        logger.start_camera();

        logger.select_emotion("Tired");

        let draft = EntryDraft {
            manual_mood: Some("Tired".into()),
            ..EntryDraft::default()
        };
        let submission = logger.submission(&draft).unwrap();
        assert_eq!(submission.emotion, "Tired");
        assert_eq!(submission.confidence, 0.0);
        assert_eq!(submission.manual_mood.as_deref(), Some("Tired"));
        assert!(submission.image.is_none());
        assert!(submission.captured_at.is_none());
    }

    #[test]
    fn reset_after_save_clears_the_entry() {
        let mut logger = logger();
        logger.start_camera();
        logger.capture();
        logger.begin_detection().unwrap();
        logger.finish_detection(Ok(DetectionResult::new("Happy", 0.92)));

        logger.reset_entry();

        let page = logger.page();
        assert_eq!(logger.state(), CaptureState::Live);
        assert_eq!(page.field(Hook::CapturedImageField), Some(""));
        assert_eq!(page.field(Hook::EmotionField), Some(""));
        assert_eq!(page.field(Hook::ConfidenceField), Some(""));
        assert!(!page.panel_visible(Hook::EmotionDetails));
        assert!(logger.submission(&EntryDraft::default()).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn restart_moves_live_detection_to_the_new_client() {
        let mut logger = logger();
        logger.start_camera();
        let sink: LiveSink = Arc::new(|_result: DetectionResult| {});
        let (old_client, old_calls) = counting_client();
        let (new_client, new_calls) = counting_client();

        logger.start_live(&old_client, Duration::from_millis(20), sink.clone());
        logger.restart_live(&new_client, Duration::from_millis(20), sink.clone());
        assert!(logger.is_live());
        assert_eq!(logger.page().text(Hook::LiveEmotionText), Some("Detecting..."));

        logger.refresh();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(old_calls.load(Ordering::SeqCst), 0);
        assert!(new_calls.load(Ordering::SeqCst) > 0);

        logger.stop_live();
        assert!(!logger.is_live());
        assert!(logger.page().text(Hook::LiveEmotionText).is_none());
    }

    #[tokio::test]
    async fn restart_leaves_stopped_detection_off() {
        let mut logger = logger();
        logger.start_camera();
        let (client, calls) = counting_client();
        let sink: LiveSink = Arc::new(|_result: DetectionResult| {});

        logger.restart_live(&client, Duration::from_millis(20), sink);
        assert!(!logger.is_live());
        assert!(logger.page().text(Hook::LiveEmotionText).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
