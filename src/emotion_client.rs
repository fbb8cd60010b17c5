// src/emotion_client.rs - One-shot and live emotion detection
use crate::api::ApiClient;
use crate::capture::{encode_jpeg, LiveFeed};
use crate::error::{MoodSyncError, Result};
use crate::models::{DetectionResult, EncodedImage};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Something that turns an image into an emotion label
pub trait Classify: Send + Sync + 'static {
    fn classify(&self, image: EncodedImage)
        -> impl Future<Output = Result<DetectionResult>> + Send;
}

impl Classify for ApiClient {
    fn classify(
        &self,
        image: EncodedImage,
    ) -> impl Future<Output = Result<DetectionResult>> + Send {
        async move { self.detect_emotion(&image).await }
    }
}

/// Callback receiving each live classification
pub type LiveSink = Arc<dyn Fn(DetectionResult) + Send + Sync>;

pub struct EmotionClient<C: Classify = ApiClient> {
    classifier: Arc<C>,
    runtime: Handle,
    jpeg_quality: u8,
}

impl<C: Classify> EmotionClient<C> {
    pub fn new(classifier: C, runtime: Handle, jpeg_quality: u8) -> Self {
        Self {
            classifier: Arc::new(classifier),
            runtime,
            jpeg_quality,
        }
    }

    /// Classifies a captured frame. One request; the caller decides what to do on failure.
    pub async fn detect_once(&self, image: &EncodedImage) -> Result<DetectionResult> {
        if image.is_empty() {
            return Err(MoodSyncError::EmptyImage);
        }

        let started = std::time::Instant::now();
        let result = self.classifier.classify(image.clone()).await;
        match &result {
            Ok(detection) => info!(
                emotion = %detection.emotion_label,
                confidence = detection.confidence,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "emotion detected"
            ),
            Err(e) => warn!("Emotion detection failed: {}", e),
        }
        result
    }

    /// Starts classifying the live feed every `interval`. Stop it through the returned handle.
    pub fn start_live_polling(
        &self,
        feed: LiveFeed,
        interval: Duration,
        on_result: LiveSink,
    ) -> LivePoller {
        LivePoller::start(
            &self.runtime,
            self.classifier.clone(),
            feed,
            interval,
            self.jpeg_quality,
            on_result,
        )
    }
}

impl<C: Classify> Clone for EmotionClient<C> {
    fn clone(&self) -> Self {
        Self {
            classifier: self.classifier.clone(),
            runtime: self.runtime.clone(),
            jpeg_quality: self.jpeg_quality,
        }
    }
}

/// Handle to a running live-detection loop. Dropping it stops the loop.
pub struct LivePoller {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl LivePoller {
    fn start<C: Classify>(
        runtime: &Handle,
        classifier: Arc<C>,
        mut feed: LiveFeed,
        interval: Duration,
        jpeg_quality: u8,
        on_result: LiveSink,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let spawner = runtime.clone();

        let task = runtime.spawn(async move {
            info!(interval_ms = interval.as_millis() as u64, "live detection started");

            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut cycle = 0u64;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let frame = feed.borrow_and_update().clone();
                        let Some(frame) = frame else {
                            debug!("live feed hidden, skipping cycle");
                            continue;
                        };
                        cycle += 1;

                        // Each cycle runs on its own; a slow request never holds up the next one
                        let classifier = classifier.clone();
                        let on_result = on_result.clone();
                        spawner.spawn(async move {
                            let image = match encode_jpeg(&frame, jpeg_quality) {
                                Ok(image) => image,
                                Err(e) => {
                                    warn!(cycle, "Failed to encode live frame: {}", e);
                                    return;
                                }
                            };
                            match classifier.classify(image).await {
                                Ok(result) => on_result(result),
                                Err(e) => warn!(cycle, "Live detection request failed: {}", e),
                            }
                        });
                    }
                }
            }

            info!(cycles = cycle, "live detection stopped");
        });

        Self { cancel, task }
    }

    /// Stops issuing new requests. Requests already in flight are left to finish.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for LivePoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::watch;

    struct FakeClassifier {
        label: &'static str,
        delay: Duration,
        fail_with: Option<&'static str>,
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    impl FakeClassifier {
        fn new(label: &'static str) -> Self {
            Self {
                label,
                delay: Duration::ZERO,
                fail_with: None,
                started: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
            }
        }
    }

    impl Classify for FakeClassifier {
        fn classify(
            &self,
            _image: EncodedImage,
        ) -> impl Future<Output = Result<DetectionResult>> + Send {
            async move {
                self.started.fetch_add(1, Ordering::SeqCst);
                if !self.delay.is_zero() {
                    time::sleep(self.delay).await;
                }
                self.finished.fetch_add(1, Ordering::SeqCst);
                match self.fail_with {
                    Some(error) => Err(MoodSyncError::Server(error.to_string())),
                    None => Ok(DetectionResult::new(self.label, 0.8)),
                }
            }
        }
    }

    fn frame() -> Arc<DynamicImage> {
        Arc::new(DynamicImage::ImageRgb8(ImageBuffer::from_pixel(
            4,
            4,
            image::Rgb([10, 20, 30]),
        )))
    }

    fn collecting_sink() -> (LiveSink, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink: LiveSink = Arc::new(move |result: DetectionResult| {
            sink_seen.lock().unwrap().push(result.emotion_label);
        });
        (sink, seen)
    }

    #[tokio::test]
    async fn detect_once_rejects_empty_image() {
        let client = EmotionClient::new(FakeClassifier::new("Happy"), Handle::current(), 90);
        let err = client
            .detect_once(&EncodedImage::from_jpeg_bytes(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, MoodSyncError::EmptyImage));
        assert_eq!(client.classifier.started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn detect_once_reports_failures_without_retry() {
        let mut classifier = FakeClassifier::new("Happy");
        classifier.fail_with = Some("model unavailable");
        let client = EmotionClient::new(classifier, Handle::current(), 90);

        let err = client
            .detect_once(&EncodedImage::from_jpeg_bytes(&[1, 2, 3]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "model unavailable");
        assert_eq!(client.classifier.started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn live_polling_reports_labels_until_stopped() {
        let client = EmotionClient::new(FakeClassifier::new("Sad"), Handle::current(), 90);
        let (tx, rx) = watch::channel(Some(frame()));
        let (sink, seen) = collecting_sink();

        let poller = client.start_live_polling(rx, Duration::from_millis(10), sink);
        time::sleep(Duration::from_millis(120)).await;
        assert!(poller.is_running());

        poller.stop();
        time::sleep(Duration::from_millis(30)).await;
        assert!(!poller.is_running());

        let after_stop = client.classifier.started.load(Ordering::SeqCst);
        assert!(after_stop >= 2, "expected several cycles, got {after_stop}");
        time::sleep(Duration::from_millis(60)).await;
        assert_eq!(client.classifier.started.load(Ordering::SeqCst), after_stop);

        let seen = seen.lock().unwrap();
        assert!(seen.iter().all(|label| label == "Sad"));
        assert!(!seen.is_empty());
        drop(tx);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn hidden_feed_sends_nothing() {
        let client = EmotionClient::new(FakeClassifier::new("Happy"), Handle::current(), 90);
        let (_tx, rx) = watch::channel(None);
        let (sink, seen) = collecting_sink();

        let _poller = client.start_live_polling(rx, Duration::from_millis(10), sink);
        time::sleep(Duration::from_millis(80)).await;

        assert_eq!(client.classifier.started.load(Ordering::SeqCst), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn slow_requests_overlap() {
        let mut classifier = FakeClassifier::new("Fear");
        classifier.delay = Duration::from_millis(200);
        let client = EmotionClient::new(classifier, Handle::current(), 90);
        let (_tx, rx) = watch::channel(Some(frame()));
        let (sink, _seen) = collecting_sink();

        let poller = client.start_live_polling(rx, Duration::from_millis(10), sink);
        time::sleep(Duration::from_millis(80)).await;
        poller.stop();

        let started = client.classifier.started.load(Ordering::SeqCst);
        let finished = client.classifier.finished.load(Ordering::SeqCst);
        assert!(started >= 2, "expected overlapping requests, got {started}");
        assert_eq!(finished, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropping_the_handle_stops_polling() {
        let client = EmotionClient::new(FakeClassifier::new("Happy"), Handle::current(), 90);
        let (_tx, rx) = watch::channel(Some(frame()));
        let (sink, _seen) = collecting_sink();

        drop(client.start_live_polling(rx, Duration::from_millis(10), sink));
        time::sleep(Duration::from_millis(60)).await;
        assert_eq!(client.classifier.started.load(Ordering::SeqCst), 0);
    }
}
