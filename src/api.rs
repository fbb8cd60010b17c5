// src/api.rs - HTTP calls to the MoodSync server
use crate::config::ClientConfig;
use crate::effects::validate_rating;
use crate::error::{MoodSyncError, Result};
use crate::form::MoodSubmission;
use crate::models::{DetectionResult, EncodedImage};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

const CSRF_HEADER: &str = "X-CSRF-Token";

#[derive(Debug, Deserialize)]
struct DetectResponse {
    success: Option<bool>,
    emotion: Option<String>,
    confidence: Option<f64>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    success: bool,
    message: Option<String>,
    error: Option<String>,
}

/// Thin client for the classification, rating and save-mood endpoints
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_builder(config, Client::builder())
    }

    fn with_builder(config: &ClientConfig, builder: ClientBuilder) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.session_cookie {
            let value = HeaderValue::from_str(&format!("session={cookie}"))
                .map_err(|e| MoodSyncError::InvalidInput(format!("session cookie: {e}")))?;
            headers.insert(COOKIE, value);
        }

        let http = builder
            .timeout(config.request_timeout())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    /// Sends one frame to the classifier. Single attempt, no retry.
    pub async fn detect_emotion(&self, image: &EncodedImage) -> Result<DetectionResult> {
        if image.is_empty() {
            return Err(MoodSyncError::EmptyImage);
        }

        let body = json!({ "image": image.as_str() });
        let (status, text) = self.post_json(&self.config.detect_path, &body, false).await?;
        parse_detection(status, &text)
    }

    /// Stores a 1-5 star rating for a suggestion
    pub async fn rate_suggestion(&self, suggestion_id: &str, rating: u8) -> Result<()> {
        validate_rating(rating)?;

        let body = json!({ "suggestion_id": suggestion_id, "rating": rating });
        let (status, text) = self.post_json(&self.config.rate_path, &body, true).await?;
        parse_status(status, &text, "rating was not saved").map(|_| ())
    }

    /// Submits a finished mood entry; returns the server's confirmation message
    pub async fn save_mood(&self, submission: &MoodSubmission) -> Result<String> {
        let (status, text) = self
            .post_json(&self.config.save_mood_path, submission, true)
            .await?;
        parse_status(status, &text, "mood entry was not saved")
            .map(|message| message.unwrap_or_else(|| "Mood entry saved".to_string()))
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        with_csrf: bool,
    ) -> Result<(u16, String)> {
        let url = self.config.endpoint(path);
        let mut request = self.http.post(&url).json(body);

        if with_csrf {
            if let Some(token) = &self.config.csrf_token {
                request = request.header(CSRF_HEADER, token);
            }
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        debug!(url = %url, status, bytes = text.len(), "server responded");
        Ok((status, text))
    }
}

/// Turns a classification response into a result, whatever the HTTP status
pub fn parse_detection(status: u16, body: &str) -> Result<DetectionResult> {
    let parsed: DetectResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) if is_success(status) => return Err(MoodSyncError::BadResponse(e.to_string())),
        Err(_) => return Err(MoodSyncError::Server(format!("server returned {status}"))),
    };

    if parsed.success == Some(false) || !is_success(status) {
        let message = parsed
            .error
            .unwrap_or_else(|| format!("server returned {status}"));
        return Err(MoodSyncError::Server(message));
    }

    match parsed.emotion {
        Some(emotion) if !emotion.is_empty() => {
            let confidence = parsed.confidence.unwrap_or_else(|| {
                warn!("classification response has no confidence, using 0");
                0.0
            });
            Ok(DetectionResult::new(emotion, confidence))
        }
        _ => Err(match parsed.error {
            Some(error) => MoodSyncError::Server(error),
            None => MoodSyncError::BadResponse("response has no emotion".to_string()),
        }),
    }
}

/// Parses `{success, message}` / `{error}` replies
fn parse_status(status: u16, body: &str, fallback: &str) -> Result<Option<String>> {
    let parsed: StatusResponse = serde_json::from_str(body).map_err(|e| {
        if is_success(status) {
            MoodSyncError::BadResponse(e.to_string())
        } else {
            MoodSyncError::Server(format!("server returned {status}"))
        }
    })?;

    if let Some(error) = parsed.error {
        return Err(MoodSyncError::Server(error));
    }
    if !is_success(status) || !parsed.success {
        return Err(MoodSyncError::Server(fallback.to_string()));
    }
    Ok(parsed.message)
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// What the local server saw: lowercased request head and the raw body
    struct Captured {
        head: String,
        body: serde_json::Value,
    }

    /// Answers exactly one request with `status` and `reply`, and hands back what it received
    async fn serve_once(
        status: &'static str,
        reply: &'static str,
    ) -> (ClientConfig, oneshot::Receiver<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];

            let (head, body) = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "client closed the connection early");
                buf.extend_from_slice(&chunk[..n]);

                let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                    continue;
                };
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .map(|value| value.trim().parse::<usize>().unwrap())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break (head, buf[end + 4..end + 4 + length].to_vec());
                }
            };

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{reply}",
                reply.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            let _ = tx.send(Captured {
                head,
                body: serde_json::from_slice(&body).unwrap(),
            });
        });

        let config = ClientConfig {
            server_url: format!("http://{addr}"),
            session_cookie: Some("abc123".to_string()),
            csrf_token: Some("tok-42".to_string()),
            ..ClientConfig::default()
        };
        (config, rx)
    }

    fn local_client(config: &ClientConfig) -> ApiClient {
        ApiClient::with_builder(config, Client::builder().no_proxy()).unwrap()
    }

    fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
        head.lines()
            .find_map(|line| line.strip_prefix(name)?.strip_prefix(':'))
            .map(str::trim)
    }

    #[test]
    fn successful_detection() {
        let result =
            parse_detection(200, r#"{"success": true, "emotion": "Happy", "confidence": 0.92}"#)
                .unwrap();
        assert_eq!(result.emotion_label, "Happy");
        assert_eq!(result.confidence, 0.92);
    }

    #[test]
    fn application_failure_carries_server_text() {
        let err = parse_detection(200, r#"{"success": false, "error": "model unavailable"}"#)
            .unwrap_err();
        assert!(matches!(err, MoodSyncError::Server(ref msg) if msg == "model unavailable"));

        let err = parse_detection(400, r#"{"success": false, "error": "No face detected"}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "No face detected");
    }

    #[test]
    fn bare_error_body_and_non_json_body() {
        let err = parse_detection(500, r#"{"error": "boom"}"#).unwrap_err();
        assert_eq!(err.to_string(), "boom");

        let err = parse_detection(502, "<html>Bad Gateway</html>").unwrap_err();
        assert_eq!(err.to_string(), "server returned 502");

        let err = parse_detection(200, "not json").unwrap_err();
        assert!(matches!(err, MoodSyncError::BadResponse(_)));
    }

    #[test]
    fn success_without_emotion_is_rejected() {
        let err = parse_detection(200, r#"{"success": true}"#).unwrap_err();
        assert!(matches!(err, MoodSyncError::BadResponse(_)));
    }

    #[test]
    fn status_replies() {
        assert_eq!(
            parse_status(200, r#"{"success": true, "message": "saved"}"#, "x").unwrap(),
            Some("saved".to_string())
        );
        assert_eq!(
            parse_status(200, r#"{"success": false}"#, "not saved")
                .unwrap_err()
                .to_string(),
            "not saved"
        );
        assert_eq!(
            parse_status(401, r#"{"error": "Authentication required"}"#, "x")
                .unwrap_err()
                .to_string(),
            "Authentication required"
        );
    }

    #[tokio::test]
    async fn empty_image_is_rejected_before_sending() {
        let client = ApiClient::new(&ClientConfig::default()).unwrap();
        let err = client
            .detect_emotion(&EncodedImage::from_jpeg_bytes(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, MoodSyncError::EmptyImage));
    }

    #[tokio::test]
    async fn out_of_range_rating_is_rejected_locally() {
        let client = ApiClient::new(&ClientConfig::default()).unwrap();
        assert!(matches!(
            client.rate_suggestion("3", 0).await,
            Err(MoodSyncError::InvalidInput(_))
        ));
        assert!(matches!(
            client.rate_suggestion("3", 6).await,
            Err(MoodSyncError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn detect_posts_only_the_image_with_the_session_cookie() {
        let (config, seen) = serve_once(
            "200 OK",
            r#"{"success": true, "emotion": "Happy", "confidence": 0.92}"#,
        )
        .await;
        let image = EncodedImage::from_jpeg_bytes(&[0xFF, 0xD8, 0xFF]);

        let result = local_client(&config).detect_emotion(&image).await.unwrap();
        assert_eq!(result, DetectionResult::new("Happy", 0.92));

        let seen = seen.await.unwrap();
        assert!(seen.head.starts_with("post /api/detect-emotion http/1.1"));
        assert_eq!(header(&seen.head, "content-type"), Some("application/json"));
        assert_eq!(header(&seen.head, "cookie"), Some("session=abc123"));
        assert_eq!(header(&seen.head, "x-csrf-token"), None);
        assert_eq!(seen.body, json!({ "image": image.as_str() }));
    }

    #[tokio::test]
    async fn detect_surfaces_the_server_error_text() {
        let (config, seen) =
            serve_once("400 Bad Request", r#"{"success": false, "error": "No face detected"}"#)
                .await;

        let err = local_client(&config)
            .detect_emotion(&EncodedImage::from_jpeg_bytes(&[1, 2, 3]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No face detected");
        seen.await.unwrap();
    }

    #[tokio::test]
    async fn rating_carries_the_csrf_token() {
        let (config, seen) = serve_once("200 OK", r#"{"success": true}"#).await;

        local_client(&config).rate_suggestion("7", 4).await.unwrap();

        let seen = seen.await.unwrap();
        assert!(seen.head.starts_with("post /rate_suggestion http/1.1"));
        assert_eq!(header(&seen.head, "x-csrf-token"), Some("tok-42"));
        assert_eq!(header(&seen.head, "cookie"), Some("session=abc123"));
        assert_eq!(seen.body, json!({ "suggestion_id": "7", "rating": 4 }));
    }

    #[tokio::test]
    async fn save_mood_sends_the_entry_and_returns_the_message() {
        let (config, seen) =
            serve_once("200 OK", r#"{"success": true, "message": "Mood logged"}"#).await;
        let submission = MoodSubmission {
            emotion: "Calm".to_string(),
            confidence: 0.0,
            intensity: 6,
            notes: "after a walk".to_string(),
            manual_mood: Some("Calm".to_string()),
            context: Some("Exercise".to_string()),
            image: None,
            captured_at: None,
        };

        let message = local_client(&config).save_mood(&submission).await.unwrap();
        assert_eq!(message, "Mood logged");

        let seen = seen.await.unwrap();
        assert!(seen.head.starts_with("post /save_mood http/1.1"));
        assert_eq!(header(&seen.head, "x-csrf-token"), Some("tok-42"));
        assert_eq!(header(&seen.head, "cookie"), Some("session=abc123"));
        assert_eq!(
            seen.body,
            json!({
                "emotion": "Calm",
                "confidence": 0.0,
                "intensity": 6,
                "notes": "after a walk",
                "manual_mood": "Calm",
                "context": "Exercise"
            })
        );
    }
}
