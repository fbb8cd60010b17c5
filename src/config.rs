// src/config.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client settings, stored as JSON in the platform config directory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the MoodSync server, without a trailing slash
    pub server_url: String,
    pub detect_path: String,
    pub rate_path: String,
    pub save_mood_path: String,
    /// Anti-forgery token sent as `X-CSRF-Token` with ratings
    pub csrf_token: Option<String>,
    /// Value of the server's `session` cookie, if logged in
    pub session_cookie: Option<String>,
    pub camera_index: u32,
    /// JPEG quality for captured frames (1-100)
    pub jpeg_quality: u8,
    pub live_detection: bool,
    pub live_poll_interval_ms: u64,
    pub request_timeout_secs: u64,
    /// Directory holding one `<chart-id>.json` blob per analytics chart
    pub chart_data_dir: PathBuf,
    pub preferences_path: PathBuf,
    pub snapshot_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let dirs = directories::ProjectDirs::from("com", "MoodSync", "MoodSync");
        let data_dir = dirs
            .as_ref()
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("./data"));
        let config_dir = dirs
            .as_ref()
            .map(|d| d.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            server_url: "http://127.0.0.1:5000".to_string(),
            detect_path: "/api/detect-emotion".to_string(),
            rate_path: "/rate_suggestion".to_string(),
            save_mood_path: "/save_mood".to_string(),
            csrf_token: None,
            session_cookie: None,
            camera_index: 0,
            jpeg_quality: 92,
            live_detection: true,
            live_poll_interval_ms: 2000,
            request_timeout_secs: 10,
            chart_data_dir: data_dir.join("analytics"),
            preferences_path: config_dir.join("preferences.json"),
            snapshot_dir: directories::UserDirs::new()
                .and_then(|dirs| dirs.picture_dir().map(|p| p.join("MoodSync")))
                .unwrap_or_else(|| data_dir.join("snapshots")),
        }
    }
}

impl ClientConfig {
    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "MoodSync", "MoodSync")
            .map(|d| d.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("moodsync.json"))
    }

    /// Loads the config at `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            anyhow::bail!("jpeg_quality must be between 1 and 100, got {}", self.jpeg_quality);
        }
        if self.live_poll_interval_ms == 0 {
            anyhow::bail!("live_poll_interval_ms must be greater than zero");
        }
        reqwest::Url::parse(&self.server_url)
            .with_context(|| format!("Invalid server_url '{}'", self.server_url))?;
        Ok(())
    }

    /// Joins an endpoint path onto the server URL
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.server_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.live_poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
