// src/main.rs
use anyhow::Context;
use eframe::egui;
use moodsync_client::app::MoodSyncApp;
use moodsync_client::capture::NokhwaCamera;
use moodsync_client::config::ClientConfig;
use std::path::PathBuf;
use tracing::{info, warn};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(ClientConfig::default_path);
    let config = ClientConfig::load(&config_path)
        .with_context(|| format!("Could not load settings from {}", config_path.display()))?;
    info!(path = %config_path.display(), server = %config.server_url, "configuration loaded");

    match NokhwaCamera::list_devices() {
        Ok(cameras) => {
            info!("Found {} camera(s)", cameras.len());
            for (i, name) in cameras.iter().enumerate() {
                info!("  [{}] {}", i, name);
            }
        }
        Err(e) => warn!("Failed to query cameras: {}", e),
    }

    let app = MoodSyncApp::new(config, config_path).context("Failed to start MoodSync")?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([960.0, 640.0]),
        centered: true,
        ..Default::default()
    };

    eframe::run_native(
        "MoodSync",
        options,
        Box::new(move |cc| {
            app.setup(&cc.egui_ctx);
            Box::new(app)
        }),
    )
    .map_err(|e| anyhow::anyhow!("Error running application: {e}"))
}
