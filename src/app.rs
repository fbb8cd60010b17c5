// src/app.rs
use crate::api::ApiClient;
use crate::capture::{CaptureSession, NokhwaCamera};
use crate::charts::{self, ChartKind, ChartPanel, EMOTIONS};
use crate::config::ClientConfig;
use crate::effects::{PreferenceStore, SuggestionBoard};
use crate::emotion_client::{EmotionClient, LiveSink};
use crate::error::Result;
use crate::form::{EntryDraft, CONTEXTS};
use crate::logger::MoodLogger;
use crate::models::DetectionResult;
use crate::page::{Hook, Page};
use crate::ui::{self, Theme, VideoWidget};

use eframe::egui;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

/// Results coming back from background requests
#[derive(Debug)]
pub enum AppEvent {
    Detected(Result<DetectionResult>),
    Live(DetectionResult),
    Saved(Result<String>),
    Rated {
        suggestion_id: String,
        previous: u8,
        outcome: Result<()>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum View {
    MoodLogger,
    Analytics,
    Suggestions,
}

pub struct MoodSyncApp {
    // Core components
    config: ClientConfig,
    config_path: PathBuf,
    runtime: Runtime,
    api: ApiClient,
    emotion: EmotionClient,
    logger: MoodLogger<NokhwaCamera>,
    events_tx: UnboundedSender<AppEvent>,
    events_rx: UnboundedReceiver<AppEvent>,

    // UI State
    view: View,
    theme: Theme,
    preferences: PreferenceStore,
    video: VideoWidget,
    last_frame: Option<usize>,
    show_settings: bool,
    show_about: bool,
    settings_draft: ClientConfig,

    // Mood entry
    draft: EntryDraft,
    saving: bool,

    // Analytics and suggestions
    charts: Vec<(ChartKind, ChartPanel)>,
    suggestions: SuggestionBoard,
}

impl MoodSyncApp {
    pub fn new(config: ClientConfig, config_path: PathBuf) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("moodsync-net")
            .enable_all()
            .build()?;

        let api = ApiClient::new(&config)?;
        let emotion = EmotionClient::new(api.clone(), runtime.handle().clone(), config.jpeg_quality);

        let session = CaptureSession::new(NokhwaCamera::new(config.camera_index), config.jpeg_quality);
        let mut logger = MoodLogger::new(session, Page::mood_logger());
        logger.start_camera();

        let preferences = PreferenceStore::open(config.preferences_path.clone());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut app = Self {
            theme: Theme::for_preference(preferences.theme()),
            preferences,
            charts: charts::load_from_dir(&config.chart_data_dir),
            suggestions: SuggestionBoard::default(),
            settings_draft: config.clone(),
            config,
            config_path,
            runtime,
            api,
            emotion,
            logger,
            events_tx,
            events_rx,
            view: View::MoodLogger,
            video: VideoWidget::default(),
            last_frame: None,
            show_settings: false,
            show_about: false,
            draft: EntryDraft::default(),
            saving: false,
        };

        app.reload_suggestions();
        if app.config.live_detection && app.logger.session().can_capture() {
            app.start_live_detection();
        }
        Ok(app)
    }

    /// Applies the stored theme to a freshly created context
    pub fn setup(&self, ctx: &egui::Context) {
        ctx.set_visuals(self.theme.visuals());
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                AppEvent::Detected(outcome) => self.logger.finish_detection(outcome),
                AppEvent::Live(result) => self.logger.apply_live(&result),
                AppEvent::Saved(outcome) => {
                    self.saving = false;
                    match outcome {
                        Ok(message) => {
                            self.logger.notices.success(message);
                            self.draft = EntryDraft::default();
                            self.logger.reset_entry();
                        }
                        Err(e) => self.logger.notices.error(format!("Could not save mood: {e}")),
                    }
                }
                AppEvent::Rated {
                    suggestion_id,
                    previous,
                    outcome,
                } => match outcome {
                    Ok(()) => self.logger.notices.success("Rating saved successfully!"),
                    Err(e) => {
                        warn!("Error submitting rating: {}", e);
                        self.suggestions.restore(&suggestion_id, previous);
                        self.logger
                            .notices
                            .error("Error saving rating. Please try again.");
                    }
                },
            }
        }
    }

    fn live_sink(&self) -> LiveSink {
        let tx = self.events_tx.clone();
        Arc::new(move |result: DetectionResult| {
            // Closed channel means the app is gone
            let _ = tx.send(AppEvent::Live(result));
        })
    }

    fn start_live_detection(&mut self) {
        let sink = self.live_sink();
        self.logger
            .start_live(&self.emotion, self.config.poll_interval(), sink);
    }

    fn stop_live_detection(&mut self) {
        self.logger.stop_live();
    }

    fn select_emotion(&mut self, emotion: &str) {
        self.draft.manual_mood = Some(emotion.to_string());
        self.logger.select_emotion(emotion);
    }

    fn detect(&mut self) {
        let Some(image) = self.logger.begin_detection() else {
            return;
        };

        let emotion = self.emotion.clone();
        let tx = self.events_tx.clone();
        self.runtime.spawn(async move {
            let outcome = emotion.detect_once(&image).await;
            let _ = tx.send(AppEvent::Detected(outcome));
        });
    }

    fn save_mood(&mut self) {
        let submission = match self.logger.submission(&self.draft) {
            Ok(submission) => submission,
            Err(e) => {
                self.logger.notices.warning(e.to_string());
                return;
            }
        };

        self.saving = true;
        let api = self.api.clone();
        let tx = self.events_tx.clone();
        self.runtime.spawn(async move {
            let outcome = api.save_mood(&submission).await;
            let _ = tx.send(AppEvent::Saved(outcome));
        });
    }

    fn rate(&mut self, suggestion_id: String, rating: u8) {
        let previous = match self.suggestions.rate(&suggestion_id, rating) {
            Ok(previous) => previous,
            Err(e) => {
                self.logger.notices.error(e.to_string());
                return;
            }
        };

        let api = self.api.clone();
        let tx = self.events_tx.clone();
        self.runtime.spawn(async move {
            let outcome = api.rate_suggestion(&suggestion_id, rating).await;
            let _ = tx.send(AppEvent::Rated {
                suggestion_id,
                previous,
                outcome,
            });
        });
    }

    fn reload_charts(&mut self) {
        self.charts = charts::load_from_dir(&self.config.chart_data_dir);
        info!(dir = %self.config.chart_data_dir.display(), "analytics reloaded");
        self.logger.notices.info("Analytics reloaded");
    }

    fn reload_suggestions(&mut self) {
        match SuggestionBoard::load(&self.config.chart_data_dir) {
            Ok(board) => self.suggestions = board,
            Err(e) => {
                warn!("Could not load suggestions: {}", e);
                self.logger
                    .notices
                    .error(format!("Could not load suggestions: {e}"));
            }
        }
    }

    fn pick_data_dir(&mut self) {
        let Some(dir) = rfd::FileDialog::new()
            .set_directory(&self.config.chart_data_dir)
            .pick_folder()
        else {
            return;
        };

        self.config.chart_data_dir = dir;
        self.settings_draft.chart_data_dir = self.config.chart_data_dir.clone();
        if let Err(e) = self.config.save(&self.config_path) {
            warn!("Failed to save config: {:#}", e);
        }
        self.reload_charts();
        self.reload_suggestions();
    }

    fn toggle_theme(&mut self, ctx: &egui::Context) {
        match self.preferences.toggle_theme() {
            Ok(theme) => {
                self.theme = Theme::for_preference(theme);
                ctx.set_visuals(self.theme.visuals());
            }
            Err(e) => self
                .logger
                .notices
                .error(format!("Could not save theme: {e}")),
        }
    }

    fn apply_settings(&mut self) {
        let config = self.settings_draft.clone();
        if let Err(e) = config.validate() {
            self.logger.notices.error(format!("{e:#}"));
            return;
        }

        let api = match ApiClient::new(&config) {
            Ok(api) => api,
            Err(e) => {
                self.logger.notices.error(e.to_string());
                return;
            }
        };

        self.emotion = EmotionClient::new(
            api.clone(),
            self.runtime.handle().clone(),
            config.jpeg_quality,
        );
        self.api = api;
        self.config = config;

        if let Err(e) = self.config.save(&self.config_path) {
            warn!("Failed to save config: {:#}", e);
            self.logger
                .notices
                .warning("Settings applied but could not be saved");
        } else {
            self.logger.notices.success("Settings saved");
        }

        // Live detection keeps running, now against the new server settings
        let sink = self.live_sink();
        self.logger
            .restart_live(&self.emotion, self.config.poll_interval(), sink);
    }

    fn update_video(&mut self, ctx: &egui::Context) {
        self.logger.refresh();

        match self.logger.session().display_frame() {
            Some(frame) => {
                let key = Arc::as_ptr(frame) as usize;
                if self.last_frame != Some(key) {
                    self.video.update_frame(ctx, frame);
                    self.last_frame = Some(key);
                }
            }
            None => {
                self.video.clear();
                self.last_frame = None;
            }
        }
    }

    fn render_header(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(10.0);
            egui::menu::bar(ui, |ui| {
                ui.heading("MoodSync");
                ui.separator();

                ui.horizontal(|ui| {
                    ui.selectable_value(&mut self.view, View::MoodLogger, "📷 Mood Logger");
                    ui.selectable_value(&mut self.view, View::Analytics, "📊 Analytics");
                    ui.selectable_value(&mut self.view, View::Suggestions, "💡 Suggestions");
                });

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("⚙ Settings").clicked() {
                        self.show_settings = !self.show_settings;
                        self.settings_draft = self.config.clone();
                    }

                    if ui.button("ℹ About").clicked() {
                        self.show_about = !self.show_about;
                    }

                    let icon = if self.theme.dark { "☀ Light" } else { "🌙 Dark" };
                    if ui.button(icon).clicked() {
                        self.toggle_theme(ui.ctx());
                    }
                });
            });
            ui.add_space(10.0);
        });
    }

    fn render_main_content(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| match self.view {
                View::MoodLogger => self.render_mood_logger(ui),
                View::Analytics => self.render_analytics(ui),
                View::Suggestions => self.render_suggestions(ui),
            });
        });
    }

    fn render_mood_logger(&mut self, ui: &mut egui::Ui) {
        ui.columns(2, |columns| {
            columns[0].group(|ui| {
                ui.heading("Camera");
                let placeholder = self.logger.camera_error().unwrap_or("No Video Signal");
                self.video.show(ui, placeholder);
                ui.add_space(8.0);
                self.render_capture_controls(ui);
            });

            columns[1].vertical(|ui| {
                ui.group(|ui| {
                    ui.heading("Detected Emotion");
                    self.render_detection(ui);
                });

                ui.add_space(12.0);

                ui.group(|ui| {
                    ui.heading("Log Your Mood");
                    self.render_entry_form(ui);
                });
            });
        });
    }

    fn render_capture_controls(&mut self, ui: &mut egui::Ui) {
        let page = self.logger.page();
        let capture = page.control(Hook::CaptureButton).cloned();
        let retake = page.control(Hook::RetakeButton).cloned();
        let detect = page.control(Hook::DetectButton).cloned();

        ui.horizontal(|ui| {
            if let Some(control) = capture.filter(|c| c.visible) {
                if ui
                    .add_enabled(control.enabled, egui::Button::new("📷 Capture"))
                    .clicked()
                {
                    self.logger.capture();
                }
            }

            if let Some(control) = retake.filter(|c| c.visible) {
                if ui
                    .add_enabled(control.enabled, egui::Button::new("↺ Retake"))
                    .clicked()
                {
                    self.logger.retake();
                }
            }

            if let Some(control) = detect.filter(|c| c.visible) {
                if control.busy {
                    ui.add(egui::Spinner::new());
                    ui.label("Detecting...");
                } else if ui
                    .add_enabled(control.enabled, egui::Button::new("🔍 Detect Emotion"))
                    .clicked()
                {
                    self.detect();
                }
            }

            if self.logger.session().is_frozen() && ui.button("💾 Save Snapshot").clicked() {
                let dir = self.config.snapshot_dir.clone();
                self.logger.export_snapshot(&dir);
            }
        });

        ui.add_space(6.0);
        let mut live = self.logger.is_live();
        let can_poll = self.logger.session().can_capture() || self.logger.session().is_frozen();
        if ui
            .add_enabled(can_poll, egui::Checkbox::new(&mut live, "Live detection"))
            .changed()
        {
            if live {
                self.start_live_detection();
            } else {
                self.stop_live_detection();
            }
        }

        if let Some(text) = self.logger.page().text(Hook::LiveEmotionText) {
            ui.horizontal(|ui| {
                ui.label("Live:");
                ui.label(egui::RichText::new(text).strong().color(ui::emotion_color(text)));
            });
        }
    }

    fn render_detection(&mut self, ui: &mut egui::Ui) {
        let page = self.logger.page();
        if !page.panel_visible(Hook::EmotionDetails) {
            ui.label("Capture an image and run detection to see results.");
            return;
        }

        let label = page.text(Hook::DetectedEmotion).unwrap_or_default();
        let confidence = page
            .field(Hook::ConfidenceField)
            .and_then(|value| value.parse::<f32>().ok())
            .unwrap_or(0.0);

        ui.label(
            egui::RichText::new(label)
                .size(28.0)
                .strong()
                .color(ui::emotion_color(label)),
        );
        ui::draw_confidence_bar(ui, &self.theme, "Confidence:", confidence);
    }

    fn render_entry_form(&mut self, ui: &mut egui::Ui) {
        let emotion = self
            .logger
            .page()
            .field(Hook::EmotionField)
            .unwrap_or_default()
            .to_string();
        let mut picked = None;
        egui::ComboBox::from_label("Emotion")
            .selected_text(if emotion.is_empty() {
                "Detect or choose..."
            } else {
                emotion.as_str()
            })
            .show_ui(ui, |ui| {
                for candidate in EMOTIONS {
                    let label = egui::RichText::new(candidate).color(ui::emotion_color(candidate));
                    if ui.selectable_label(emotion == candidate, label).clicked() {
                        picked = Some(candidate);
                    }
                }
            });
        if let Some(candidate) = picked {
            self.select_emotion(candidate);
        }

        ui.add(egui::Slider::new(&mut self.draft.intensity, 1..=10).text("Intensity"));

        egui::ComboBox::from_label("Context")
            .selected_text(if self.draft.context.is_empty() {
                "Choose..."
            } else {
                self.draft.context.as_str()
            })
            .show_ui(ui, |ui| {
                for context in CONTEXTS {
                    ui.selectable_value(&mut self.draft.context, context.to_string(), context);
                }
            });

        ui.label("Notes:");
        ui.add(
            egui::TextEdit::multiline(&mut self.draft.notes)
                .desired_rows(3)
                .hint_text("How are you feeling?"),
        );
        ui.checkbox(&mut self.draft.attach_image, "Attach captured image");

        ui.add_space(6.0);
        if self.saving {
            ui.horizontal(|ui| {
                ui.add(egui::Spinner::new());
                ui.label("Saving...");
            });
        } else if ui
            .add_enabled(!emotion.is_empty(), egui::Button::new("Save Mood"))
            .clicked()
        {
            self.save_mood();
        }
    }

    fn render_analytics(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Mood Analytics");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("⟳ Reload").clicked() {
                    self.reload_charts();
                }
                if ui.button("📁 Data Folder...").clicked() {
                    self.pick_data_dir();
                }
                ui.label(
                    egui::RichText::new(self.config.chart_data_dir.display().to_string())
                        .color(self.theme.text_secondary),
                );
            });
        });
        ui.add_space(10.0);

        for (kind, panel) in &self.charts {
            ui::chart_panel(ui, &self.theme, kind.title(), panel);
            ui.add_space(12.0);
        }
    }

    fn render_suggestions(&mut self, ui: &mut egui::Ui) {
        ui.heading("Suggestions");
        ui.add_space(10.0);

        if self.suggestions.is_empty() {
            ui.label("No suggestions yet. Log a few moods to get personalized ideas.");
            return;
        }

        let mut clicked = None;
        for suggestion in self.suggestions.suggestions() {
            ui.group(|ui| {
                ui.horizontal(|ui| {
                    ui.vertical(|ui| {
                        ui.label(egui::RichText::new(&suggestion.title).strong());
                        if let Some(category) = &suggestion.category {
                            ui.label(
                                egui::RichText::new(category).color(self.theme.text_secondary),
                            );
                        }
                    });
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if let Some(stars) = ui::star_rating(ui, &self.theme, suggestion.rating) {
                            clicked = Some((suggestion.id.clone(), stars));
                        }
                    });
                });
            });
        }

        if let Some((id, stars)) = clicked {
            self.rate(id, stars);
        }
    }

    fn render_settings_window(&mut self, ctx: &egui::Context) {
        let mut open = self.show_settings;
        let mut apply = false;

        egui::Window::new("Settings")
            .open(&mut open)
            .resizable(true)
            .default_size([420.0, 480.0])
            .show(ctx, |ui| {
                let draft = &mut self.settings_draft;

                ui.heading("Server");
                ui.label("Server URL:");
                ui.text_edit_singleline(&mut draft.server_url);

                ui.separator();
                ui.heading("Camera");
                ui.add(egui::Slider::new(&mut draft.jpeg_quality, 1..=100).text("JPEG quality"));
                ui.checkbox(&mut draft.live_detection, "Live detection on startup");
                ui.add(
                    egui::Slider::new(&mut draft.live_poll_interval_ms, 500..=10_000)
                        .text("Live interval")
                        .suffix(" ms"),
                );
                ui.label("Camera changes take effect on restart.");

                ui.separator();
                ui.heading("Output");
                ui.label("Snapshot Directory:");
                ui.label(draft.snapshot_dir.display().to_string());

                ui.add_space(10.0);
                if ui.button("Apply").clicked() {
                    apply = true;
                }
            });

        self.show_settings = open;
        if apply {
            self.apply_settings();
        }
    }

    fn render_about_window(&mut self, ctx: &egui::Context) {
        egui::Window::new("About")
            .open(&mut self.show_about)
            .resizable(false)
            .default_size([400.0, 260.0])
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.heading("MoodSync");
                    ui.label(format!("Version {}", env!("CARGO_PKG_VERSION")));
                    ui.add_space(20.0);
                    ui.label("Capture how you feel, detect emotions from your camera,");
                    ui.label("and follow your mood over time.");
                });
            });
    }

    fn render_notices(&mut self, ctx: &egui::Context) {
        self.logger.notices.prune(Instant::now());
        if let Some(index) = ui::notice_overlay(ctx, &self.theme, self.logger.notices.iter()) {
            self.logger.notices.dismiss(index);
        }
    }
}

impl eframe::App for MoodSyncApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();
        self.update_video(ctx);

        self.render_header(ctx);

        if self.show_settings {
            self.render_settings_window(ctx);
        }

        if self.show_about {
            self.render_about_window(ctx);
        }

        self.render_main_content(ctx);
        self.render_notices(ctx);

        // Request repaint for continuous updates
        ctx.request_repaint();
    }
}

impl Drop for MoodSyncApp {
    fn drop(&mut self) {
        self.stop_live_detection();
        self.logger.teardown();
    }
}
