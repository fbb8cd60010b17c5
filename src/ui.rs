// src/ui.rs - Theme, video widget and painter-drawn charts
use crate::charts::{
    color_of, BarChart, ChartModel, ChartPanel, DonutChart, RadarChart, Rgb, TrendChart,
};
use crate::effects::ThemePreference;
use crate::notify::{Notice, NoticeLevel};
use eframe::egui::{self, Align2, Color32, FontId, Pos2, Rect, Shape, Stroke, Vec2};
use image::DynamicImage;
use std::f32::consts::{PI, TAU};

#[derive(Debug, Clone)]
pub struct Theme {
    pub dark: bool,
    pub primary: Color32,
    pub secondary: Color32,
    pub background: Color32,
    pub surface: Color32,
    pub error: Color32,
    pub warning: Color32,
    pub success: Color32,
    pub info: Color32,
    pub text_primary: Color32,
    pub text_secondary: Color32,
    pub grid: Color32,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            dark: true,
            primary: Color32::from_rgb(108, 99, 255),
            secondary: Color32::from_rgb(255, 152, 0),
            background: Color32::from_rgb(20, 20, 25),
            surface: Color32::from_rgb(30, 30, 35),
            error: Color32::from_rgb(231, 74, 59),
            warning: Color32::from_rgb(246, 194, 62),
            success: Color32::from_rgb(28, 200, 138),
            info: Color32::from_rgb(54, 185, 204),
            text_primary: Color32::WHITE,
            text_secondary: Color32::from_rgb(200, 200, 200),
            grid: Color32::from_rgba_unmultiplied(255, 255, 255, 18),
        }
    }

    pub fn light() -> Self {
        Self {
            dark: false,
            background: Color32::from_rgb(248, 249, 252),
            surface: Color32::from_rgb(234, 236, 244),
            text_primary: Color32::from_rgb(33, 37, 41),
            text_secondary: Color32::from_rgb(90, 92, 105),
            grid: Color32::from_rgba_unmultiplied(0, 0, 0, 13),
            ..Self::dark()
        }
    }

    pub fn for_preference(preference: ThemePreference) -> Self {
        if preference.is_dark() {
            Self::dark()
        } else {
            Self::light()
        }
    }

    pub fn visuals(&self) -> egui::Visuals {
        let mut visuals = if self.dark {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        };

        visuals.panel_fill = self.background;
        visuals.widgets.noninteractive.bg_fill = self.surface;
        visuals.widgets.active.bg_fill = self.primary;
        visuals.selection.bg_fill = self.primary;

        visuals.widgets.noninteractive.rounding = egui::Rounding::same(8.0);
        visuals.widgets.inactive.rounding = egui::Rounding::same(8.0);
        visuals.widgets.hovered.rounding = egui::Rounding::same(8.0);
        visuals.widgets.active.rounding = egui::Rounding::same(8.0);
        visuals.window_rounding = egui::Rounding::same(12.0);
        visuals.menu_rounding = egui::Rounding::same(8.0);

        visuals
    }

    pub fn notice_color(&self, level: NoticeLevel) -> Color32 {
        match level {
            NoticeLevel::Info => self.info,
            NoticeLevel::Success => self.success,
            NoticeLevel::Warning => self.warning,
            NoticeLevel::Error => self.error,
        }
    }
}

pub fn paint_color(rgb: Rgb) -> Color32 {
    Color32::from_rgb(rgb.0, rgb.1, rgb.2)
}

fn paint_color_alpha(rgb: Rgb, alpha: f32) -> Color32 {
    let [r, g, b, a] = rgb.with_alpha(alpha);
    Color32::from_rgba_unmultiplied(r, g, b, a)
}

/// Color for an emotion label
pub fn emotion_color(label: &str) -> Color32 {
    paint_color(color_of(label))
}

pub fn draw_confidence_bar(ui: &mut egui::Ui, theme: &Theme, label: &str, value: f32) {
    ui.horizontal(|ui| {
        ui.label(label);

        let bar_width = 200.0;
        let bar_height = 20.0;
        let rect = ui.allocate_space(Vec2::new(bar_width, bar_height)).1;
        let value = value.clamp(0.0, 1.0);

        let painter = ui.painter();
        painter.rect_filled(rect, egui::Rounding::same(4.0), theme.surface);

        let fill_rect = Rect::from_min_size(rect.min, Vec2::new(bar_width * value, bar_height));
        let color = if value > 0.7 {
            theme.success
        } else if value > 0.4 {
            theme.warning
        } else {
            theme.error
        };
        painter.rect_filled(fill_rect, egui::Rounding::same(4.0), color);

        painter.text(
            rect.center(),
            Align2::CENTER_CENTER,
            format!("{:.0}%", value * 100.0),
            FontId::proportional(12.0),
            theme.text_primary,
        );
    });
}

fn draw_arc(
    painter: &egui::Painter,
    center: Pos2,
    radius: f32,
    start_angle: f32,
    end_angle: f32,
    color: Color32,
    thickness: f32,
) {
    let points_count = (((end_angle - start_angle).abs() * 50.0) as usize).max(1);
    let points: Vec<Pos2> = (0..=points_count)
        .map(|i| {
            let t = i as f32 / points_count as f32;
            let angle = start_angle + (end_angle - start_angle) * t;
            Pos2::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            )
        })
        .collect();

    painter.add(Shape::line(points, Stroke::new(thickness, color)));
}

/// Live camera preview or the frozen still
pub struct VideoWidget {
    texture: Option<egui::TextureHandle>,
    aspect_ratio: f32,
}

impl Default for VideoWidget {
    fn default() -> Self {
        Self {
            texture: None,
            aspect_ratio: 4.0 / 3.0,
        }
    }
}

impl VideoWidget {
    pub fn update_frame(&mut self, ctx: &egui::Context, frame: &DynamicImage) {
        let size = [frame.width() as usize, frame.height() as usize];
        let rgba = frame.to_rgba8();
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
        self.aspect_ratio = frame.width() as f32 / frame.height().max(1) as f32;

        match &mut self.texture {
            Some(texture) => texture.set(color_image, Default::default()),
            None => {
                self.texture = Some(ctx.load_texture("video_frame", color_image, Default::default()))
            }
        }
    }

    pub fn clear(&mut self) {
        self.texture = None;
    }

    pub fn show(&self, ui: &mut egui::Ui, placeholder: &str) {
        let width = ui.available_width().min(640.0);
        let size = Vec2::new(width, width / self.aspect_ratio);
        let (rect, _response) = ui.allocate_exact_size(size, egui::Sense::hover());

        if let Some(texture) = &self.texture {
            ui.painter().image(
                texture.id(),
                rect,
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
        } else {
            ui.painter()
                .rect_filled(rect, egui::Rounding::same(4.0), Color32::from_rgb(50, 50, 55));
            ui.painter().text(
                rect.center(),
                Align2::CENTER_CENTER,
                placeholder,
                FontId::proportional(16.0),
                Color32::from_rgb(150, 150, 155),
            );
        }
    }
}

/// Five clickable stars. Returns the star that was clicked.
pub fn star_rating(ui: &mut egui::Ui, theme: &Theme, rating: u8) -> Option<u8> {
    let mut clicked = None;
    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 2.0;
        for star in 1..=5u8 {
            let color = if star <= rating {
                theme.warning
            } else {
                theme.text_secondary.gamma_multiply(0.4)
            };
            let response = ui
                .add(
                    egui::Label::new(egui::RichText::new("★").size(22.0).color(color))
                        .sense(egui::Sense::click()),
                )
                .on_hover_cursor(egui::CursorIcon::PointingHand);
            if response.clicked() {
                clicked = Some(star);
            }
        }
    });
    clicked
}

/// Stack of notices in the top right corner. Returns the index the user dismissed.
pub fn notice_overlay<'a>(
    ctx: &egui::Context,
    theme: &Theme,
    notices: impl Iterator<Item = &'a Notice>,
) -> Option<usize> {
    let mut dismissed = None;
    egui::Area::new("notices")
        .anchor(Align2::RIGHT_TOP, Vec2::new(-12.0, 56.0))
        .order(egui::Order::Foreground)
        .show(ctx, |ui| {
            for (index, notice) in notices.enumerate() {
                egui::Frame::popup(ui.style())
                    .fill(theme.notice_color(notice.level))
                    .show(ui, |ui| {
                        ui.set_max_width(320.0);
                        ui.horizontal(|ui| {
                            ui.label(egui::RichText::new(&notice.message).color(Color32::WHITE));
                            if ui.small_button("✕").clicked() {
                                dismissed = Some(index);
                            }
                        });
                    });
                ui.add_space(6.0);
            }
        });
    dismissed
}

/// Draws a chart, or the inline error that replaced it
pub fn chart_panel(ui: &mut egui::Ui, theme: &Theme, title: &str, panel: &ChartPanel) {
    ui.group(|ui| {
        ui.heading(title);
        match panel {
            ChartPanel::Error(message) => error_panel(ui, theme, message),
            ChartPanel::Chart(model) if model.is_empty() => {
                let (rect, _) = allocate_chart(ui);
                ui.painter().text(
                    rect.center(),
                    Align2::CENTER_CENTER,
                    "No data yet",
                    FontId::proportional(14.0),
                    theme.text_secondary,
                );
            }
            ChartPanel::Chart(ChartModel::Trend(chart)) => trend_chart(ui, theme, chart),
            ChartPanel::Chart(ChartModel::Donut(chart)) => donut_chart(ui, theme, chart),
            ChartPanel::Chart(ChartModel::Bars(chart)) => bar_chart(ui, theme, chart),
            ChartPanel::Chart(ChartModel::Radar(chart)) => radar_chart(ui, theme, chart),
        }
    });
}

fn error_panel(ui: &mut egui::Ui, theme: &Theme, message: &str) {
    let (rect, _) = allocate_chart(ui);
    let painter = ui.painter();
    painter.rect_filled(
        rect.shrink(8.0),
        egui::Rounding::same(6.0),
        theme.error.gamma_multiply(0.15),
    );
    painter.text(
        rect.center(),
        Align2::CENTER_CENTER,
        format!("⚠ {message}"),
        FontId::proportional(15.0),
        theme.error,
    );
}

fn allocate_chart(ui: &mut egui::Ui) -> (Rect, egui::Response) {
    let width = ui.available_width().max(200.0);
    ui.allocate_exact_size(Vec2::new(width, 260.0), egui::Sense::hover())
}

/// Plot area inside `rect` with a y axis from 0 to `y_max`
fn draw_y_axis(painter: &egui::Painter, theme: &Theme, rect: Rect, y_max: f64, step: f64) -> Rect {
    let plot = Rect::from_min_max(
        Pos2::new(rect.left() + 32.0, rect.top() + 10.0),
        Pos2::new(rect.right() - 10.0, rect.bottom() - 28.0),
    );

    let mut value = 0.0;
    while value <= y_max {
        let y = plot.bottom() - (value / y_max) as f32 * plot.height();
        painter.line_segment(
            [Pos2::new(plot.left(), y), Pos2::new(plot.right(), y)],
            Stroke::new(1.0, theme.grid),
        );
        painter.text(
            Pos2::new(plot.left() - 6.0, y),
            Align2::RIGHT_CENTER,
            format!("{value:.0}"),
            FontId::proportional(11.0),
            theme.text_secondary,
        );
        value += step;
    }
    plot
}

fn value_to_y(plot: Rect, value: f64, max: f64) -> f32 {
    let clamped = value.clamp(0.0, max);
    plot.bottom() - (clamped / max) as f32 * plot.height()
}

fn trend_chart(ui: &mut egui::Ui, theme: &Theme, chart: &TrendChart) {
    let (rect, response) = allocate_chart(ui);
    let painter = ui.painter();
    let plot = draw_y_axis(painter, theme, rect, chart.y_max, 2.0);

    let count = chart.points.len();
    let spacing = plot.width() / count.max(1) as f32;
    let positions: Vec<Pos2> = chart
        .points
        .iter()
        .enumerate()
        .map(|(i, point)| {
            Pos2::new(
                plot.left() + spacing * (i as f32 + 0.5),
                value_to_y(plot, point.intensity, chart.y_max),
            )
        })
        .collect();

    painter.add(Shape::line(positions.clone(), Stroke::new(3.0, theme.primary)));

    // Keep date labels readable on long ranges
    let label_every = (count / 8).max(1);
    for (i, (point, pos)) in chart.points.iter().zip(&positions).enumerate() {
        painter.circle_filled(*pos, 6.0, paint_color(point.color));
        if i % label_every == 0 {
            painter.text(
                Pos2::new(pos.x, plot.bottom() + 6.0),
                Align2::CENTER_TOP,
                &point.date,
                FontId::proportional(10.0),
                theme.text_secondary,
            );
        }
    }

    if let Some(hover) = response.hover_pos() {
        if let Some((point, _)) = chart
            .points
            .iter()
            .zip(&positions)
            .find(|(_, pos)| (pos.x - hover.x).abs() < spacing / 2.0)
        {
            response.on_hover_text(format!(
                "Date: {}\nEmotion: {}\nIntensity: {}",
                point.date, point.emotion, point.intensity
            ));
        }
    }
}

fn donut_chart(ui: &mut egui::Ui, theme: &Theme, chart: &DonutChart) {
    ui.horizontal(|ui| {
        let (rect, _) = ui.allocate_exact_size(Vec2::splat(240.0), egui::Sense::hover());
        let painter = ui.painter();
        let center = rect.center();
        let radius = rect.width() * 0.38;
        let thickness = radius * 0.35 * 2.0;

        if chart.slices.iter().any(|slice| slice.percent > 0) {
            let mut start = -PI / 2.0;
            for slice in &chart.slices {
                let sweep = slice.percent as f32 / 100.0 * TAU;
                if sweep > 0.0 {
                    draw_arc(
                        painter,
                        center,
                        radius,
                        start,
                        start + sweep,
                        paint_color(slice.color),
                        thickness,
                    );
                }
                start += sweep;
            }
        } else {
            draw_arc(painter, center, radius, 0.0, TAU, theme.grid, thickness);
        }

        ui.vertical(|ui| {
            for slice in &chart.slices {
                ui.horizontal(|ui| {
                    let (dot, _) = ui.allocate_exact_size(Vec2::splat(12.0), egui::Sense::hover());
                    ui.painter()
                        .circle_filled(dot.center(), 5.0, paint_color(slice.color));
                    ui.label(format!("{}: {} ({}%)", slice.label, slice.count, slice.percent));
                });
            }
        });
    });
}

fn bar_chart(ui: &mut egui::Ui, theme: &Theme, chart: &BarChart) {
    ui.horizontal_wrapped(|ui| {
        for series in &chart.series {
            ui.label(
                egui::RichText::new(format!("● {}", series.emotion))
                    .color(paint_color(series.color)),
            );
        }
    });

    let (rect, _) = allocate_chart(ui);
    let painter = ui.painter();
    let plot = draw_y_axis(painter, theme, rect, chart.y_max, 2.0);

    let group_width = plot.width() / chart.contexts.len().max(1) as f32;
    let bar_width = group_width * 0.8 / chart.series.len().max(1) as f32;

    for (c, context) in chart.contexts.iter().enumerate() {
        let group_left = plot.left() + group_width * c as f32 + group_width * 0.1;
        for (s, series) in chart.series.iter().enumerate() {
            let value = series.values.get(c).copied().unwrap_or(0.0);
            let x = group_left + bar_width * s as f32;
            let bar = Rect::from_min_max(
                Pos2::new(x, value_to_y(plot, value, chart.y_max)),
                Pos2::new(x + bar_width - 2.0, plot.bottom()),
            );
            painter.rect_filled(
                bar,
                egui::Rounding::same(3.0),
                paint_color_alpha(series.color, 0.7),
            );
        }
        painter.text(
            Pos2::new(group_left + group_width * 0.4, plot.bottom() + 6.0),
            Align2::CENTER_TOP,
            context,
            FontId::proportional(11.0),
            theme.text_secondary,
        );
    }
}

fn radar_chart(ui: &mut egui::Ui, theme: &Theme, chart: &RadarChart) {
    let (rect, _) = allocate_chart(ui);
    let painter = ui.painter();
    let center = rect.center();
    let radius = rect.height() * 0.38;
    let n = chart.axes.len();

    let spoke = |i: usize, scale: f32| {
        let angle = -PI / 2.0 + TAU * i as f32 / n as f32;
        center + Vec2::angled(angle) * radius * scale
    };

    for ring in 1..=chart.r_max as usize {
        let scale = ring as f32 / chart.r_max as f32;
        let ring_points: Vec<Pos2> = (0..n).map(|i| spoke(i, scale)).collect();
        painter.add(Shape::closed_line(ring_points, Stroke::new(1.0, theme.grid)));
    }

    for (i, axis) in chart.axes.iter().enumerate() {
        painter.line_segment([center, spoke(i, 1.0)], Stroke::new(1.0, theme.grid));
        painter.text(
            spoke(i, 1.15),
            Align2::CENTER_CENTER,
            axis,
            FontId::proportional(11.0),
            theme.text_secondary,
        );
    }

    let points: Vec<Pos2> = chart
        .values
        .iter()
        .enumerate()
        .map(|(i, value)| spoke(i, (value.clamp(0.0, chart.r_max) / chart.r_max) as f32))
        .collect();

    // Fan of triangles so uneven shapes still fill correctly
    let fill = paint_color_alpha(chart.color, 0.2);
    for i in 0..n {
        let next = (i + 1) % n;
        painter.add(Shape::convex_polygon(
            vec![center, points[i], points[next]],
            fill,
            Stroke::NONE,
        ));
    }
    painter.add(Shape::closed_line(
        points.clone(),
        Stroke::new(2.0, paint_color(chart.color)),
    ));
    for point in points {
        painter.circle_filled(point, 4.0, paint_color(chart.color));
    }
}
