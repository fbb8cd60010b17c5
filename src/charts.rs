// src/charts.rs - Analytics chart models built from aggregate JSON blobs
use crate::error::Result;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, error};

/// Plain RGB triple; the UI layer turns it into a paint color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn with_alpha(self, alpha: f32) -> [u8; 4] {
        let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        [self.0, self.1, self.2, a]
    }
}

pub const FALLBACK_COLOR: Rgb = Rgb(133, 135, 150);
/// Series color for charts not keyed by emotion
pub const ACCENT_COLOR: Rgb = Rgb(108, 99, 255);

static EMOTION_COLORS: Lazy<HashMap<&'static str, Rgb>> = Lazy::new(|| {
    HashMap::from([
        ("Happy", Rgb(28, 200, 138)),
        ("Sad", Rgb(78, 115, 223)),
        ("Angry", Rgb(231, 74, 59)),
        ("Neutral", Rgb(133, 135, 150)),
        ("Fear", Rgb(246, 194, 62)),
        ("Disgust", Rgb(156, 39, 176)),
        ("Surprise", Rgb(54, 185, 204)),
        ("Calm", Rgb(76, 175, 80)),
        ("Energetic", Rgb(255, 152, 0)),
        ("Tired", Rgb(121, 85, 72)),
        ("Anxious", Rgb(233, 30, 99)),
    ])
});

/// Emotions offered when picking a mood by hand
pub const EMOTIONS: [&str; 11] = [
    "Happy",
    "Sad",
    "Angry",
    "Neutral",
    "Fear",
    "Disgust",
    "Surprise",
    "Calm",
    "Energetic",
    "Tired",
    "Anxious",
];

/// Fixed color for an emotion label. Unknown labels get the neutral gray.
pub fn color_of(label: &str) -> Rgb {
    EMOTION_COLORS.get(label).copied().unwrap_or(FALLBACK_COLOR)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartKind {
    Trends,
    Distribution,
    Intensity,
    Effectiveness,
}

impl ChartKind {
    pub const ALL: [ChartKind; 4] = [
        ChartKind::Trends,
        ChartKind::Distribution,
        ChartKind::Intensity,
        ChartKind::Effectiveness,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ChartKind::Trends => "mood-trends-chart",
            ChartKind::Distribution => "emotion-distribution-chart",
            ChartKind::Intensity => "mood-intensity-chart",
            ChartKind::Effectiveness => "suggestion-effectiveness-chart",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ChartKind::Trends => "Mood Trends",
            ChartKind::Distribution => "Emotion Distribution",
            ChartKind::Intensity => "Mood Intensity by Context",
            ChartKind::Effectiveness => "Suggestion Effectiveness",
        }
    }

    fn error_message(self) -> &'static str {
        match self {
            ChartKind::Trends => "Failed to load mood trends data",
            ChartKind::Distribution => "Failed to load emotion distribution data",
            ChartKind::Intensity => "Failed to load mood intensity data",
            ChartKind::Effectiveness => "Failed to load suggestion effectiveness data",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TrendData {
    dates: Vec<String>,
    emotions: Vec<String>,
    intensities: Vec<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DistributionData {
    emotions: Vec<String>,
    counts: Vec<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IntensityData {
    contexts: Vec<String>,
    datasets: Vec<IntensitySeries>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IntensitySeries {
    emotion: String,
    intensities: Vec<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EffectivenessData {
    types: Vec<String>,
    ratings: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendPoint {
    pub date: String,
    pub emotion: String,
    pub intensity: f64,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendChart {
    pub points: Vec<TrendPoint>,
    pub y_max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DonutSlice {
    pub label: String,
    pub count: f64,
    pub percent: u32,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DonutChart {
    pub slices: Vec<DonutSlice>,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    pub emotion: String,
    /// One value per context; missing values are 0
    pub values: Vec<f64>,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    pub contexts: Vec<String>,
    pub series: Vec<BarSeries>,
    pub y_max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RadarChart {
    pub axes: Vec<String>,
    pub values: Vec<f64>,
    pub r_max: f64,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartModel {
    Trend(TrendChart),
    Donut(DonutChart),
    Bars(BarChart),
    Radar(RadarChart),
}

impl ChartModel {
    pub fn is_empty(&self) -> bool {
        match self {
            ChartModel::Trend(c) => c.points.is_empty(),
            ChartModel::Donut(c) => c.slices.is_empty(),
            ChartModel::Bars(c) => c.contexts.is_empty() || c.series.is_empty(),
            ChartModel::Radar(c) => c.axes.is_empty(),
        }
    }
}

/// What a chart slot shows: the chart, or an inline error in its place
#[derive(Debug, Clone, PartialEq)]
pub enum ChartPanel {
    Chart(ChartModel),
    Error(String),
}

/// Builds one chart from its JSON blob. `None` or a blank blob gives an empty chart.
pub fn render(kind: ChartKind, json: Option<&str>) -> ChartPanel {
    let json = json.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("{}");

    let model = match kind {
        ChartKind::Trends => serde_json::from_str(json).map(trend_chart),
        ChartKind::Distribution => serde_json::from_str(json).map(donut_chart),
        ChartKind::Intensity => serde_json::from_str(json).map(bar_chart),
        ChartKind::Effectiveness => serde_json::from_str(json).map(radar_chart),
    };

    match model {
        Ok(model) => ChartPanel::Chart(model),
        Err(e) => {
            error!(chart = kind.id(), "Error parsing chart data: {}", e);
            ChartPanel::Error(kind.error_message().to_string())
        }
    }
}

/// Reads `<dir>/<chart-id>.json` for every chart. Each chart fails on its own.
pub fn load_from_dir(dir: &Path) -> Vec<(ChartKind, ChartPanel)> {
    ChartKind::ALL
        .iter()
        .map(|&kind| {
            let panel = match read_blob(dir, kind) {
                Ok(blob) => render(kind, blob.as_deref()),
                Err(e) => {
                    error!(chart = kind.id(), "Could not read chart data: {}", e);
                    ChartPanel::Error(kind.error_message().to_string())
                }
            };
            (kind, panel)
        })
        .collect()
}

fn read_blob(dir: &Path, kind: ChartKind) -> Result<Option<String>> {
    let path = dir.join(format!("{}.json", kind.id()));
    match std::fs::read_to_string(&path) {
        Ok(blob) => Ok(Some(blob)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no chart data file");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn trend_chart(data: TrendData) -> ChartModel {
    let points = data
        .dates
        .into_iter()
        .zip(data.intensities)
        .enumerate()
        .map(|(i, (date, intensity))| {
            let emotion = data.emotions.get(i).cloned().unwrap_or_default();
            TrendPoint {
                color: color_of(&emotion),
                date,
                emotion,
                intensity,
            }
        })
        .collect();

    ChartModel::Trend(TrendChart {
        points,
        y_max: 10.0,
    })
}

fn donut_chart(data: DistributionData) -> ChartModel {
    let counts: Vec<f64> = data
        .emotions
        .iter()
        .enumerate()
        .map(|(i, _)| data.counts.get(i).copied().unwrap_or(0.0).max(0.0))
        .collect();
    let total: f64 = counts.iter().sum();
    let percents = percentages(&counts);

    let slices = data
        .emotions
        .into_iter()
        .zip(counts)
        .zip(percents)
        .map(|((label, count), percent)| DonutSlice {
            color: color_of(&label),
            label,
            count,
            percent,
        })
        .collect();

    ChartModel::Donut(DonutChart { slices, total })
}

/// Whole-number shares of the total that add up to exactly 100.
/// Leftover points go to the largest fractional parts; all zero when the total is zero.
pub fn percentages(counts: &[f64]) -> Vec<u32> {
    let largest = counts.iter().copied().fold(0.0_f64, f64::max);
    if !largest.is_finite() || largest <= 0.0 {
        return vec![0; counts.len()];
    }

    // Scaled to the largest count so the sum stays finite for huge inputs
    let scaled: Vec<f64> = counts.iter().map(|c| c / largest).collect();
    let total: f64 = scaled.iter().sum();
    if total <= 0.0 {
        return vec![0; counts.len()];
    }

    let exact: Vec<f64> = scaled.iter().map(|c| c / total * 100.0).collect();
    let mut shares: Vec<u32> = exact.iter().map(|p| p.floor() as u32).collect();
    let assigned: u32 = shares.iter().sum();

    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = exact[a] - exact[a].floor();
        let fb = exact[b] - exact[b].floor();
        fb.total_cmp(&fa).then(a.cmp(&b))
    });

    for &i in order.iter().take(100u32.saturating_sub(assigned) as usize) {
        shares[i] += 1;
    }
    shares
}

fn bar_chart(data: IntensityData) -> ChartModel {
    let width = data.contexts.len();
    let series = data
        .datasets
        .into_iter()
        .map(|set| {
            let mut values = set.intensities;
            values.resize(width, 0.0);
            BarSeries {
                color: color_of(&set.emotion),
                emotion: set.emotion,
                values,
            }
        })
        .collect();

    ChartModel::Bars(BarChart {
        contexts: data.contexts,
        series,
        y_max: 10.0,
    })
}

fn radar_chart(data: EffectivenessData) -> ChartModel {
    let mut values = data.ratings;
    values.resize(data.types.len(), 0.0);

    ChartModel::Radar(RadarChart {
        axes: data.types,
        values,
        r_max: 5.0,
        color: ACCENT_COLOR,
    })
}
