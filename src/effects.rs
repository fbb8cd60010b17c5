// src/effects.rs - Theme preference and suggestion ratings
use crate::error::{MoodSyncError, Result};
use crate::models::Suggestion;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    Light,
    #[default]
    Dark,
}

impl ThemePreference {
    pub fn toggled(self) -> Self {
        match self {
            ThemePreference::Light => ThemePreference::Dark,
            ThemePreference::Dark => ThemePreference::Light,
        }
    }

    pub fn is_dark(self) -> bool {
        self == ThemePreference::Dark
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Preferences {
    #[serde(default)]
    theme: Option<ThemePreference>,
}

/// Small JSON file holding the user's UI preferences
pub struct PreferenceStore {
    path: PathBuf,
    data: Preferences,
}

impl PreferenceStore {
    /// Opens the store. A missing or unreadable file starts from defaults.
    pub fn open(path: PathBuf) -> Self {
        let data = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), "Ignoring malformed preferences: {}", e);
                Preferences::default()
            }),
            Err(_) => Preferences::default(),
        };

        Self { path, data }
    }

    pub fn theme(&self) -> ThemePreference {
        self.data.theme.unwrap_or_default()
    }

    /// Flips the theme and writes it straight away
    pub fn toggle_theme(&mut self) -> Result<ThemePreference> {
        let theme = self.theme().toggled();
        self.set_theme(theme)?;
        Ok(theme)
    }

    pub fn set_theme(&mut self, theme: ThemePreference) -> Result<()> {
        self.data.theme = Some(theme);
        self.persist()?;
        info!(?theme, "theme changed");
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.data)?)?;
        Ok(())
    }
}

/// Suggestions shown on the suggestions view, with their star ratings
#[derive(Debug, Default)]
pub struct SuggestionBoard {
    suggestions: Vec<Suggestion>,
}

impl SuggestionBoard {
    pub fn new(suggestions: Vec<Suggestion>) -> Self {
        Self { suggestions }
    }

    /// Reads `suggestions.json` from `dir`; an absent file gives an empty board
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join("suggestions.json");
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no suggestions file");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self::new(serde_json::from_str(&contents)?))
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty()
    }

    /// Fills in the clicked stars and returns the previous rating so a failed send can be undone
    pub fn rate(&mut self, suggestion_id: &str, rating: u8) -> Result<u8> {
        validate_rating(rating)?;
        let suggestion = self
            .suggestions
            .iter_mut()
            .find(|s| s.id == suggestion_id)
            .ok_or_else(|| {
                MoodSyncError::InvalidInput(format!("unknown suggestion {suggestion_id}"))
            })?;

        let previous = suggestion.rating;
        suggestion.rating = rating;
        Ok(previous)
    }

    pub fn restore(&mut self, suggestion_id: &str, rating: u8) {
        if let Some(suggestion) = self.suggestions.iter_mut().find(|s| s.id == suggestion_id) {
            suggestion.rating = rating;
        }
    }
}

/// Star ratings run from 1 to 5
pub fn validate_rating(rating: u8) -> Result<()> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(MoodSyncError::InvalidInput(format!(
            "rating must be between 1 and 5, got {rating}"
        )))
    }
}
