// src/form.rs - Copies capture and detection results into the submission fields
use crate::error::{MoodSyncError, Result};
use crate::models::{DetectionResult, EncodedImage};
use crate::page::{Hook, Page};
use chrono::{DateTime, Local};
use serde::Serialize;

/// Mood entry as posted to the save-mood endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodSubmission {
    pub emotion: String,
    pub confidence: f64,
    pub intensity: u8,
    pub notes: String,
    /// The emotion the user picked by hand, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_mood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EncodedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Local>>,
}

/// What the user typed next to the detected emotion
#[derive(Debug, Clone)]
pub struct EntryDraft {
    /// 1-10
    pub intensity: u8,
    pub notes: String,
    pub context: String,
    pub attach_image: bool,
    pub manual_mood: Option<String>,
}

impl Default for EntryDraft {
    fn default() -> Self {
        Self {
            intensity: 5,
            notes: String::new(),
            context: String::new(),
            attach_image: true,
            manual_mood: None,
        }
    }
}

/// Context choices offered by the mood logger
pub const CONTEXTS: [&str; 6] = ["Work", "Home", "Social", "Exercise", "Study", "Other"];

pub struct FormBridge;

impl FormBridge {
    pub fn write_capture(page: &mut Page, image: &EncodedImage) {
        page.set_field(Hook::CapturedImageField, image.as_str());
    }

    pub fn clear_capture(page: &mut Page) {
        page.set_field(Hook::CapturedImageField, "");
    }

    /// Copies a successful detection into the emotion/confidence fields and shows the details panel
    pub fn write_detection(page: &mut Page, result: &DetectionResult) {
        page.set_field(Hook::EmotionField, result.emotion_label.as_str());
        page.set_field(Hook::ConfidenceField, result.confidence.to_string());
        page.set_text(Hook::DetectedEmotion, result.emotion_label.as_str());
        page.set_panel_visible(Hook::EmotionDetails, true);
    }

    /// Puts a hand-picked emotion in the emotion field. No classifier ran, so confidence is 0.
    pub fn select_emotion(page: &mut Page, emotion: &str) {
        page.set_field(Hook::EmotionField, emotion);
        page.set_field(Hook::ConfidenceField, "0");
        page.set_text(Hook::DetectedEmotion, emotion);
        page.set_panel_visible(Hook::EmotionDetails, true);
    }

    /// Empties the emotion fields and hides the details panel
    pub fn clear_detection(page: &mut Page) {
        page.set_field(Hook::EmotionField, "");
        page.set_field(Hook::ConfidenceField, "");
        page.set_text(Hook::DetectedEmotion, "");
        page.set_panel_visible(Hook::EmotionDetails, false);
    }

    /// Reads the fields back as a submission
    pub fn submission(
        page: &Page,
        draft: &EntryDraft,
        captured_at: Option<DateTime<Local>>,
    ) -> Result<MoodSubmission> {
        let emotion = page.field(Hook::EmotionField).unwrap_or_default().trim();
        if emotion.is_empty() {
            return Err(MoodSyncError::InvalidInput("Emotion is required".to_string()));
        }

        let confidence = page
            .field(Hook::ConfidenceField)
            .and_then(|value| value.parse::<f64>().ok())
            .unwrap_or(0.0);

        let image = if draft.attach_image {
            page.field(Hook::CapturedImageField)
                .and_then(|uri| EncodedImage::from_data_uri(uri))
                .filter(|image| !image.is_empty())
        } else {
            None
        };

        let manual_mood = draft
            .manual_mood
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        let context = Some(draft.context.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        Ok(MoodSubmission {
            emotion: emotion.to_string(),
            confidence,
            intensity: draft.intensity.clamp(1, 10),
            notes: draft.notes.trim().to_string(),
            manual_mood,
            context,
            image,
            captured_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_lands_in_fields() {
        let mut page = Page::mood_logger();
        FormBridge::write_detection(&mut page, &DetectionResult::new("Happy", 0.92));

        assert_eq!(page.field(Hook::EmotionField), Some("Happy"));
        assert_eq!(
            page.field(Hook::ConfidenceField).unwrap().parse::<f64>().unwrap(),
            0.92
        );
        assert_eq!(page.text(Hook::DetectedEmotion), Some("Happy"));
        assert!(page.panel_visible(Hook::EmotionDetails));
    }

    #[test]
    fn submission_requires_an_emotion() {
        let page = Page::mood_logger();
        let err = FormBridge::submission(&page, &EntryDraft::default(), None).unwrap_err();
        assert!(matches!(err, MoodSyncError::InvalidInput(_)));
    }

    #[test]
    fn submission_collects_fields_and_draft() {
        let mut page = Page::mood_logger();
        let image = EncodedImage::from_jpeg_bytes(&[0xFF, 0xD8]);
        FormBridge::write_capture(&mut page, &image);
        FormBridge::write_detection(&mut page, &DetectionResult::new("Sad", 0.61));

        let draft = EntryDraft {
            intensity: 14,
            notes: "  long day ".into(),
            context: "Work".into(),
            attach_image: true,
            manual_mood: None,
        };
        let submission = FormBridge::submission(&page, &draft, None).unwrap();

        assert_eq!(submission.emotion, "Sad");
        assert_eq!(submission.confidence, 0.61);
        assert_eq!(submission.intensity, 10);
        assert_eq!(submission.notes, "long day");
        assert_eq!(submission.context.as_deref(), Some("Work"));
        assert_eq!(submission.image, Some(image));
    }

    #[test]
    fn submission_json_omits_missing_parts() {
        let mut page = Page::mood_logger();
        FormBridge::write_detection(&mut page, &DetectionResult::new("Neutral", 0.5));
        let draft = EntryDraft {
            attach_image: false,
            ..EntryDraft::default()
        };

        let submission = FormBridge::submission(&page, &draft, None).unwrap();
        let json = serde_json::to_value(&submission).unwrap();
        assert_eq!(json["emotion"], "Neutral");
        assert_eq!(json["intensity"], 5);
        assert!(json.get("image").is_none());
        assert!(json.get("context").is_none());
    }

    #[test]
    fn cleared_capture_is_not_attached() {
        let mut page = Page::mood_logger();
        FormBridge::write_capture(&mut page, &EncodedImage::from_jpeg_bytes(&[1, 2]));
        FormBridge::clear_capture(&mut page);
        FormBridge::write_detection(&mut page, &DetectionResult::new("Happy", 0.9));

        let submission = FormBridge::submission(&page, &EntryDraft::default(), None).unwrap();
        assert!(submission.image.is_none());
    }

    #[test]
    fn picked_emotion_saves_without_a_capture() {
        let mut page = Page::mood_logger();
        FormBridge::select_emotion(&mut page, "Calm");
        assert!(page.panel_visible(Hook::EmotionDetails));
        assert_eq!(page.text(Hook::DetectedEmotion), Some("Calm"));

        let draft = EntryDraft {
            manual_mood: Some("Calm".into()),
            ..EntryDraft::default()
        };
        let submission = FormBridge::submission(&page, &draft, None).unwrap();
        assert_eq!(submission.emotion, "Calm");
        assert_eq!(submission.confidence, 0.0);
        assert!(submission.image.is_none());

        let json = serde_json::to_value(&submission).unwrap();
        assert_eq!(json["manual_mood"], "Calm");
    }

    #[test]
    fn cleared_detection_blocks_resubmission() {
        let mut page = Page::mood_logger();
        FormBridge::write_detection(&mut page, &DetectionResult::new("Happy", 0.9));
        FormBridge::clear_detection(&mut page);

        assert_eq!(page.field(Hook::EmotionField), Some(""));
        assert_eq!(page.field(Hook::ConfidenceField), Some(""));
        assert!(!page.panel_visible(Hook::EmotionDetails));
        assert!(FormBridge::submission(&page, &EntryDraft::default(), None).is_err());
    }
}
