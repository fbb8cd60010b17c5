// src/page.rs - View model for the mood logger: controls, submission fields and displays
use crate::error::{MoodSyncError, Result};
use std::collections::HashMap;
use tracing::debug;

/// Elements the capture workflow reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    CaptureButton,
    RetakeButton,
    DetectButton,
    CapturedImageField,
    EmotionField,
    ConfidenceField,
    DetectedEmotion,
    EmotionDetails,
    LiveEmotionText,
}

impl Hook {
    /// Hooks a host view must provide before binding succeeds
    pub const REQUIRED: [Hook; 8] = [
        Hook::CaptureButton,
        Hook::RetakeButton,
        Hook::DetectButton,
        Hook::CapturedImageField,
        Hook::EmotionField,
        Hook::ConfidenceField,
        Hook::DetectedEmotion,
        Hook::EmotionDetails,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Hook::CaptureButton => "capture-btn",
            Hook::RetakeButton => "retake-btn",
            Hook::DetectButton => "detect-btn",
            Hook::CapturedImageField => "captured_image",
            Hook::EmotionField => "emotion",
            Hook::ConfidenceField => "confidence",
            Hook::DetectedEmotion => "detected-emotion",
            Hook::EmotionDetails => "emotion-details",
            Hook::LiveEmotionText => "live-emotion-text",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub visible: bool,
    pub enabled: bool,
    pub busy: bool,
}

impl Control {
    pub fn shown() -> Self {
        Self {
            visible: true,
            enabled: true,
            busy: false,
        }
    }

    pub fn hidden() -> Self {
        Self {
            visible: false,
            enabled: true,
            busy: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Control(Control),
    /// Hidden submission field
    Field(String),
    Text(String),
    Panel { visible: bool },
}

/// All elements of one view, checked once at bind time
#[derive(Debug, Clone)]
pub struct Page {
    elements: HashMap<Hook, Element>,
}

impl Page {
    /// Validates that every required hook is present
    pub fn bind(elements: HashMap<Hook, Element>) -> Result<Self> {
        for hook in Hook::REQUIRED {
            if !elements.contains_key(&hook) {
                return Err(MoodSyncError::MissingHook(hook.id()));
            }
        }
        Ok(Self { elements })
    }

    /// The standard mood logger layout in its initial state
    pub fn mood_logger() -> Self {
        let elements = HashMap::from([
            (
                Hook::CaptureButton,
                Element::Control(Control {
                    visible: true,
                    enabled: false,
                    busy: false,
                }),
            ),
            (Hook::RetakeButton, Element::Control(Control::hidden())),
            (Hook::DetectButton, Element::Control(Control::hidden())),
            (Hook::CapturedImageField, Element::Field(String::new())),
            (Hook::EmotionField, Element::Field(String::new())),
            (Hook::ConfidenceField, Element::Field(String::new())),
            (Hook::DetectedEmotion, Element::Text(String::new())),
            (Hook::EmotionDetails, Element::Panel { visible: false }),
        ]);
        Self { elements }
    }

    pub fn has(&self, hook: Hook) -> bool {
        self.elements.contains_key(&hook)
    }

    pub fn insert(&mut self, hook: Hook, element: Element) {
        self.elements.insert(hook, element);
    }

    pub fn remove(&mut self, hook: Hook) -> Option<Element> {
        self.elements.remove(&hook)
    }

    pub fn control(&self, hook: Hook) -> Option<&Control> {
        match self.elements.get(&hook) {
            Some(Element::Control(control)) => Some(control),
            _ => None,
        }
    }

    /// Applies `f` to a control; no-op if the element is gone
    pub fn update_control(&mut self, hook: Hook, f: impl FnOnce(&mut Control)) -> bool {
        match self.elements.get_mut(&hook) {
            Some(Element::Control(control)) => {
                f(control);
                true
            }
            _ => {
                debug!(hook = hook.id(), "control not on page, skipping");
                false
            }
        }
    }

    pub fn field(&self, hook: Hook) -> Option<&str> {
        match self.elements.get(&hook) {
            Some(Element::Field(value)) => Some(value),
            _ => None,
        }
    }

    pub fn set_field(&mut self, hook: Hook, value: impl Into<String>) -> bool {
        match self.elements.get_mut(&hook) {
            Some(Element::Field(current)) => {
                *current = value.into();
                true
            }
            _ => {
                debug!(hook = hook.id(), "field not on page, skipping");
                false
            }
        }
    }

    pub fn text(&self, hook: Hook) -> Option<&str> {
        match self.elements.get(&hook) {
            Some(Element::Text(value)) => Some(value),
            _ => None,
        }
    }

    pub fn set_text(&mut self, hook: Hook, value: impl Into<String>) -> bool {
        match self.elements.get_mut(&hook) {
            Some(Element::Text(current)) => {
                *current = value.into();
                true
            }
            _ => {
                debug!(hook = hook.id(), "text element not on page, skipping");
                false
            }
        }
    }

    pub fn panel_visible(&self, hook: Hook) -> bool {
        matches!(self.elements.get(&hook), Some(Element::Panel { visible: true }))
    }

    pub fn set_panel_visible(&mut self, hook: Hook, show: bool) -> bool {
        match self.elements.get_mut(&hook) {
            Some(Element::Panel { visible }) => {
                *visible = show;
                true
            }
            _ => false,
        }
    }
}
