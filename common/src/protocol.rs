//! Messages exchanged between the server and the pages.
//!
use serde::{Deserialize, Serialize};

/// Label with the confidence a classifier assigned to it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub score: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Axis-aligned box in pixel coordinates, origin at the top left corner.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Bbox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Labeled region found by a detector.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Detection {
    pub label: String,
    pub score: f32,
    pub bbox: Bbox,
}

impl Detection {
    pub fn new(label: impl Into<String>, score: f32, bbox: Bbox) -> Self {
        Self {
            label: label.into(),
            score,
            bbox,
        }
    }
}

/// Category of the status indicator, doubles as its CSS class.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Loading,
    Ready,
    Error,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Loading => "loading",
            StatusKind::Ready => "ready",
            StatusKind::Error => "error",
        }
    }
}

/// Status text paired with its category.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Status {
    pub kind: StatusKind,
    pub message: String,
}

impl Status {
    pub fn loading(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Loading,
            message: message.into(),
        }
    }

    pub fn ready(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Ready,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            message: message.into(),
        }
    }
}

/// Enabled state of the page's trigger controls.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Controls {
    pub capture: bool,
    pub switch_camera: bool,
    pub analyze: bool,
}
