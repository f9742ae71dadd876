//! Rendering results for the pages.
//!
use std::sync::{Mutex, PoisonError};

use common::protocol::{Detection, Prediction};
use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use serde::Serialize;

/// Shown instead of an empty detection list.
pub const NONE_FOUND: &str = "No objects found.";
/// Shown while an upload is analyzed.
pub const ANALYZING: &str = "Analyzing...";
pub const UNCLASSIFIED: &str = "Could not classify the image.";
pub const PROCESSING_ERROR: &str = "Error processing the image";

/// Score as percentage with a fixed number of decimals, e.g. `87.0%`.
pub fn percent(score: f32, decimals: usize) -> String {
    format!("{:.*}%", decimals, score * 100.0)
}

/// `label - 87.00%`
pub fn result_line(label: &str, score: f32) -> String {
    format!("{} - {}", label, percent(score, 2))
}

/// Result of the live-camera page: best label and a confidence bar.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LiveView {
    pub headline: String,
    /// Width and text of the confidence bar.
    pub confidence: String,
    pub failed: bool,
}

impl LiveView {
    pub fn from_predictions(predictions: &[Prediction]) -> Self {
        match predictions.first() {
            Some(best) => Self {
                headline: best.label.clone(),
                confidence: percent(best.score, 1),
                failed: false,
            },
            None => Self {
                headline: UNCLASSIFIED.into(),
                confidence: percent(0.0, 0),
                failed: false,
            },
        }
    }

    /// Inference failed, nothing partial is kept.
    pub fn failed() -> Self {
        Self {
            headline: PROCESSING_ERROR.into(),
            confidence: percent(0.0, 0),
            failed: true,
        }
    }
}

/// Result of the upload page: one line per prediction and per detection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UploadView {
    pub classification: Vec<String>,
    pub detection: Vec<String>,
    pub objects_found: usize,
}

impl UploadView {
    pub fn render(predictions: &[Prediction], detections: &[Detection]) -> Self {
        let classification = predictions
            .iter()
            .map(|p| result_line(&p.label, p.score))
            .collect();

        let detection = match detections.is_empty() {
            true => vec![NONE_FOUND.to_owned()],
            false => detections
                .iter()
                .map(|d| result_line(&d.label, d.score))
                .collect(),
        };

        Self {
            classification,
            detection,
            objects_found: detections.len(),
        }
    }
}

/// Holds what a page currently shows. Showing a result replaces the previous one.
pub struct ResultBoard<V> {
    current: Mutex<Option<V>>,
}

impl<V: Clone> ResultBoard<V> {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    pub fn clear(&self) {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn show(&self, view: V) -> V {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(view.clone());
        view
    }

    pub fn current(&self) -> Option<V> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<V: Clone> Default for ResultBoard<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Draw detection boxes on a copy of the image.
pub fn draw_detections(image: &RgbImage, detections: &[Detection]) -> RgbImage {
    let mut frame = image.clone();
    let color = Rgb::from([0, 255, 0]);

    for detection in detections {
        let bbox = &detection.bbox;
        let (width, height) = (bbox.width.round() as u32, bbox.height.round() as u32);
        if width == 0 || height == 0 {
            continue;
        }

        let rect = Rect::at(bbox.x.round() as i32, bbox.y.round() as i32).of_size(width, height);
        draw_hollow_rect_mut(&mut frame, rect, color);
    }

    frame
}
