//! Fake cameras and models for driving `AppState` without hardware or ONNX files.
#![allow(dead_code)]

use std::{
    io::Cursor,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Barrier,
    },
};

use cam_capture::{CameraError, MediaProvider, MediaStream};
use common::{
    media::StreamConstraints,
    protocol::{Bbox, Detection, Prediction},
};
use futures::future::BoxFuture;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use vision_server::{
    capture::encode_jpeg,
    models::{Classify, ClassifierOptions, Detect, DetectorOptions, ModelError, ModelProvider},
};

pub fn test_image() -> RgbImage {
    RgbImage::from_pixel(64, 48, Rgb([120, 80, 40]))
}

pub fn png_upload() -> Vec<u8> {
    let mut png = Cursor::new(vec![]);
    DynamicImage::ImageRgb8(test_image())
        .write_to(&mut png, ImageOutputFormat::Png)
        .unwrap();
    png.into_inner()
}

/// Camera whose streams return a fixed JPEG and count how many of them are running.
#[derive(Default)]
pub struct FakeCamera {
    pub active: Arc<AtomicUsize>,
    pub opened: AtomicUsize,
    pub denied: bool,
}

impl FakeCamera {
    pub fn denied() -> Self {
        Self {
            denied: true,
            ..Self::default()
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl MediaProvider for FakeCamera {
    fn open(&self, _constraints: &StreamConstraints) -> Result<Arc<dyn MediaStream>, CameraError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if self.denied {
            return Err(CameraError::PermissionDenied);
        }

        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeStream {
            jpeg: encode_jpeg(&test_image()).unwrap(),
            running: AtomicBool::new(true),
            active: Arc::clone(&self.active),
        }))
    }
}

struct FakeStream {
    jpeg: Vec<u8>,
    running: AtomicBool,
    active: Arc<AtomicUsize>,
}

impl MediaStream for FakeStream {
    fn capture(&self) -> Result<Vec<u8>, CameraError> {
        match self.running.load(Ordering::SeqCst) {
            true => Ok(self.jpeg.clone()),
            false => Err(CameraError::Stopped),
        }
    }

    fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Classifier with canned predictions. With a gate, every call waits at the barrier first.
pub struct FakeClassifier {
    pub predictions: Vec<Prediction>,
    pub fail: bool,
    pub gate: Option<Arc<Barrier>>,
    pub calls: AtomicUsize,
}

impl FakeClassifier {
    pub fn new(predictions: Vec<Prediction>) -> Self {
        Self {
            predictions,
            fail: false,
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(vec![])
        }
    }

    pub fn gated(predictions: Vec<Prediction>, gate: Arc<Barrier>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(predictions)
        }
    }
}

impl Classify for FakeClassifier {
    fn classify(&self, _image: &RgbImage) -> Result<Vec<Prediction>, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        match self.fail {
            true => Err(ModelError::Inference("no output tensor".into())),
            false => Ok(self.predictions.clone()),
        }
    }
}

pub struct FakeDetector {
    pub detections: Vec<Detection>,
}

impl Detect for FakeDetector {
    fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>, ModelError> {
        Ok(self.detections.clone())
    }
}

pub fn face(score: f32) -> Detection {
    Detection::new(
        "face",
        score,
        Bbox {
            x: 4.0,
            y: 4.0,
            width: 20.0,
            height: 16.0,
        },
    )
}

/// Hands out the fake models, or fails loading when `broken`.
pub struct FakeModels {
    pub classifier: Arc<FakeClassifier>,
    pub detector: Arc<FakeDetector>,
    pub broken: bool,
}

impl FakeModels {
    pub fn new(classifier: FakeClassifier, detections: Vec<Detection>) -> Self {
        Self {
            classifier: Arc::new(classifier),
            detector: Arc::new(FakeDetector { detections }),
            broken: false,
        }
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::new(FakeClassifier::new(vec![]), vec![])
        }
    }
}

impl ModelProvider for FakeModels {
    fn load_classifier(
        &self,
        options: ClassifierOptions,
    ) -> BoxFuture<'_, Result<Arc<dyn Classify>, ModelError>> {
        Box::pin(async move {
            assert_eq!(options.version, 2);
            match self.broken {
                true => Err(ModelError::Load("corrupt model file".into())),
                false => Ok(self.classifier.clone() as Arc<dyn Classify>),
            }
        })
    }

    fn load_detector(
        &self,
        _options: DetectorOptions,
    ) -> BoxFuture<'_, Result<Arc<dyn Detect>, ModelError>> {
        Box::pin(async move { Ok(self.detector.clone() as Arc<dyn Detect>) })
    }
}
