//! Model capabilities and the adapters the pages call them through.
//!
use std::{fmt::Display, sync::Arc};

use common::{
    protocol::{Detection, Prediction, Status},
    status::StatusIndicator,
};
use futures::future::BoxFuture;
use image::RgbImage;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to load model: {0}")]
    Load(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

impl ModelError {
    pub fn load(err: impl Display) -> Self {
        ModelError::Load(err.to_string())
    }

    pub fn inference(err: impl Display) -> Self {
        ModelError::Inference(err.to_string())
    }

    /// Short machine-readable name of the cause.
    pub fn kind(&self) -> &'static str {
        match self {
            ModelError::Inference(_) => "inference-failure",
            _ => "model-load-failure",
        }
    }
}

/// Maps an image to labels with confidences.
pub trait Classify: Send + Sync {
    /// Blocking.
    fn classify(&self, image: &RgbImage) -> Result<Vec<Prediction>, ModelError>;
}

/// Maps an image to labeled regions with confidences.
pub trait Detect: Send + Sync {
    /// Blocking. An empty result means nothing was found.
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, ModelError>;
}

/// Loads models, possibly fetching them over the network first.
pub trait ModelProvider: Send + Sync {
    fn load_classifier(
        &self,
        options: ClassifierOptions,
    ) -> BoxFuture<'_, Result<Arc<dyn Classify>, ModelError>>;

    fn load_detector(
        &self,
        options: DetectorOptions,
    ) -> BoxFuture<'_, Result<Arc<dyn Detect>, ModelError>>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassifierOptions {
    /// MobileNet version.
    pub version: u8,
    /// MobileNet width multiplier.
    pub alpha: f32,
    /// Number of predictions returned per image.
    pub top_k: usize,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            version: 2,
            alpha: 1.0,
            top_k: 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DetectorOptions {
    pub min_score: f32,
    pub max_iou: f32,
    pub max_detections: usize,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            min_score: 0.5,
            max_iou: 0.5,
            max_detections: 20,
        }
    }
}

/// Loaded classifier and detector.
///
/// Calls on the same model never overlap: a call waits for the one in flight to finish.
pub struct Models {
    classifier: Arc<dyn Classify>,
    detector: Arc<dyn Detect>,
    classifier_turn: Mutex<()>,
    detector_turn: Mutex<()>,
}

impl Models {
    pub fn new(classifier: Arc<dyn Classify>, detector: Arc<dyn Detect>) -> Self {
        Self {
            classifier,
            detector,
            classifier_turn: Mutex::new(()),
            detector_turn: Mutex::new(()),
        }
    }

    /// Load every model, reporting progress on `status`. Failure is final for the session.
    pub async fn load_all(
        provider: &dyn ModelProvider,
        classifier: ClassifierOptions,
        detector: DetectorOptions,
        status: &StatusIndicator,
    ) -> Result<Self, ModelError> {
        status.set(Status::loading("Loading AI model..."));

        let loaded = futures::future::try_join(
            provider.load_classifier(classifier),
            provider.load_detector(detector),
        )
        .await;

        match loaded {
            Ok((classifier, detector)) => {
                log::info!("Models loaded");
                status.set(Status::ready("Model loaded. Ready to classify."));
                Ok(Self::new(classifier, detector))
            }
            Err(err) => {
                log::error!("Error loading model: {}", err);
                status.set(Status::error("Error loading model"));
                Err(err)
            }
        }
    }

    /// Predictions ranked by descending score.
    pub async fn classify(&self, image: Arc<RgbImage>) -> Result<Vec<Prediction>, ModelError> {
        let _turn = self.classifier_turn.lock().await;
        let classifier = Arc::clone(&self.classifier);
        let mut predictions = tokio::task::spawn_blocking(move || classifier.classify(&image))
            .await
            .map_err(ModelError::inference)??;

        // Stable, so equal scores keep the model's order
        predictions.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(predictions)
    }

    pub async fn detect(&self, image: Arc<RgbImage>) -> Result<Vec<Detection>, ModelError> {
        let _turn = self.detector_turn.lock().await;
        let detector = Arc::clone(&self.detector);
        tokio::task::spawn_blocking(move || detector.detect(&image))
            .await
            .map_err(ModelError::inference)?
    }
}
