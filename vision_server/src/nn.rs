//! ONNX models run with tract.
//!
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use common::protocol::{Bbox, Detection, Prediction};
use futures::future::BoxFuture;
use image::RgbImage;
use itertools::Itertools;
use ndarray::s;
use reqwest::Client;
use tract_onnx::prelude::*;

use crate::{
    models::{ClassifierOptions, Classify, Detect, DetectorOptions, ModelError, ModelProvider},
    utils::fetch_cached,
};

type NnModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Positive additive constant to avoid divide-by-zero.
const EPS: f32 = 1.0e-7;

pub const MOBILENET_URL: &str = "https://github.com/onnx/models/raw/main/validated/vision/classification/mobilenet/model/mobilenetv2-7.onnx";
pub const IMAGENET_LABELS_URL: &str =
    "https://raw.githubusercontent.com/onnx/models/main/validated/vision/classification/synset.txt";
pub const ULTRAFACE_URL: &str = "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/ultraface/models/version-RFB-320.onnx";

/// Classes of the default detector, background first.
const ULTRAFACE_LABELS: [&str; 2] = ["background", "face"];

/// ImageNet normalization, used by MobileNet and good enough for Ultraface.
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Where to get the model files from. Each entry is a URL or a local path.
#[derive(Clone, Debug)]
pub struct ModelSources {
    pub classifier_model: String,
    pub classifier_labels: String,
    pub detector_model: String,
    /// One class per line, background first. Defaults to Ultraface's classes.
    pub detector_labels: Option<String>,
    /// Input size of the detector.
    pub detector_input: (u32, u32),
}

impl Default for ModelSources {
    fn default() -> Self {
        Self {
            classifier_model: MOBILENET_URL.into(),
            classifier_labels: IMAGENET_LABELS_URL.into(),
            detector_model: ULTRAFACE_URL.into(),
            detector_labels: None,
            detector_input: (320, 240),
        }
    }
}

/// Model provider fetching ONNX files into a cache directory and running them with tract.
pub struct TractProvider {
    client: Client,
    model_dir: PathBuf,
    sources: ModelSources,
}

impl TractProvider {
    pub fn new(model_dir: PathBuf, sources: ModelSources) -> Self {
        Self {
            client: Client::new(),
            model_dir,
            sources,
        }
    }

    async fn fetch(&self, source: &str) -> Result<PathBuf, ModelError> {
        fetch_cached(&self.client, source, &self.model_dir).await
    }
}

impl ModelProvider for TractProvider {
    fn load_classifier(
        &self,
        options: ClassifierOptions,
    ) -> BoxFuture<'_, Result<Arc<dyn Classify>, ModelError>> {
        Box::pin(async move {
            if options.version != 2 || options.alpha != 1.0 {
                return Err(ModelError::Load(format!(
                    "MobileNet v{} alpha {} is not available, only v2 alpha 1.0",
                    options.version, options.alpha
                )));
            }
            let model_path = self.fetch(&self.sources.classifier_model).await?;
            let labels_path = self.fetch(&self.sources.classifier_labels).await?;

            let classifier = tokio::task::spawn_blocking(move || {
                let labels = parse_labels(&std::fs::read_to_string(labels_path)?);
                MobileNetClassifier::new(&model_path, labels, options.top_k)
            })
            .await
            .map_err(ModelError::load)??;

            log::info!("Classifier loaded ({} classes)", classifier.labels.len());
            Ok(Arc::new(classifier) as Arc<dyn Classify>)
        })
    }

    fn load_detector(
        &self,
        options: DetectorOptions,
    ) -> BoxFuture<'_, Result<Arc<dyn Detect>, ModelError>> {
        Box::pin(async move {
            let model_path = self.fetch(&self.sources.detector_model).await?;
            let labels_path = match &self.sources.detector_labels {
                Some(source) => Some(self.fetch(source).await?),
                None => None,
            };
            let input = self.sources.detector_input;

            let detector = tokio::task::spawn_blocking(move || {
                let labels = match labels_path {
                    Some(path) => parse_labels(&std::fs::read_to_string(path)?),
                    None => ULTRAFACE_LABELS.iter().map(|l| l.to_string()).collect(),
                };
                SsdDetector::new(&model_path, labels, input, options)
            })
            .await
            .map_err(ModelError::load)??;

            log::info!("Detector loaded ({} classes)", detector.labels.len());
            Ok(Arc::new(detector) as Arc<dyn Detect>)
        })
    }
}

/// MobileNet image classifier.
pub struct MobileNetClassifier {
    model: NnModel,
    labels: Vec<String>,
    top_k: usize,
}

impl MobileNetClassifier {
    const SIZE: u32 = 224;

    pub fn new(model_path: &Path, labels: Vec<String>, top_k: usize) -> Result<Self, ModelError> {
        let model = load_model(model_path, Self::SIZE, Self::SIZE)?;
        Ok(Self {
            model,
            labels,
            top_k,
        })
    }

    fn label(&self, index: usize) -> String {
        self.labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("class {index}"))
    }
}

impl Classify for MobileNetClassifier {
    fn classify(&self, image: &RgbImage) -> Result<Vec<Prediction>, ModelError> {
        let input = preproc(image, Self::SIZE, Self::SIZE);
        let raw_nn_out = self
            .model
            .run(tvec!(input.into()))
            .map_err(ModelError::inference)?;

        let logits: Vec<f32> = raw_nn_out[0]
            .to_array_view::<f32>()
            .map_err(ModelError::inference)?
            .iter()
            .cloned()
            .collect();

        Ok(top_k(&softmax(&logits), self.top_k)
            .into_iter()
            .map(|(index, score)| Prediction::new(self.label(index), score))
            .collect())
    }
}

/// Single-shot detector with outputs `scores [1, N, C]` and `boxes [1, N, 4]`.
///
/// Boxes are normalized corner points `[x_top_left, y_top_left, x_bottom_right,
/// y_bottom_right]`, class 0 is the background. Ultraface has this layout.
pub struct SsdDetector {
    model: NnModel,
    labels: Vec<String>,
    width: u32,
    height: u32,
    options: DetectorOptions,
}

impl SsdDetector {
    pub fn new(
        model_path: &Path,
        labels: Vec<String>,
        (width, height): (u32, u32),
        options: DetectorOptions,
    ) -> Result<Self, ModelError> {
        let model = load_model(model_path, width, height)?;
        Ok(Self {
            model,
            labels,
            width,
            height,
            options,
        })
    }

    fn postproc(
        &self,
        scores: &Tensor,
        boxes: &Tensor,
        image_width: u32,
        image_height: u32,
    ) -> Result<Vec<Detection>, ModelError> {
        let scores = scores
            .to_array_view::<f32>()
            .map_err(ModelError::inference)?;
        let num_classes = scores.shape().last().copied().unwrap_or(0);

        let coords: Vec<f32> = boxes
            .to_array_view::<f32>()
            .map_err(ModelError::inference)?
            .iter()
            .cloned()
            .collect();
        let bboxes: Vec<[f32; 4]> = coords
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect();

        let mut detections = vec![];
        for class in 1..num_classes {
            let candidates: Vec<(f32, [f32; 4])> = scores
                .slice(s![0, .., class])
                .iter()
                .zip(bboxes.iter())
                .filter(|(confidence, _)| **confidence > self.options.min_score)
                .map(|(confidence, bbox)| (*confidence, *bbox))
                .collect();

            let label = self
                .labels
                .get(class)
                .cloned()
                .unwrap_or_else(|| format!("class {class}"));

            for (confidence, bbox) in non_maximum_suppression(candidates, self.options.max_iou) {
                detections.push(Detection::new(
                    label.clone(),
                    confidence,
                    to_pixels(&bbox, image_width, image_height),
                ));
            }
        }

        detections.sort_by(|a, b| b.score.total_cmp(&a.score));
        detections.truncate(self.options.max_detections);
        Ok(detections)
    }
}

impl Detect for SsdDetector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, ModelError> {
        let input = preproc(image, self.width, self.height);
        let raw_nn_out = self
            .model
            .run(tvec!(input.into()))
            .map_err(ModelError::inference)?;

        if raw_nn_out.len() < 2 {
            return Err(ModelError::Inference(format!(
                "expected scores and boxes, model returned {} outputs",
                raw_nn_out.len()
            )));
        }

        self.postproc(
            &raw_nn_out[0],
            &raw_nn_out[1],
            image.width(),
            image.height(),
        )
    }
}

fn load_model(model_path: &Path, width: u32, height: u32) -> Result<NnModel, ModelError> {
    let input_fact = InferenceFact::dt_shape(
        f32::datum_type(),
        tvec!(1, 3, height as usize, width as usize),
    );
    tract_onnx::onnx()
        .model_for_path(model_path)
        .and_then(|model| model.with_input_fact(0, input_fact))
        .and_then(|model| model.into_optimized())
        .and_then(|model| model.into_runnable())
        .map_err(|err| ModelError::Load(format!("{}: {}", model_path.display(), err)))
}

/// Resize and normalize an image into a `[1, 3, height, width]` tensor.
fn preproc(image: &RgbImage, width: u32, height: u32) -> Tensor {
    let resized: RgbImage =
        image::imageops::resize(image, width, height, image::imageops::FilterType::Triangle);

    tract_ndarray::Array4::from_shape_fn(
        (1, 3, height as usize, width as usize),
        |(_, c, y, x)| (resized[(x as _, y as _)][c] as f32 / 255.0 - MEAN[c]) / STD[c],
    )
    .into()
}

/// Parse a label file with one class per line. A leading WordNet id (`n01440764 tench`) is
/// dropped.
pub fn parse_labels(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once(' ') {
            Some((id, label)) if is_wordnet_id(id) => label.trim().to_owned(),
            _ => line.to_owned(),
        })
        .collect()
}

fn is_wordnet_id(token: &str) -> bool {
    token.len() == 9
        && token.starts_with('n')
        && token[1..].chars().all(|c| c.is_ascii_digit())
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|x| x / (sum + EPS)).collect()
}

/// Indices and values of the `k` largest values, descending.
pub fn top_k(values: &[f32], k: usize) -> Vec<(usize, f32)> {
    values
        .iter()
        .cloned()
        .enumerate()
        .sorted_by(|a, b| b.1.total_cmp(&a.1))
        .take(k)
        .collect()
}

/// Run non-maximum-suppression on candidate bounding boxes.
///
/// Start with the most confident bounding box and iterate over all other bounding boxes in the
/// order of sinking confidence. Keep only those candidates which do not have an IoU above
/// `max_iou` with an already selected bounding box.
pub fn non_maximum_suppression(
    mut candidates: Vec<(f32, [f32; 4])>,
    max_iou: f32,
) -> Vec<(f32, [f32; 4])> {
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut selected: Vec<(f32, [f32; 4])> = vec![];
    for (confidence, bbox) in candidates {
        if selected
            .iter()
            .all(|(_, selected_bbox)| iou(&bbox, selected_bbox) <= max_iou)
        {
            selected.push((confidence, bbox));
        }
    }

    selected
}

/// Calculate the intersection-over-union metric for two bounding boxes.
pub fn iou(bbox_a: &[f32; 4], bbox_b: &[f32; 4]) -> f32 {
    // If the boxes do not overlap, the overlap box is ill defined and its area zero
    let overlap_box: [f32; 4] = [
        f32::max(bbox_a[0], bbox_b[0]),
        f32::max(bbox_a[1], bbox_b[1]),
        f32::min(bbox_a[2], bbox_b[2]),
        f32::min(bbox_a[3], bbox_b[3]),
    ];

    let overlap_area = bbox_area(&overlap_box);

    overlap_area / (bbox_area(bbox_a) + bbox_area(bbox_b) - overlap_area + EPS)
}

/// Area of `[x_top_left, y_top_left, x_bottom_right, y_bottom_right]`, zero if ill-defined.
fn bbox_area(bbox: &[f32; 4]) -> f32 {
    let width = bbox[2] - bbox[0];
    let height = bbox[3] - bbox[1];
    if width < 0.0 || height < 0.0 {
        return 0.0;
    }

    width * height
}

/// Scale normalized corner points to a pixel box on an image of the given size.
fn to_pixels(bbox: &[f32; 4], width: u32, height: u32) -> Bbox {
    let (width, height) = (width as f32, height as f32);
    let x_tl = bbox[0].clamp(0.0, 1.0) * width;
    let y_tl = bbox[1].clamp(0.0, 1.0) * height;
    let x_br = bbox[2].clamp(0.0, 1.0) * width;
    let y_br = bbox[3].clamp(0.0, 1.0) * height;

    Bbox {
        x: x_tl,
        y: y_tl,
        width: (x_br - x_tl).max(0.0),
        height: (y_br - y_tl).max(0.0),
    }
}
