//! Command line configuration of the server.
//!
use std::path::PathBuf;

use cam_capture::DeviceMap;
use clap::Parser;
use common::media::FacingMode;

use crate::{
    models::{ClassifierOptions, DetectorOptions},
    nn::{ModelSources, IMAGENET_LABELS_URL, MOBILENET_URL, ULTRAFACE_URL},
};

#[derive(Parser, Debug)]
#[clap(author, version)]
pub struct Args {
    /// Address to serve the pages on
    #[clap(long, default_value = "127.0.0.1:3000")]
    pub server_address: String,

    /// Video device of the rear camera
    #[clap(long, default_value = "/dev/video0")]
    pub environment_device: String,

    /// Video device of the front camera
    #[clap(long, default_value = "/dev/video1")]
    pub user_device: String,

    /// Camera to start with, `user` or `environment`
    #[clap(long, default_value = "environment")]
    pub facing_mode: FacingMode,

    /// Let clients on other machines operate the camera without TLS in front
    #[clap(long)]
    pub trust_remote: bool,

    /// Where downloaded models are cached
    #[clap(long)]
    pub model_dir: Option<PathBuf>,

    /// URL or path of the classifier ONNX model
    #[clap(long, default_value = MOBILENET_URL)]
    pub classifier_model: String,

    /// URL or path of the classifier labels, one per line
    #[clap(long, default_value = IMAGENET_LABELS_URL)]
    pub classifier_labels: String,

    /// Number of predictions shown per image
    #[clap(long, default_value_t = 3)]
    pub top_k: usize,

    /// URL or path of the detector ONNX model
    #[clap(long, default_value = ULTRAFACE_URL)]
    pub detector_model: String,

    /// URL or path of the detector labels, background first
    #[clap(long)]
    pub detector_labels: Option<String>,

    /// Input width of the detector
    #[clap(long, default_value_t = 320)]
    pub detector_width: u32,

    /// Input height of the detector
    #[clap(long, default_value_t = 240)]
    pub detector_height: u32,

    /// Minimum score of a detection
    #[clap(long, default_value_t = 0.5)]
    pub min_score: f32,

    /// Maximum overlap of two detections of the same class
    #[clap(long, default_value_t = 0.5)]
    pub max_iou: f32,

    /// Maximum number of detections per image
    #[clap(long, default_value_t = 20)]
    pub max_detections: usize,
}

impl Args {
    pub fn device_map(&self) -> DeviceMap {
        DeviceMap {
            user: self.user_device.clone(),
            environment: self.environment_device.clone(),
        }
    }

    /// Configured model directory, or `vision_pages` in the user's cache directory.
    pub fn model_dir(&self) -> PathBuf {
        match &self.model_dir {
            Some(dir) => dir.clone(),
            None => dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("vision_pages"),
        }
    }

    pub fn model_sources(&self) -> ModelSources {
        ModelSources {
            classifier_model: self.classifier_model.clone(),
            classifier_labels: self.classifier_labels.clone(),
            detector_model: self.detector_model.clone(),
            detector_labels: self.detector_labels.clone(),
            detector_input: (self.detector_width, self.detector_height),
        }
    }

    pub fn classifier_options(&self) -> ClassifierOptions {
        ClassifierOptions {
            top_k: self.top_k,
            ..ClassifierOptions::default()
        }
    }

    pub fn detector_options(&self) -> DetectorOptions {
        DetectorOptions {
            min_score: self.min_score,
            max_iou: self.max_iou,
            max_detections: self.max_detections,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_match_model_defaults() {
        let args = Args::try_parse_from(["vision_pages"]).unwrap();

        assert_eq!(args.server_address, "127.0.0.1:3000");
        assert_eq!(args.facing_mode, FacingMode::Environment);
        assert!(!args.trust_remote);
        assert_eq!(args.classifier_options(), ClassifierOptions::default());
        assert_eq!(args.detector_options(), DetectorOptions::default());
        assert_eq!(args.device_map().device_for(FacingMode::User), "/dev/video1");

        let sources = args.model_sources();
        let defaults = ModelSources::default();
        assert_eq!(sources.classifier_model, defaults.classifier_model);
        assert_eq!(sources.detector_model, defaults.detector_model);
        assert_eq!(sources.detector_input, defaults.detector_input);
        assert!(args.model_dir().ends_with("vision_pages"));
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "vision_pages",
            "--facing-mode",
            "user",
            "--user-device",
            "/dev/video4",
            "--model-dir",
            "/tmp/models",
            "--top-k",
            "5",
            "--min-score",
            "0.7",
            "--trust-remote",
        ])
        .unwrap();

        assert_eq!(args.facing_mode, FacingMode::User);
        assert_eq!(args.device_map().device_for(FacingMode::User), "/dev/video4");
        assert_eq!(args.model_dir(), PathBuf::from("/tmp/models"));
        assert_eq!(args.classifier_options().top_k, 5);
        assert_eq!(args.detector_options().min_score, 0.7);
        assert!(args.trust_remote);
    }

    #[test]
    fn test_unknown_facing_mode_is_rejected() {
        assert!(Args::try_parse_from(["vision_pages", "--facing-mode", "sideways"]).is_err());
    }
}
