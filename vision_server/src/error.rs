//! Errors of the page operations.
//!
use cam_capture::CameraError;
use thiserror::Error;

use crate::{controls::ControlError, models::ModelError};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error("no file selected")]
    NoFile,

    #[error("image codec error: {0}")]
    Image(String),

    #[error("camera is not running")]
    NoStream,

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AnalysisError {
    /// Short machine-readable name of the cause.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::Camera(err) => err.kind(),
            AnalysisError::Model(err) => err.kind(),
            AnalysisError::Control(ControlError::Busy) => "busy",
            AnalysisError::Control(ControlError::Unavailable) => "unavailable",
            AnalysisError::NoFile => "no-file",
            AnalysisError::Image(_) | AnalysisError::NoStream | AnalysisError::Task(_) => {
                "inference-failure"
            }
        }
    }

    /// Message shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::Camera(err) => err.user_message().to_owned(),
            AnalysisError::Model(ModelError::Inference(_)) => "Error processing the image".into(),
            AnalysisError::Model(_) => "Error loading model".into(),
            AnalysisError::Control(ControlError::Busy) => "Please wait for the current analysis to finish.".into(),
            AnalysisError::Control(ControlError::Unavailable) => "The model is not loaded.".into(),
            AnalysisError::NoFile => "Select an image first.".into(),
            AnalysisError::Image(_) => "Could not read the image.".into(),
            AnalysisError::NoStream => "The camera is not running.".into(),
            AnalysisError::Task(_) => "Error processing the image".into(),
        }
    }
}
