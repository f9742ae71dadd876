//! Camera failures.
//!
use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera found at {0}")]
    DeviceNotFound(String),

    #[error("camera requested from an insecure context")]
    InsecureContext,

    #[error("camera stream was stopped")]
    Stopped,

    #[error("camera failure: {0}")]
    Device(String),
}

impl CameraError {
    /// Message shown to the user, one per cause.
    pub fn user_message(&self) -> &'static str {
        match self {
            CameraError::PermissionDenied => {
                "Camera permission denied. Allow camera access and try again."
            }
            CameraError::DeviceNotFound(_) => "No camera found on this device.",
            CameraError::InsecureContext => {
                "Camera access requires a secure context (HTTPS or localhost)."
            }
            CameraError::Stopped | CameraError::Device(_) => "Error accessing the camera.",
        }
    }

    /// Short machine-readable name of the cause.
    pub fn kind(&self) -> &'static str {
        match self {
            CameraError::PermissionDenied => "permission-denied",
            CameraError::DeviceNotFound(_) => "device-not-found",
            CameraError::InsecureContext => "insecure-context",
            CameraError::Stopped | CameraError::Device(_) => "camera-failure",
        }
    }

    /// Classify an I/O error raised while talking to `device`.
    pub fn from_io(device: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => CameraError::PermissionDenied,
            io::ErrorKind::NotFound => CameraError::DeviceNotFound(device.to_owned()),
            _ => CameraError::Device(format!("{device}: {err}")),
        }
    }

    pub fn from_rscam(device: &str, err: rscam::Error) -> Self {
        match err {
            rscam::Error::Io(err) => Self::from_io(device, err),
            other => CameraError::Device(format!("{device}: {other}")),
        }
    }
}
