//! Camera access for the live-camera page.
//!
//! A [`MediaProvider`] negotiates streams with a device, the [`CameraController`] owns the one
//! active stream and swaps it when the facing mode changes.
pub mod controller;
pub mod error;
pub mod sensors;

pub use controller::{AccessContext, CameraController, CaptureSession};
pub use error::CameraError;
pub use sensors::{DeviceMap, MediaProvider, MediaStream, V4l2Provider};
