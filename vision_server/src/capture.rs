//! Grabbing frames from the live camera.
//!
use std::sync::Arc;

use cam_capture::MediaStream;
use image::{imageops::FilterType, RgbImage};

use crate::error::AnalysisError;

/// Takes the latest frame of a stream and scales it to the classifier input.
pub struct FrameCapturer {
    width: u32,
    height: u32,
}

impl FrameCapturer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub async fn capture(&self, stream: Arc<dyn MediaStream>) -> Result<RgbImage, AnalysisError> {
        let (width, height) = (self.width, self.height);
        tokio::task::spawn_blocking(move || -> Result<RgbImage, AnalysisError> {
            let jpeg = stream.capture()?;
            let frame = decode_jpeg(&jpeg)?;
            log::debug!(
                "Captured {}x{} frame, scaling to {}x{}",
                frame.width(),
                frame.height(),
                width,
                height
            );
            Ok(image::imageops::resize(
                &frame,
                width,
                height,
                FilterType::Triangle,
            ))
        })
        .await?
    }
}

impl Default for FrameCapturer {
    fn default() -> Self {
        Self::new(224, 224)
    }
}

pub fn decode_jpeg(data: &[u8]) -> Result<RgbImage, AnalysisError> {
    turbojpeg::decompress_image(data).map_err(|err| AnalysisError::Image(err.to_string()))
}

pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, AnalysisError> {
    turbojpeg::compress_image(image, 95, turbojpeg::Subsamp::Sub2x2)
        .map(|buf| buf.to_vec())
        .map_err(|err| AnalysisError::Image(err.to_string()))
}
