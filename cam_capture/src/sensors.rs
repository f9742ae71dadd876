//! Sensors module.
//!
//! Media capability and its V4L2 implementation.
use std::sync::{Arc, Mutex, PoisonError};

use common::media::{FacingMode, StreamConstraints};
use rscam::{Camera, Config, IntervalInfo, ResolutionInfo};

use crate::CameraError;

/// Pixel format requested from the device. Frames arrive as JPEG.
const FORMAT: &[u8] = b"MJPG";

/// An open camera stream.
pub trait MediaStream: Send + Sync {
    /// Capture the next frame as JPEG bytes.
    fn capture(&self) -> Result<Vec<u8>, CameraError>;

    /// Release the camera. Captures after this fail with [`CameraError::Stopped`].
    fn stop(&self);

    fn is_active(&self) -> bool;
}

/// Negotiates camera streams.
pub trait MediaProvider: Send + Sync {
    /// Open a stream matching the constraints as closely as the device allows. Blocking.
    fn open(&self, constraints: &StreamConstraints) -> Result<Arc<dyn MediaStream>, CameraError>;
}

/// Video devices per facing mode.
#[derive(Clone, Debug)]
pub struct DeviceMap {
    pub user: String,
    pub environment: String,
}

impl DeviceMap {
    pub fn device_for(&self, facing_mode: FacingMode) -> &str {
        match facing_mode {
            FacingMode::User => &self.user,
            FacingMode::Environment => &self.environment,
        }
    }
}

impl Default for DeviceMap {
    fn default() -> Self {
        Self {
            user: "/dev/video1".into(),
            environment: "/dev/video0".into(),
        }
    }
}

/// Cameras on a Linux machine.
pub struct V4l2Provider {
    devices: DeviceMap,
}

impl V4l2Provider {
    pub fn new(devices: DeviceMap) -> Self {
        Self { devices }
    }
}

impl MediaProvider for V4l2Provider {
    fn open(&self, constraints: &StreamConstraints) -> Result<Arc<dyn MediaStream>, CameraError> {
        let device = self.devices.device_for(constraints.facing_mode);
        let mut cam = Camera::new(device).map_err(|err| CameraError::from_io(device, err))?;
        log_supported_formats(&cam);

        let resolutions = cam
            .resolutions(FORMAT)
            .map_err(|err| CameraError::from_rscam(device, err))?;
        log::debug!("Found resolutions: {:?}", &resolutions);
        let resolution = closest_resolution(
            &resolutions,
            (constraints.ideal_width, constraints.ideal_height),
        )
        .ok_or_else(|| CameraError::Device(format!("{device}: no resolution found")))?;

        let intervals = cam
            .intervals(FORMAT, resolution)
            .map_err(|err| CameraError::from_rscam(device, err))?;
        log::debug!("Found frame rates: {:?}", &intervals);
        let interval = fastest_interval(&intervals)
            .ok_or_else(|| CameraError::Device(format!("{device}: no frame rate found")))?;

        cam.start(&Config {
            interval,
            resolution,
            format: FORMAT,
            ..Default::default()
        })
        .map_err(|err| CameraError::from_rscam(device, err))?;

        log::info!(
            "Using camera {} ({}) at {}x{}",
            device,
            constraints.facing_mode,
            resolution.0,
            resolution.1
        );

        Ok(Arc::new(V4l2Stream {
            device: device.to_owned(),
            camera: Mutex::new(Some(cam)),
        }))
    }
}

/// Running V4L2 capture. The camera is released on [`MediaStream::stop`] or drop.
pub struct V4l2Stream {
    device: String,
    camera: Mutex<Option<Camera>>,
}

impl MediaStream for V4l2Stream {
    fn capture(&self) -> Result<Vec<u8>, CameraError> {
        let camera = self.camera.lock().unwrap_or_else(PoisonError::into_inner);
        match camera.as_ref() {
            Some(cam) => cam
                .capture()
                .map(|frame| frame[..].to_vec())
                .map_err(|err| CameraError::from_io(&self.device, err)),
            None => Err(CameraError::Stopped),
        }
    }

    fn stop(&self) {
        let camera = self
            .camera
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut cam) = camera {
            if let Err(err) = cam.stop() {
                log::warn!("Stopping {} failed: {}", &self.device, err);
            }
            log::info!("Released camera {}", &self.device);
        }
    }

    fn is_active(&self) -> bool {
        self.camera
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Pick the supported resolution closest to `ideal`.
pub fn closest_resolution(info: &ResolutionInfo, ideal: (u32, u32)) -> Option<(u32, u32)> {
    match info {
        ResolutionInfo::Discretes(resolutions) => resolutions
            .iter()
            .min_by_key(|(width, height)| {
                let dw = *width as i64 - ideal.0 as i64;
                let dh = *height as i64 - ideal.1 as i64;
                dw * dw + dh * dh
            })
            .copied(),
        ResolutionInfo::Stepwise { min, max, step } => {
            let snap = |ideal: u32, min: u32, max: u32, step: u32| {
                let clamped = ideal.clamp(min, max);
                match step {
                    0 => clamped,
                    step => min + (clamped - min) / step * step,
                }
            };
            Some((
                snap(ideal.0, min.0, max.0, step.0),
                snap(ideal.1, min.1, max.1, step.1),
            ))
        }
    }
}

/// Pick the shortest frame interval, i.e. the highest frame rate.
///
/// Intervals are `(numerator, denominator)` seconds per frame.
pub fn fastest_interval(info: &IntervalInfo) -> Option<(u32, u32)> {
    match info {
        IntervalInfo::Discretes(intervals) => intervals
            .iter()
            .filter(|(numerator, _)| *numerator > 0)
            .max_by(|a, b| {
                let rate_a = a.1 as f64 / a.0 as f64;
                let rate_b = b.1 as f64 / b.0 as f64;
                rate_a.total_cmp(&rate_b)
            })
            .copied(),
        IntervalInfo::Stepwise { min, .. } => Some(*min),
    }
}

fn log_supported_formats(cam: &Camera) {
    let formats: Vec<_> = cam.formats().filter_map(|fmt| fmt.ok()).collect();
    log::debug!(
        "Supported formats: {:?}, using format {:?}",
        formats,
        String::from_utf8_lossy(FORMAT)
    );
}
