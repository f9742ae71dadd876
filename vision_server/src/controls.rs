//! Trigger controls of the pages.
//!
//! A control is enabled when its dependencies are available and no operation it triggered is
//! still running. The page mirrors this state to disable its buttons; the server enforces it.
use std::sync::atomic::{AtomicBool, Ordering};

use common::protocol::Controls;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("operation already in progress")]
    Busy,

    #[error("control is disabled")]
    Unavailable,
}

#[derive(Debug, Default)]
pub struct Control {
    available: AtomicBool,
    busy: AtomicBool,
}

impl Control {
    pub fn available() -> Self {
        Self {
            available: AtomicBool::new(true),
            busy: AtomicBool::new(false),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.available.load(Ordering::SeqCst) && !self.busy.load(Ordering::SeqCst)
    }

    /// Disable the control until the returned guard is dropped.
    pub fn try_acquire(&self) -> Result<ControlGuard<'_>, ControlError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(ControlError::Unavailable);
        }
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ControlError::Busy)?;

        Ok(ControlGuard { control: self })
    }
}

/// Re-enables its control on drop, on success and failure alike.
#[must_use]
pub struct ControlGuard<'a> {
    control: &'a Control,
}

impl Drop for ControlGuard<'_> {
    fn drop(&mut self) {
        self.control.busy.store(false, Ordering::Release);
    }
}

/// All controls of both pages.
#[derive(Debug)]
pub struct ControlPanel {
    pub capture: Control,
    pub switch_camera: Control,
    pub analyze: Control,
}

impl ControlPanel {
    /// Capture and analyze wait for the models, switching the camera is always possible.
    pub fn new() -> Self {
        Self {
            capture: Control::default(),
            switch_camera: Control::available(),
            analyze: Control::default(),
        }
    }

    pub fn snapshot(&self) -> Controls {
        Controls {
            capture: self.capture.is_enabled(),
            switch_camera: self.switch_camera.is_enabled(),
            analyze: self.analyze.is_enabled(),
        }
    }
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self::new()
    }
}
