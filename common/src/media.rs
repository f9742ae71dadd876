//! Camera selection and stream negotiation parameters.
//!
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Which camera to use, named after the browser's `facingMode` values.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera.
    User,
    /// Rear camera.
    #[default]
    Environment,
}

impl FacingMode {
    /// The other camera.
    pub fn toggled(self) -> Self {
        match self {
            FacingMode::User => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FacingMode::User => "user",
            FacingMode::Environment => "environment",
        }
    }
}

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FacingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" | "front" => Ok(FacingMode::User),
            "environment" | "back" => Ok(FacingMode::Environment),
            other => Err(format!(
                "unknown facing mode {other:?}, expected \"user\" or \"environment\""
            )),
        }
    }
}

/// Requested stream configuration. Width and height are ideals, the device picks the
/// closest it supports.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StreamConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing_mode: FacingMode,
}

impl StreamConstraints {
    pub const IDEAL_WIDTH: u32 = 640;
    pub const IDEAL_HEIGHT: u32 = 480;

    pub fn new(facing_mode: FacingMode) -> Self {
        Self {
            ideal_width: Self::IDEAL_WIDTH,
            ideal_height: Self::IDEAL_HEIGHT,
            facing_mode,
        }
    }
}
