//! Transform engine for normalized gaze points
//!
//! Converts the tracker's screen-space gaze point (origin top-left, both axes in `[0, 1]`)
//! into one of two downstream conventions:
//!
//! ```text
//!                   ┌──► Angular ──► (pitch°, yaw°)   VRChat native eye tracking
//! (x, y) ∈ [0,1]² ──┤
//!                   └──► Bipolar ──► (x', y') ∈ [-1,1]²  VRCFT v2 parameters
//! ```
//!
//! The variant is chosen once per process from configuration. Everything in this module is
//! pure and runs inside native callbacks, so nothing here allocates or logs.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Eyelid value reported for an eye that currently delivers valid samples.
pub const OPEN_EYELID: f32 = 0.75;

/// Pupil dilation sent by the bipolar schema.
///
/// The tracker exposes no pupil signal this bridge consumes, so the value is a fixed
/// placeholder and not live telemetry.
pub const PUPIL_DILATION_PLACEHOLDER: f32 = 0.5;

/// Angular limits of the gaze cone in degrees
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct AngularLimits {
    pub max_yaw_deg: f32,
    pub max_pitch_deg: f32,
}

impl Default for AngularLimits {
    fn default() -> Self {
        Self {
            max_yaw_deg: 30.0,
            max_pitch_deg: 25.0,
        }
    }
}

/// Selectable output convention
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputVariant {
    /// Pitch/yaw in degrees, binary blink gate
    #[default]
    Angular,
    /// Signed XY in `[-1, 1]`, per-eye eyelid values
    Bipolar,
}

impl Display for OutputVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputVariant::Angular => write!(f, "Angular"),
            OutputVariant::Bipolar => write!(f, "Bipolar"),
        }
    }
}

/// Active transform, tagged by variant
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Transform {
    Angular(AngularLimits),
    Bipolar,
}

impl Transform {
    pub fn for_variant(variant: OutputVariant, limits: AngularLimits) -> Self {
        match variant {
            OutputVariant::Angular => Transform::Angular(limits),
            OutputVariant::Bipolar => Transform::Bipolar,
        }
    }

    pub fn variant(&self) -> OutputVariant {
        match self {
            Transform::Angular(_) => OutputVariant::Angular,
            Transform::Bipolar => OutputVariant::Bipolar,
        }
    }

    /// Maps a normalized gaze point to `(value_a, value_b)`.
    ///
    /// Angular yields `(pitch, yaw)`, bipolar yields `(x', y')`.
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        match self {
            Transform::Angular(limits) => angular(x, y, limits),
            Transform::Bipolar => bipolar(x, y),
        }
    }
}

/// Returns `(pitch, yaw)` in degrees.
pub fn angular(x: f32, y: f32, limits: &AngularLimits) -> (f32, f32) {
    let yaw = (x - 0.5) * 2.0 * limits.max_yaw_deg;
    let pitch = (y - 0.5) * 2.0 * limits.max_pitch_deg;
    (pitch, yaw)
}

/// Returns `(x', y')` with the vertical axis flipped so that up is positive.
pub fn bipolar(x: f32, y: f32) -> (f32, f32) {
    (x * 2.0 - 1.0, 1.0 - y * 2.0)
}

/// Inverse of [`bipolar`].
pub fn inverse_bipolar(x: f32, y: f32) -> (f32, f32) {
    ((x + 1.0) / 2.0, (1.0 - y) / 2.0)
}

/// Blink state of the angular variant: both eyes invalid at the same time.
pub fn is_blinking(left_valid: bool, right_valid: bool) -> bool {
    !left_valid && !right_valid
}

/// `EyesClosedAmount` for the angular variant. Binary even though the name suggests a range.
pub fn eyes_closed_amount(left_valid: bool, right_valid: bool) -> f32 {
    if is_blinking(left_valid, right_valid) {
        1.0
    } else {
        0.0
    }
}

/// Per-eye eyelid value of the bipolar variant.
pub fn eyelid(valid: bool) -> f32 {
    if valid {
        OPEN_EYELID
    } else {
        0.0
    }
}

pub fn average_eyelid(left: f32, right: f32) -> f32 {
    (left + right) / 2.0
}
