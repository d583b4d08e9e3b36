//! # RC Override Module
//!
//! The RC override vector sent with `SET_RAW_RC`, plus conversions from
//! percentages to raw stick values.
//!
//! ## Wire Order
//!
//! | Index | Channel |
//! |-------|---------|
//! | 0 | Roll |
//! | 1 | Pitch |
//! | 2 | Throttle |
//! | 3 | Yaw |
//! | 4-7 | AUX1-AUX4 |
//!
//! ## Value Ranges
//!
//! Every channel is a pulse width in microseconds, 1000-2000, with 1500 as
//! stick center.
//!
//! ## Usage
//!
//! ```
//! use msp_client::control::rc::{RcOverride, throttle_percent_to_raw};
//!
//! let rc = RcOverride::neutral(throttle_percent_to_raw(50.0, 1000, 2000));
//! assert_eq!(rc.to_fields(), [1500, 1500, 1500, 1500, 1000, 1000, 1000, 1000]);
//! ```

use serde::Serialize;

/// Lowest valid channel value.
pub const RC_MIN: u16 = 1000;

/// Highest valid channel value.
pub const RC_MAX: u16 = 2000;

/// Stick center.
pub const RC_CENTER: u16 = 1500;

/// Throttle sent when no other value has been commanded.
pub const RC_DEFAULT_THROTTLE: u16 = 1100;

/// Number of auxiliary channels carried after the four primary axes.
pub const RC_AUX_CHANNELS: usize = 4;

/// Number of channels in one `SET_RAW_RC` payload.
pub const RC_OVERRIDE_CHANNELS: usize = 4 + RC_AUX_CHANNELS;

/// Channel indices in `SET_RAW_RC` wire order.
pub mod channels {
    /// Roll
    pub const ROLL: usize = 0;
    /// Pitch
    pub const PITCH: usize = 1;
    /// Throttle
    pub const THROTTLE: usize = 2;
    /// Yaw
    pub const YAW: usize = 3;
    /// First auxiliary channel
    pub const AUX1: usize = 4;
}

/// Last commanded RC state.
///
/// This is what the host most recently sent, not what the vehicle is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RcOverride {
    pub roll: u16,
    pub pitch: u16,
    pub yaw: u16,
    pub throttle: u16,
    pub aux: [u16; RC_AUX_CHANNELS],
}

impl Default for RcOverride {
    fn default() -> Self {
        Self::neutral(RC_DEFAULT_THROTTLE)
    }
}

impl RcOverride {
    /// Sticks centered at the given throttle, aux channels low.
    #[must_use]
    pub fn neutral(throttle: u16) -> Self {
        Self {
            roll: RC_CENTER,
            pitch: RC_CENTER,
            yaw: RC_CENTER,
            throttle: clamp_channel_value(throttle),
            aux: [RC_MIN; RC_AUX_CHANNELS],
        }
    }

    /// Replaces the four primary axes, clamping each into range.
    pub fn set_axes(&mut self, roll: u16, pitch: u16, yaw: u16, throttle: u16) {
        self.roll = clamp_channel_value(roll);
        self.pitch = clamp_channel_value(pitch);
        self.yaw = clamp_channel_value(yaw);
        self.throttle = clamp_channel_value(throttle);
    }

    /// Replaces all auxiliary channels.
    pub fn set_aux(&mut self, aux: [u16; RC_AUX_CHANNELS]) {
        self.aux = aux.map(clamp_channel_value);
    }

    /// Channel values in `SET_RAW_RC` wire order.
    #[must_use]
    pub fn to_fields(&self) -> [i64; RC_OVERRIDE_CHANNELS] {
        let mut fields = [0i64; RC_OVERRIDE_CHANNELS];
        fields[channels::ROLL] = self.roll as i64;
        fields[channels::PITCH] = self.pitch as i64;
        fields[channels::THROTTLE] = self.throttle as i64;
        fields[channels::YAW] = self.yaw as i64;
        for (i, &value) in self.aux.iter().enumerate() {
            fields[channels::AUX1 + i] = value as i64;
        }
        fields
    }
}

/// Clamp a channel value into 1000-2000
pub fn clamp_channel_value(value: u16) -> u16 {
    value.clamp(RC_MIN, RC_MAX)
}

/// Convert a throttle percentage (0-100) to a raw channel value.
///
/// The result is `floor(min + percent / 100 * (max - min))`. Percentages
/// outside 0-100 are clamped.
///
/// # Examples
///
/// ```
/// use msp_client::control::rc::throttle_percent_to_raw;
///
/// assert_eq!(throttle_percent_to_raw(0.0, 1000, 2000), 1000);
/// assert_eq!(throttle_percent_to_raw(75.0, 1000, 2000), 1750);
/// ```
pub fn throttle_percent_to_raw(percent: f32, min: u16, max: u16) -> u16 {
    let percent = percent.clamp(0.0, 100.0) as f64;
    let range = max.saturating_sub(min) as f64;
    (min as f64 + percent / 100.0 * range).floor() as u16
}

/// Convert a signed percentage (-100 to 100) to a roll/pitch/yaw value.
///
/// Negative values scale between `neutral` and `min`, positive values
/// between `neutral` and `max`.
///
/// # Examples
///
/// ```
/// use msp_client::control::rc::signed_percent_to_rpy;
///
/// assert_eq!(signed_percent_to_rpy(-50.0, 1000, 2000, 1500), 1250);
/// assert_eq!(signed_percent_to_rpy(100.0, 1000, 2000, 1500), 2000);
/// ```
pub fn signed_percent_to_rpy(percent: f32, min: u16, max: u16, neutral: u16) -> u16 {
    let percent = percent.clamp(-100.0, 100.0) as f64;
    let span = if percent < 0.0 {
        neutral.saturating_sub(min)
    } else {
        max.saturating_sub(neutral)
    };
    let range = span as f64;
    (neutral as f64 + percent / 100.0 * range).floor() as u16
}
