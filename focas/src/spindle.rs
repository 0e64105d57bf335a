//! Spindle load, speed and override.

use serde::{Deserialize, Serialize};

use crate::transport::RawSpindle;

/// Spindles requested from `cnc_rdspmeter`.
pub const MAX_SPINDLES: usize = 8;

/// Full scale of a raw spindle override value.
const OVERRIDE_FULL_SCALE: f64 = 16383.0;

/// One spindle's meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct SpindleInfo {
    /// Spindle number, starting at 1.
    pub number: u16,
    /// Load in percent.
    pub load: f64,
    /// Speed in rpm.
    pub speed: f64,
    /// Override in percent; `None` when the controller did not report it.
    pub override_percent: Option<u16>,
}

impl SpindleInfo {
    /// Decodes spindle `index` (zero-based). `raw_override` is the
    /// `cnc_rdspload` value for the same spindle.
    pub fn from_raw(index: usize, raw: &RawSpindle, raw_override: Option<i16>) -> Self {
        Self {
            number: u16::try_from(index + 1).unwrap_or(u16::MAX),
            load: scaled(raw.load, raw.load_dec),
            speed: scaled(raw.speed, raw.speed_dec),
            override_percent: raw_override.map(override_percent),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn scaled(data: i64, dec: i16) -> f64 {
    data as f64 / 10f64.powi(i32::from(dec))
}

/// Scales a raw override (0..=16383) to a whole percentage.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn override_percent(raw: i16) -> u16 {
    let clamped = f64::from(raw.max(0));
    (clamped / OVERRIDE_FULL_SCALE * 100.0).round() as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_scale() {
        assert_eq!(override_percent(16383), 100);
        assert_eq!(override_percent(8192), 50);
        assert_eq!(override_percent(0), 0);
        assert_eq!(override_percent(-5), 0);
    }

    #[test]
    fn decodes_meters() {
        let raw = RawSpindle {
            load: 425,
            load_dec: 1,
            speed: 1200,
            speed_dec: 0,
        };
        let s = SpindleInfo::from_raw(0, &raw, Some(16383));
        assert_eq!(s.number, 1);
        assert!((s.load - 42.5).abs() < f64::EPSILON);
        assert!((s.speed - 1200.0).abs() < f64::EPSILON);
        assert_eq!(s.override_percent, Some(100));
        assert_eq!(SpindleInfo::from_raw(1, &raw, None).override_percent, None);
    }
}
