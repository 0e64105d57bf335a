//! Counters and timers kept in CNC parameters.

use serde::{Deserialize, Serialize};

/// Machined parts count.
pub const PARAM_PARTS_COUNT: u16 = 6711;
/// Power-on time, seconds.
pub const PARAM_POWER_ON_TIME: u16 = 6750;
/// Operating time, seconds.
pub const PARAM_OPERATING_TIME: u16 = 6751;
/// Cutting time, seconds.
pub const PARAM_CUTTING_TIME: u16 = 6753;
/// Cycle time, seconds.
pub const PARAM_CYCLE_TIME: u16 = 6757;

/// Parts counter and machine timers.
///
/// A field is `None` when its parameter could not be read; the failure is
/// logged and the other fields are still filled in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ParameterCounters {
    /// Machined parts.
    pub parts_count: Option<i64>,
    /// Power-on time in seconds.
    pub power_on_secs: Option<i64>,
    /// Operating time in seconds.
    pub operating_secs: Option<i64>,
    /// Cutting time in seconds.
    pub cutting_secs: Option<i64>,
    /// Cycle time in seconds.
    pub cycle_secs: Option<i64>,
}

impl ParameterCounters {
    /// Parameter numbers in field order.
    pub const PARAMETERS: [u16; 5] = [
        PARAM_PARTS_COUNT,
        PARAM_POWER_ON_TIME,
        PARAM_OPERATING_TIME,
        PARAM_CUTTING_TIME,
        PARAM_CYCLE_TIME,
    ];

    /// Builds the counters from values read in [`PARAMETERS`](Self::PARAMETERS) order.
    pub const fn from_values(v: [Option<i64>; 5]) -> Self {
        Self {
            parts_count: v[0],
            power_on_secs: v[1],
            operating_secs: v[2],
            cutting_secs: v[3],
            cycle_secs: v[4],
        }
    }
}

/// Formats seconds as `HH:MM:SS`. Hours are not wrapped.
pub fn format_hms(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hms() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(3_725), "01:02:05");
        assert_eq!(format_hms(400_000), "111:06:40");
        assert_eq!(format_hms(-3), "00:00:00");
    }

    #[test]
    fn values_map_in_parameter_order() {
        let c = ParameterCounters::from_values([Some(12), None, Some(60), None, Some(5)]);
        assert_eq!(c.parts_count, Some(12));
        assert_eq!(c.power_on_secs, None);
        assert_eq!(c.operating_secs, Some(60));
        assert_eq!(c.cycle_secs, Some(5));
    }
}
