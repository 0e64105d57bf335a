//! Axis names and position readouts.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::transport::{RawAxisName, RawPosition};

/// Axis identifier: a letter plus an optional suffix character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub struct AxisName {
    /// Axis letter, e.g. `X`.
    pub name: char,
    /// Suffix, e.g. `1` in `X1`.
    pub suffix: Option<char>,
}

impl AxisName {
    /// Decodes the vendor's two-byte name. NUL and space mean no suffix.
    pub fn from_bytes(name: u8, suffix: u8) -> Self {
        Self {
            name: char::from(name),
            suffix: match suffix {
                0 | b' ' => None,
                s => Some(char::from(s)),
            },
        }
    }
}

impl From<RawAxisName> for AxisName {
    fn from(raw: RawAxisName) -> Self {
        Self::from_bytes(raw.name, raw.suffix)
    }
}

impl fmt::Display for AxisName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.suffix {
            Some(s) => write!(f, "{}{s}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Which coordinate system a position read returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum PositionKind {
    /// Absolute (workpiece) coordinates.
    Absolute,
    /// Relative coordinates.
    Relative,
    /// Machine coordinates.
    Machine,
    /// Remaining distance of the current move.
    DistanceToGo,
}

impl fmt::Display for PositionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Absolute => "absolute",
            Self::Relative => "relative",
            Self::Machine => "machine",
            Self::DistanceToGo => "distance",
        })
    }
}

/// One axis of a position readout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct AxisValue {
    /// Axis the value belongs to.
    pub name: AxisName,
    /// Scaled integer as reported.
    pub raw: i64,
    /// Decimal places in `raw`.
    pub decimals: i16,
    /// `raw / 10^decimals`.
    pub value: f64,
}

impl AxisValue {
    /// Scales a raw position element.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_raw(raw: &RawPosition) -> Self {
        Self {
            name: AxisName::from_bytes(raw.name, raw.suffix),
            raw: raw.data,
            decimals: raw.dec,
            value: raw.data as f64 / 10f64.powi(i32::from(raw.dec)),
        }
    }
}

/// Position readout for the axes the controller reported.
///
/// `values.len()` is authoritative and may be shorter than `requested`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct PositionSnapshot {
    /// Coordinate system.
    pub kind: PositionKind,
    /// Axis count the caller asked for.
    pub requested: usize,
    /// One entry per reported axis, in controller order.
    pub values: Vec<AxisValue>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn axis_name_suffix() {
        assert_eq!(AxisName::from_bytes(b'X', 0).to_string(), "X");
        assert_eq!(AxisName::from_bytes(b'Z', b' ').suffix, None);
        assert_eq!(AxisName::from_bytes(b'Y', b'2').to_string(), "Y2");
    }

    #[test]
    fn scales_by_decimals() {
        let v = AxisValue::from_raw(&RawPosition {
            data: -123_456,
            dec: 3,
            name: b'X',
            suffix: 0,
        });
        assert!((v.value + 123.456).abs() < 1e-9);
        assert_eq!(v.decimals, 3);

        let whole = AxisValue::from_raw(&RawPosition {
            data: 90,
            dec: 0,
            name: b'C',
            suffix: 0,
        });
        assert!((whole.value - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn snapshot_json_shape() {
        let snap = PositionSnapshot {
            kind: PositionKind::DistanceToGo,
            requested: 4,
            values: vec![AxisValue::from_raw(&RawPosition {
                data: 1500,
                dec: 3,
                name: b'Y',
                suffix: b'2',
            })],
        };
        let v = serde_json::to_value(&snap).unwrap();
        assert_eq!(v["kind"], "DistanceToGo");
        assert_eq!(v["requested"], 4);
        assert_eq!(v["values"].as_array().unwrap().len(), 1);
        assert_eq!(v["values"][0]["name"]["name"], "Y");
        assert_eq!(v["values"][0]["name"]["suffix"], "2");
        assert_eq!(v["values"][0]["raw"], 1500);
        assert_eq!(v["values"][0]["decimals"], 3);
        assert!((v["values"][0]["value"].as_f64().unwrap() - 1.5).abs() < 1e-9);
    }
}
