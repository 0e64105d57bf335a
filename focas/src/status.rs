//! Machine status and system information snapshots.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::transport::{RawStatus, RawSysInfo};

/// Declares a status field enum that preserves unrecognised raw values.
macro_rules! status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $raw:literal => $label:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[non_exhaustive]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
            /// Value outside the documented range.
            Unknown(i16),
        }

        impl $name {
            /// Decodes the raw status field.
            pub const fn from_raw(raw: i16) -> Self {
                match raw {
                    $( $raw => Self::$variant, )+
                    other => Self::Unknown(other),
                }
            }

            /// The raw status field.
            pub const fn raw(self) -> i16 {
                match self {
                    $( Self::$variant => $raw, )+
                    Self::Unknown(raw) => raw,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $( Self::$variant => f.write_str($label), )+
                    Self::Unknown(raw) => write!(f, "?({raw})"),
                }
            }
        }
    };
}

pub(crate) use status_enum;

status_enum! {
    /// Lathe or machining-center control.
    TmMode {
        /// Lathe (T series).
        Lathe = 0 => "T",
        /// Machining center (M series).
        Mill = 1 => "M",
    }
}

status_enum! {
    /// Selected operating mode.
    AutoMode {
        /// Manual data input.
        Mdi = 0 => "MDI",
        /// Memory operation.
        Memory = 1 => "MEM",
        /// No mode selected.
        NoSelection = 2 => "****",
        /// Program edit.
        Edit = 3 => "EDIT",
        /// Manual handwheel feed.
        Handwheel = 4 => "HND",
        /// Jog feed.
        Jog = 5 => "JOG",
        /// Teach in jog.
        TeachInJog = 6 => "T-JOG",
        /// Teach in handwheel.
        TeachInHandwheel = 7 => "T-HND",
        /// Incremental feed.
        IncrementalFeed = 8 => "INC",
        /// Reference point return.
        Reference = 9 => "REF",
        /// Remote (DNC) operation.
        Remote = 10 => "RMT",
    }
}

status_enum! {
    /// Automatic operation state.
    RunState {
        /// Reset.
        Reset = 0 => "RESET",
        /// Stopped.
        Stop = 1 => "STOP",
        /// Feed hold.
        Hold = 2 => "HOLD",
        /// Cycle running.
        Start = 3 => "START",
        /// Manual numerical command start.
        Mstr = 4 => "MSTR",
    }
}

status_enum! {
    /// Axis motion state.
    Motion {
        /// No motion.
        Idle = 0 => "***",
        /// Axes moving.
        Moving = 1 => "MTN",
        /// Dwell.
        Dwell = 2 => "DWL",
    }
}

status_enum! {
    /// Emergency stop state.
    Emergency {
        /// Not in emergency.
        Clear = 0 => "----",
        /// Emergency stop.
        Emergency = 1 => "EMG",
        /// Reset signal active.
        Reset = 2 => "RESET",
        /// Waiting (FS35i only).
        Wait = 3 => "WAIT",
    }
}

status_enum! {
    /// Alarm state.
    AlarmState {
        /// No alarm.
        Clear = 0 => "---",
        /// Alarm.
        Alarm = 1 => "ALM",
        /// Battery low.
        BatteryLow = 2 => "BAT",
        /// Fan failure.
        Fan = 3 => "FAN",
        /// Power supply alarm.
        PowerSupply = 4 => "PS",
        /// FSSB bus alarm.
        Fssb = 5 => "FSSB",
        /// Insulation degradation.
        Insulation = 6 => "INSU",
        /// Encoder alarm.
        Encoder = 7 => "ENC",
        /// PMC alarm.
        Pmc = 8 => "PMC",
    }
}

/// Point-in-time controller status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct MachineStatus {
    /// T or M control.
    pub tm_mode: TmMode,
    /// Selected operating mode.
    pub mode: AutoMode,
    /// Automatic operation state.
    pub run: RunState,
    /// Axis motion state.
    pub motion: Motion,
    /// M/S/T/B function finish signal.
    pub mstb_fin: bool,
    /// Emergency stop state.
    pub emergency: Emergency,
    /// Alarm state.
    pub alarm: AlarmState,
    /// Raw edit-state code; meaning depends on the control series.
    pub edit: i16,
}

impl MachineStatus {
    /// Decodes a raw status record.
    pub const fn from_raw(raw: &RawStatus) -> Self {
        Self {
            tm_mode: TmMode::from_raw(raw.tmmode),
            mode: AutoMode::from_raw(raw.aut),
            run: RunState::from_raw(raw.run),
            motion: Motion::from_raw(raw.motion),
            mstb_fin: raw.mstb == 1,
            emergency: Emergency::from_raw(raw.emergency),
            alarm: AlarmState::from_raw(raw.alarm),
            edit: raw.edit,
        }
    }

    /// A program cycle is executing.
    pub const fn is_running(&self) -> bool {
        matches!(self.run, RunState::Start)
    }

    /// Any alarm or emergency condition is present.
    pub const fn is_faulted(&self) -> bool {
        !matches!(self.alarm, AlarmState::Clear) || !matches!(self.emergency, Emergency::Clear)
    }
}

/// Controller identification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct SystemInfo {
    /// CNC type, e.g. `"30"` or `" 0"`.
    pub cnc_type: String,
    /// Machine type, e.g. `"M"` or `"T"`.
    pub mt_type: String,
    /// Software series.
    pub series: String,
    /// Software version.
    pub version: String,
    /// Maximum number of controlled axes.
    pub max_axes: u16,
    /// Currently controlled axes; `None` when the field is not numeric.
    pub axes: Option<u16>,
    /// Raw additional-info flags.
    pub additional_info: i16,
}

impl SystemInfo {
    /// Decodes a raw system info record.
    pub fn from_raw(raw: &RawSysInfo) -> Self {
        let axes_text = decode_ascii(&raw.axes);
        Self {
            cnc_type: decode_ascii(&raw.cnc_type),
            mt_type: decode_ascii(&raw.mt_type),
            series: decode_ascii(&raw.series),
            version: decode_ascii(&raw.version),
            max_axes: u16::try_from(raw.max_axis).unwrap_or(0),
            axes: axes_text.parse().ok(),
            additional_info: raw.addinfo,
        }
    }

    /// Human-readable model line.
    pub fn model(&self) -> String {
        format!("Series {} Version {}", self.series, self.version)
    }
}

/// Decodes a fixed-width ASCII field: stops at NUL, trims padding.
pub(crate) fn decode_ascii(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn raw_status() -> RawStatus {
        RawStatus {
            tmmode: 1,
            aut: 1,
            run: 3,
            motion: 1,
            mstb: 0,
            emergency: 0,
            alarm: 0,
            edit: 0,
        }
    }

    #[test]
    fn decodes_running_status() {
        let status = MachineStatus::from_raw(&raw_status());
        assert_eq!(status.tm_mode, TmMode::Mill);
        assert_eq!(status.mode, AutoMode::Memory);
        assert_eq!(status.run, RunState::Start);
        assert_eq!(status.motion, Motion::Moving);
        assert!(status.is_running());
        assert!(!status.is_faulted());
        assert!(!status.mstb_fin);
    }

    #[test]
    fn preserves_unknown_values() {
        let raw = RawStatus {
            aut: 42,
            alarm: 9,
            ..raw_status()
        };
        let status = MachineStatus::from_raw(&raw);
        assert_eq!(status.mode, AutoMode::Unknown(42));
        assert_eq!(status.mode.raw(), 42);
        assert_eq!(status.alarm.to_string(), "?(9)");
        assert!(status.is_faulted());
    }

    #[test]
    fn status_json_shape() {
        let raw = RawStatus {
            alarm: 9,
            ..raw_status()
        };
        let v = serde_json::to_value(MachineStatus::from_raw(&raw)).unwrap();
        assert_eq!(v["mode"], "Memory");
        assert_eq!(v["run"], "Start");
        assert_eq!(v["alarm"]["Unknown"], 9);
        assert_eq!(v["mstb_fin"], false);
        assert_eq!(v["edit"], 0);
        let back: MachineStatus = serde_json::from_value(v).unwrap();
        assert_eq!(back.alarm, AlarmState::Unknown(9));
    }

    #[test]
    fn labels() {
        assert_eq!(AutoMode::Edit.to_string(), "EDIT");
        assert_eq!(Emergency::Emergency.to_string(), "EMG");
        assert_eq!(AlarmState::BatteryLow.to_string(), "BAT");
        assert_eq!(RunState::from_raw(2), RunState::Hold);
    }

    #[test]
    fn sysinfo_parses_ascii() {
        let raw = RawSysInfo {
            addinfo: 2,
            max_axis: 32,
            cnc_type: *b"31",
            mt_type: *b" M",
            series: *b"G421",
            version: *b"0012",
            axes: *b"03",
        };
        let info = SystemInfo::from_raw(&raw);
        assert_eq!(info.cnc_type, "31");
        assert_eq!(info.mt_type, "M");
        assert_eq!(info.axes, Some(3));
        assert_eq!(info.max_axes, 32);
        assert_eq!(info.model(), "Series G421 Version 0012");
    }

    #[test]
    fn sysinfo_tolerates_garbage_axes() {
        let raw = RawSysInfo {
            addinfo: 0,
            max_axis: -1,
            cnc_type: *b"0\0",
            mt_type: *b"T\0",
            series: *b"D4F1",
            version: *b"0010",
            axes: *b"\x01\x02",
        };
        let info = SystemInfo::from_raw(&raw);
        assert_eq!(info.cnc_type, "0");
        assert_eq!(info.axes, None);
        assert_eq!(info.max_axes, 0);
    }
}
