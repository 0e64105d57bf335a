//! Active alarm messages.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::status::{decode_ascii, status_enum};
use crate::transport::RawAlarm;

status_enum! {
    /// Alarm category.
    AlarmKind {
        /// Parameter switch on.
        ParameterSwitch = 0 => "SW",
        /// Power off required after parameter change.
        PowerOff = 1 => "PW",
        /// I/O error.
        Io = 2 => "IO",
        /// Program or operation error.
        Program = 3 => "PS",
        /// Overtravel.
        Overtravel = 4 => "OT",
        /// Overheat.
        Overheat = 5 => "OH",
        /// Servo alarm.
        Servo = 6 => "SV",
        /// Data I/O error.
        DataIo = 7 => "SR",
        /// Macro alarm.
        Macro = 8 => "MC",
        /// Spindle alarm.
        Spindle = 9 => "SP",
        /// Other alarm.
        Other = 10 => "DS",
        /// Malfunction prevention.
        Malfunction = 11 => "IE",
        /// Background edit error.
        Background = 12 => "BG",
        /// Synchronized, composite or superimposed control error.
        Sync = 13 => "SN",
        /// External alarm message.
        External = 15 => "EX",
        /// PMC alarm.
        Pmc = 19 => "PC",
    }
}

/// One active alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Alarm {
    /// Alarm number.
    pub number: i64,
    /// Category.
    pub kind: AlarmKind,
    /// Axis number, 0 when the alarm is not axis-specific.
    pub axis: i16,
    /// Message text.
    pub message: String,
}

impl Alarm {
    /// Decodes a raw alarm. Entries with an empty message are padding and
    /// yield `None`.
    pub fn from_raw(raw: &RawAlarm) -> Option<Self> {
        let message = decode_ascii(&raw.message);
        (!message.is_empty()).then(|| Self {
            number: raw.number,
            kind: AlarmKind::from_raw(raw.kind),
            axis: raw.axis,
            message,
        })
    }
}

impl fmt::Display for Alarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:04} {}", self.kind, self.number, self.message)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn decodes_alarm() {
        let raw = RawAlarm {
            number: 1001,
            kind: 3,
            axis: 0,
            message: b"  PROGRAM ERROR \0\0".to_vec(),
        };
        let alarm = Alarm::from_raw(&raw).unwrap();
        assert_eq!(alarm.kind, AlarmKind::Program);
        assert_eq!(alarm.message, "PROGRAM ERROR");
        assert_eq!(alarm.to_string(), "PS1001 PROGRAM ERROR");
    }

    #[test]
    fn skips_empty_message() {
        let raw = RawAlarm {
            number: 0,
            kind: 0,
            axis: 0,
            message: vec![b' '; 8],
        };
        assert!(Alarm::from_raw(&raw).is_none());
    }

    #[test]
    fn unknown_kind_kept() {
        assert_eq!(AlarmKind::from_raw(14), AlarmKind::Unknown(14));
        assert_eq!(AlarmKind::from_raw(19).to_string(), "PC");
    }
}
