//! Vendor status codes and their decoding.
//!
//! Every vendor call returns a signed 16-bit status. Codes are decoded into
//! an [`Outcome`] at the transport boundary so the rest of the crate never
//! branches on raw numbers.

use crate::error::{ConnectError, Error, Fault, Result};

/// Protocol error in the reply.
pub const EW_PROTOCOL: i16 = -17;
/// Socket communication failed.
pub const EW_SOCKET: i16 = -16;
/// Handle is not known to the library.
pub const EW_HANDLE: i16 = -8;
/// CNC or library version mismatch.
pub const EW_VERSION: i16 = -7;
/// Unexpected library error.
pub const EW_UNEXP: i16 = -6;
/// Shared RAM parity error.
pub const EW_PARITY: i16 = -4;
/// The CNC was reset during the call.
pub const EW_RESET: i16 = -2;
/// The CNC is busy.
pub const EW_BUSY: i16 = -1;
/// Success.
pub const EW_OK: i16 = 0;
/// Data block length error.
pub const EW_LENGTH: i16 = 2;
/// Data number error.
pub const EW_NUMBER: i16 = 3;
/// Data attribute error.
pub const EW_ATTRIB: i16 = 4;
/// Data error.
pub const EW_DATA: i16 = 5;
/// Parameter error.
pub const EW_PARAM: i16 = 9;
/// Transfer buffer empty or full.
pub const EW_BUFFER: i16 = 10;
/// CNC mode error.
pub const EW_MODE: i16 = 12;
/// Execution rejected.
pub const EW_REJECT: i16 = 13;
/// The CNC is in alarm.
pub const EW_ALARM: i16 = 15;
/// The CNC is stopped or in emergency.
pub const EW_STOP: i16 = 16;

/// Reported by transports when a call exceeds the session timeout.
///
/// The vendor library folds timeouts into socket errors; this value is
/// outside its code range and lets a transport report a timeout explicitly.
pub const TRANSPORT_TIMEOUT: i16 = -20;

/// Decoded result of a vendor call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Outcome {
    /// `EW_OK`.
    Success,
    /// The library does not recognise the handle.
    InvalidHandle,
    /// The call timed out.
    Timeout,
    /// The controller is busy; retry later.
    Busy,
    /// The controller state rejects the call (mode, reset, alarm, stop).
    NotReady,
    /// Malformed request or reply.
    DataFault,
    /// The socket is gone.
    Disconnected,
    /// Anything not in the table.
    Unknown(i16),
}

impl Outcome {
    /// Decodes a vendor status code.
    pub const fn from_code(code: i16) -> Self {
        match code {
            EW_OK => Self::Success,
            EW_HANDLE => Self::InvalidHandle,
            TRANSPORT_TIMEOUT => Self::Timeout,
            EW_BUSY | EW_BUFFER => Self::Busy,
            EW_RESET | EW_MODE | EW_REJECT | EW_ALARM | EW_STOP => Self::NotReady,
            EW_PROTOCOL | EW_VERSION | EW_UNEXP | EW_PARITY | EW_LENGTH | EW_NUMBER
            | EW_ATTRIB | EW_DATA => Self::DataFault,
            EW_SOCKET => Self::Disconnected,
            other => Self::Unknown(other),
        }
    }

    /// The failure class, or `None` for [`Outcome::Success`].
    pub const fn fault(self) -> Option<Fault> {
        match self {
            Self::Success => None,
            Self::InvalidHandle => Some(Fault::InvalidHandle),
            Self::Timeout => Some(Fault::Timeout),
            Self::Busy => Some(Fault::Busy),
            Self::NotReady => Some(Fault::NotReady),
            Self::DataFault => Some(Fault::DataFault),
            Self::Disconnected => Some(Fault::Disconnected),
            Self::Unknown(code) => Some(Fault::Unknown(code)),
        }
    }
}

/// Builds the error for a failed call. A success code is reported as
/// `Unknown(0)`, which only happens if a transport breaks its contract.
pub(crate) const fn failure(op: &'static str, code: i16) -> Error {
    let fault = match Outcome::from_code(code).fault() {
        Some(fault) => fault,
        None => Fault::Unknown(code),
    };
    Error::Cnc { op, fault }
}

/// Lifts a transport result, decoding the status on failure.
pub(crate) fn call<R>(op: &'static str, result: std::result::Result<R, i16>) -> Result<R> {
    result.map_err(|code| failure(op, code))
}

/// Converts a vendor status into `Ok(())` or [`Error::Cnc`].
pub const fn check(op: &'static str, code: i16) -> Result<()> {
    match Outcome::from_code(code).fault() {
        None => Ok(()),
        Some(fault) => Err(Error::Cnc { op, fault }),
    }
}

impl ConnectError {
    /// Classifies a status returned by the connect call.
    pub const fn from_code(code: i16) -> Self {
        match code {
            TRANSPORT_TIMEOUT => Self::Timeout,
            EW_SOCKET => Self::Refused,
            EW_VERSION | EW_PROTOCOL => Self::ProtocolVersion,
            other => Self::Unknown(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_table() {
        let cases = [
            (0, Outcome::Success),
            (-8, Outcome::InvalidHandle),
            (TRANSPORT_TIMEOUT, Outcome::Timeout),
            (-1, Outcome::Busy),
            (10, Outcome::Busy),
            (-2, Outcome::NotReady),
            (12, Outcome::NotReady),
            (13, Outcome::NotReady),
            (15, Outcome::NotReady),
            (16, Outcome::NotReady),
            (-17, Outcome::DataFault),
            (-7, Outcome::DataFault),
            (-6, Outcome::DataFault),
            (-4, Outcome::DataFault),
            (2, Outcome::DataFault),
            (3, Outcome::DataFault),
            (4, Outcome::DataFault),
            (5, Outcome::DataFault),
            (-16, Outcome::Disconnected),
            (1, Outcome::Unknown(1)),
            (-15, Outcome::Unknown(-15)),
            (i16::MAX, Outcome::Unknown(i16::MAX)),
        ];
        for (code, expected) in cases {
            assert_eq!(Outcome::from_code(code), expected, "code {code}");
        }
    }

    #[test]
    fn check_keeps_operation() {
        assert!(check("cnc_statinfo", EW_OK).is_ok());
        match check("cnc_upload", EW_BUFFER) {
            Err(Error::Cnc { op, fault }) => {
                assert_eq!(op, "cnc_upload");
                assert_eq!(fault, Fault::Busy);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn failure_never_reports_success() {
        assert!(matches!(
            failure("cnc_sysinfo", EW_OK),
            Error::Cnc {
                fault: Fault::Unknown(0),
                ..
            }
        ));
    }

    #[test]
    fn connect_classification() {
        assert_eq!(ConnectError::from_code(EW_SOCKET), ConnectError::Refused);
        assert_eq!(
            ConnectError::from_code(TRANSPORT_TIMEOUT),
            ConnectError::Timeout
        );
        assert_eq!(
            ConnectError::from_code(EW_VERSION),
            ConnectError::ProtocolVersion
        );
        assert_eq!(ConnectError::from_code(-15), ConnectError::Unknown(-15));
    }
}
