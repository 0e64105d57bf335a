//! Error types for FOCAS session operations.

use crate::handle::Handle;

/// Alias for `Result<T, focas::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by handle, query and upload operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    // ── Session lifecycle ────────────────────────────────────────

    /// The controller could not be reached or refused the session.
    #[error("connect failed: {0}")]
    Connect(#[from] ConnectError),

    /// The handle could not be released.
    #[error("release failed: {0}")]
    Release(#[from] ReleaseError),

    /// The handle is unknown to the manager or has been released.
    #[error("invalid handle {0}")]
    InvalidHandle(Handle),

    /// The connect timeout was zero.
    #[error("timeout must be greater than zero")]
    InvalidTimeout,

    // ── Upload ───────────────────────────────────────────────────

    /// A query was issued while a program upload is open on the handle.
    #[error("handle {0} is busy with a program upload")]
    HandleBusy(Handle),

    /// A second upload was started while one is already open.
    #[error("an upload is already open on handle {0}")]
    UploadBusy(Handle),

    /// The upload session was ended or force-ended before this call.
    #[error("no upload is open on handle {0}")]
    UploadNotOpen(Handle),

    /// The controller has no program with this number.
    #[error("program O{0} not found")]
    ProgramNotFound(u32),

    /// The controller has no program file at this path.
    #[error("program file {0} not found")]
    ProgramFileNotFound(String),

    /// No program is selected or executing, so there is nothing to upload.
    #[error("no executing program (name {name:?}, number {number})")]
    NoExecutingProgram {
        /// Name reported by the controller.
        name: String,
        /// Number reported by the controller.
        number: i64,
    },

    // ── Data ─────────────────────────────────────────────────────

    /// A program name exceeded the controller's fixed name capacity.
    #[error("program name is {len} bytes, limit is {max}")]
    NameTooLong {
        /// Length of the name reported by the controller.
        len: usize,
        /// Maximum name length in bytes.
        max: usize,
    },

    /// A caller-supplied argument was rejected before reaching the controller.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A vendor call returned a failure status.
    #[error("{op}: {fault}")]
    Cnc {
        /// The vendor function that failed.
        op: &'static str,
        /// Decoded failure class.
        fault: Fault,
    },
}

impl Error {
    /// Returns `true` when repeating the same call may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Cnc { fault, .. } if fault.is_transient())
    }
}

/// Why a connect attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConnectError {
    /// The controller did not answer within the timeout.
    #[error("timed out")]
    Timeout,
    /// The socket could not be opened or was refused.
    #[error("connection refused")]
    Refused,
    /// The controller speaks an incompatible protocol version.
    #[error("protocol version mismatch")]
    ProtocolVersion,
    /// The library issued a handle that is still registered live.
    #[error("library reissued live handle {0}")]
    DuplicateHandle(u16),
    /// Any other status code.
    #[error("status code {0}")]
    Unknown(i16),
}

/// Why a release was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ReleaseError {
    /// The handle was never issued by this manager.
    #[error("handle {0} not found")]
    NotFound(Handle),
    /// The handle was already released.
    #[error("handle {0} already released")]
    AlreadyReleased(Handle),
}

/// Decoded class of a failed vendor call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum Fault {
    /// The call did not complete within the session timeout.
    #[error("timed out")]
    Timeout,
    /// The controller is busy or its transfer buffer is not ready.
    #[error("controller busy")]
    Busy,
    /// The controller is in a mode or state that rejects the call.
    #[error("controller not ready")]
    NotReady,
    /// The request or reply data was malformed or out of range.
    #[error("data fault")]
    DataFault,
    /// The link to the controller is gone.
    #[error("disconnected")]
    Disconnected,
    /// The library rejected the handle.
    #[error("handle rejected by library")]
    InvalidHandle,
    /// Unrecognised status code.
    #[error("status code {0}")]
    Unknown(i16),
}

impl Fault {
    /// Transient faults leave session state untouched and may be retried.
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Timeout | Self::Busy | Self::NotReady)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_keeps_operation_name() {
        let err = Error::Cnc {
            op: "cnc_statinfo",
            fault: Fault::Disconnected,
        };
        assert_eq!(err.to_string(), "cnc_statinfo: disconnected");
    }

    #[test]
    fn display_name_too_long() {
        let err = Error::NameTooLong { len: 40, max: 35 };
        assert_eq!(err.to_string(), "program name is 40 bytes, limit is 35");
    }

    #[test]
    fn nested_errors_convert() {
        let err: Error = ReleaseError::AlreadyReleased(Handle::from_raw(3)).into();
        assert_eq!(err.to_string(), "release failed: handle 3 already released");
        let err: Error = ConnectError::Refused.into();
        assert!(matches!(err, Error::Connect(ConnectError::Refused)));
    }

    #[test]
    fn transient_classification() {
        assert!(Fault::Timeout.is_transient());
        assert!(Fault::Busy.is_transient());
        assert!(Fault::NotReady.is_transient());
        assert!(!Fault::DataFault.is_transient());
        assert!(!Fault::Disconnected.is_transient());
        assert!(!Fault::InvalidHandle.is_transient());
        assert!(!Fault::Unknown(-99).is_transient());

        let busy = Error::Cnc {
            op: "cnc_upload",
            fault: Fault::Busy,
        };
        assert!(busy.is_transient());
        assert!(!Error::InvalidTimeout.is_transient());
    }
}
