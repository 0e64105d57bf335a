//! Session, query and program-upload layer for FANUC CNCs.
//!
//! `focas` manages vendor FOCAS2 session handles, runs short status and
//! position queries against them, and drives the three-phase program upload
//! so that no transfer is ever left open on the controller.
//!
//! The vendor library sits behind the [`Transport`] trait. [`SimTransport`]
//! is an in-memory controller; with the `fwlib` feature, `Fwlib` calls the
//! real `libfwlib32`.
//!
//! # Quick start
//!
//! ```
//! use focas::{ConnectionTarget, HandleManager, PositionKind, SimMachine, SimTransport};
//!
//! let manager = HandleManager::new(SimTransport::new(SimMachine::default()));
//! let handle = manager.connect(&ConnectionTarget::with_defaults("192.168.0.10"))?;
//!
//! let status = manager.machine_status(handle)?;
//! let position = manager.position(handle, PositionKind::Absolute, 8)?;
//! println!("{} / {} axes", status.run, position.values.len());
//!
//! let mut upload = manager.start_upload(handle, 100)?;
//! let mut text = Vec::new();
//! upload.read_to_end(&mut text)?;
//! upload.end()?;
//!
//! manager.release(handle)?;
//! # Ok::<(), focas::Error>(())
//! ```

mod alarm;
pub mod code;
mod error;
mod feed;
mod handle;
mod manager;
mod parameter;
mod position;
mod program;
mod query;
mod sim;
mod spindle;
mod state;
mod status;
#[cfg(feature = "fwlib")]
mod sys;
mod transport;
mod upload;

pub use alarm::{Alarm, AlarmKind};
pub use code::{Outcome, TRANSPORT_TIMEOUT, check};
pub use error::{ConnectError, Error, Fault, ReleaseError, Result};
pub use feed::OverrideKind;
pub use handle::{ConnectionTarget, DEFAULT_PORT, DEFAULT_TIMEOUT, Handle};
pub use manager::{HandleManager, ReleaseOutcome};
pub use parameter::{
    PARAM_CUTTING_TIME, PARAM_CYCLE_TIME, PARAM_OPERATING_TIME, PARAM_PARTS_COUNT,
    PARAM_POWER_ON_TIME, ParameterCounters, format_hms,
};
pub use position::{AxisName, AxisValue, PositionKind, PositionSnapshot};
pub use program::{
    ExecutingBlock, ExecutingProgram, PROGRAM_NAME_CAPACITY, PROGRAM_NAME_MAX, ProgramChunk,
    normalize_program_text, parse_program_name, program_file_path,
};
pub use sim::{SimAxis, SimMachine, SimOp, SimTransport};
pub use spindle::{MAX_SPINDLES, SpindleInfo, override_percent};
pub use state::{InvalidTransition, UploadPhase};
pub use status::{
    AlarmState, AutoMode, Emergency, MachineStatus, Motion, RunState, SystemInfo, TmMode,
};
#[cfg(feature = "fwlib")]
pub use sys::Fwlib;
pub use transport::{
    RawAlarm, RawAxisName, RawBlock, RawChunk, RawPosition, RawProgram, RawSpindle, RawStatus,
    RawSysInfo, Transport,
};
pub use upload::{EndOutcome, UploadSession};
