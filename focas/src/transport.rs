//! The vendor transport seam.
//!
//! A [`Transport`] performs exactly one vendor call per method and returns the
//! raw status code on failure. Output is only trusted on success. Records are
//! plain copies of the vendor structures; decoding happens in the callers.

use std::time::Duration;

use crate::code::{EW_BUFFER, EW_OK};
use crate::feed::OverrideKind;
use crate::handle::Handle;
use crate::position::PositionKind;

/// Raw `ODBST` fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::exhaustive_structs)]
pub struct RawStatus {
    /// T/M mode.
    pub tmmode: i16,
    /// Selected automatic mode.
    pub aut: i16,
    /// Run state.
    pub run: i16,
    /// Motion state.
    pub motion: i16,
    /// MSTB FIN state.
    pub mstb: i16,
    /// Emergency state.
    pub emergency: i16,
    /// Alarm state.
    pub alarm: i16,
    /// Edit state.
    pub edit: i16,
}

/// Raw `ODBSYS` fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::exhaustive_structs)]
pub struct RawSysInfo {
    /// Additional info flags.
    pub addinfo: i16,
    /// Maximum controlled axes.
    pub max_axis: i16,
    /// CNC type, ASCII.
    pub cnc_type: [u8; 2],
    /// Machine type, ASCII.
    pub mt_type: [u8; 2],
    /// Series, ASCII.
    pub series: [u8; 4],
    /// Version, ASCII.
    pub version: [u8; 4],
    /// Current controlled axes, ASCII digits.
    pub axes: [u8; 2],
}

/// Raw `ODBAXISNAME`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::exhaustive_structs)]
pub struct RawAxisName {
    /// Axis letter.
    pub name: u8,
    /// Suffix character, or NUL / space.
    pub suffix: u8,
}

/// Raw `POSELM` for one axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::exhaustive_structs)]
pub struct RawPosition {
    /// Scaled integer value.
    pub data: i64,
    /// Number of decimal places in `data`.
    pub dec: i16,
    /// Axis letter.
    pub name: u8,
    /// Suffix character.
    pub suffix: u8,
}

/// Raw `ODBEXEPRG`: the name bytes up to the first NUL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(clippy::exhaustive_structs)]
pub struct RawProgram {
    /// Name bytes, excluding the terminator.
    pub name: Vec<u8>,
    /// Program number.
    pub number: i64,
}

/// One `cnc_upload` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(clippy::exhaustive_structs)]
pub struct RawChunk {
    /// Program bytes.
    pub data: Vec<u8>,
    /// The end-of-record marker was seen.
    pub complete: bool,
    /// Block sequence number, if the transport reports one.
    pub block: Option<u32>,
}

impl RawChunk {
    /// Interprets one `cnc_upload` reply.
    ///
    /// `EW_BUFFER` with data means the buffer filled up and more follows; the
    /// bytes are valid and must be kept. Without data it is a busy reply.
    pub fn from_reply(code: i16, data: Vec<u8>) -> Result<Self, i16> {
        match code {
            EW_OK => {}
            EW_BUFFER if !data.is_empty() => {}
            code => return Err(code),
        }
        Ok(Self {
            data,
            complete: false,
            block: None,
        })
    }
}

/// Raw `ODBALMMSG2`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(clippy::exhaustive_structs)]
pub struct RawAlarm {
    /// Alarm number.
    pub number: i64,
    /// Alarm type code.
    pub kind: i16,
    /// Axis number, 0 when not axis-specific.
    pub axis: i16,
    /// Message bytes.
    pub message: Vec<u8>,
}

/// Raw `cnc_rdexecprog` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(clippy::exhaustive_structs)]
pub struct RawBlock {
    /// Executing block number.
    pub block: i64,
    /// NC text around the executing block.
    pub text: Vec<u8>,
}

/// Raw `ODBSPLOAD` for one spindle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::exhaustive_structs)]
pub struct RawSpindle {
    /// Load meter value, scaled.
    pub load: i64,
    /// Decimal places of `load`.
    pub load_dec: i16,
    /// Speed, scaled.
    pub speed: i64,
    /// Decimal places of `speed`.
    pub speed_dec: i16,
}

/// One vendor call per method; `Err` carries the raw status code.
pub trait Transport: Send + Sync {
    /// `cnc_allclibhndl3`: opens a session. The timeout applies to every
    /// later call on the returned handle.
    fn connect(&self, host: &str, port: u16, timeout: Duration) -> Result<Handle, i16>;

    /// `cnc_freelibhndl`.
    fn disconnect(&self, handle: Handle) -> Result<(), i16>;

    /// `cnc_statinfo`.
    fn read_status(&self, handle: Handle) -> Result<RawStatus, i16>;

    /// `cnc_sysinfo`.
    fn read_sysinfo(&self, handle: Handle) -> Result<RawSysInfo, i16>;

    /// `cnc_rdaxisname`: at most `max` names, as many as the CNC reports.
    fn read_axis_names(&self, handle: Handle, max: usize) -> Result<Vec<RawAxisName>, i16>;

    /// `cnc_rdposition`: one entry per axis for the requested kind.
    fn read_position(
        &self,
        handle: Handle,
        kind: PositionKind,
        requested: usize,
    ) -> Result<Vec<RawPosition>, i16>;

    /// `cnc_exeprgname`.
    fn read_executing_program(&self, handle: Handle) -> Result<RawProgram, i16>;

    /// `cnc_upstart`.
    fn upload_start(&self, handle: Handle, program: u32) -> Result<(), i16>;

    /// `cnc_getpath`: the current path number and the number of paths.
    fn read_path(&self, handle: Handle) -> Result<(i16, i16), i16>;

    /// `cnc_upstart4`: starts uploading the NC program stored at `path`.
    fn upload_start_path(&self, handle: Handle, path: &str) -> Result<(), i16>;

    /// `cnc_upload`: the next chunk of program text. See
    /// [`RawChunk::from_reply`] for the status codes that still carry data.
    fn upload_read(&self, handle: Handle) -> Result<RawChunk, i16>;

    /// `cnc_upend`.
    fn upload_end(&self, handle: Handle) -> Result<(), i16>;

    /// `cnc_rdalmmsg2`: at most `max` active alarms.
    fn read_alarms(&self, handle: Handle, max: usize) -> Result<Vec<RawAlarm>, i16>;

    /// `cnc_rdexecprog`.
    fn read_executing_block(&self, handle: Handle) -> Result<RawBlock, i16>;

    /// `cnc_actf`.
    fn read_actual_feed(&self, handle: Handle) -> Result<i64, i16>;

    /// `cnc_acts`.
    fn read_actual_speed(&self, handle: Handle) -> Result<i64, i16>;

    /// `cnc_rdparam`: a long (4-byte) parameter that is not axis-specific.
    fn read_parameter(&self, handle: Handle, number: u16) -> Result<i64, i16>;

    /// `cnc_rdtofs`: the override percentage of `kind`.
    fn read_override(&self, handle: Handle, kind: OverrideKind) -> Result<i64, i16>;

    /// `cnc_rdspmeter`: load and speed of at most `max` spindles.
    fn read_spindles(&self, handle: Handle, max: usize) -> Result<Vec<RawSpindle>, i16>;

    /// `cnc_rdspload`: raw override values (0..=16383) of every spindle.
    fn read_spindle_override(&self, handle: Handle) -> Result<Vec<i16>, i16>;
}
