//! In-memory simulated controller.
//!
//! [`SimTransport`] implements [`Transport`] against a [`SimMachine`]. It
//! recycles the lowest free handle number like the vendor library, keeps
//! controller-side upload state per session, counts calls per operation and
//! can be told to fail the next call of any operation with a given code.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::code::{EW_BUFFER, EW_BUSY, EW_DATA, EW_HANDLE, EW_NUMBER, EW_OK, EW_PARAM};
use crate::feed::OverrideKind;
use crate::handle::Handle;
use crate::parameter::{
    PARAM_CUTTING_TIME, PARAM_CYCLE_TIME, PARAM_OPERATING_TIME, PARAM_PARTS_COUNT,
    PARAM_POWER_ON_TIME,
};
use crate::position::PositionKind;
use crate::transport::{
    RawAlarm, RawAxisName, RawBlock, RawChunk, RawPosition, RawProgram, RawSpindle, RawStatus,
    RawSysInfo, Transport,
};

/// `EW_FUNC`: the call is not valid in the current transfer state.
const EW_FUNC: i16 = 1;

/// Operations that can be counted and failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SimOp {
    /// `connect`.
    Connect,
    /// `disconnect`.
    Disconnect,
    /// `read_status`.
    Status,
    /// `read_sysinfo`.
    SysInfo,
    /// `read_axis_names`.
    AxisNames,
    /// `read_position`.
    Position,
    /// `read_executing_program`.
    ExecutingProgram,
    /// `upload_start`.
    UploadStart,
    /// `upload_read`.
    UploadRead,
    /// `upload_end`.
    UploadEnd,
    /// `read_alarms`.
    Alarms,
    /// `read_executing_block`.
    ExecutingBlock,
    /// `read_actual_feed`.
    ActualFeed,
    /// `read_actual_speed`.
    ActualSpeed,
    /// `read_path`.
    Path,
    /// `upload_start_path`.
    UploadStartPath,
    /// `read_parameter`.
    Parameter,
    /// `read_override`.
    Override,
    /// `read_spindles`.
    Spindles,
    /// `read_spindle_override`.
    SpindleOverride,
}

/// One simulated axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::exhaustive_structs)]
pub struct SimAxis {
    /// Axis letter.
    pub name: u8,
    /// Decimal places of every position value.
    pub dec: i16,
    /// Absolute position.
    pub absolute: i64,
    /// Relative position.
    pub relative: i64,
    /// Machine position.
    pub machine: i64,
    /// Distance to go.
    pub distance: i64,
}

impl SimAxis {
    /// An axis at `machine`, offset for the other coordinate systems.
    pub const fn new(name: u8, machine: i64) -> Self {
        Self {
            name,
            dec: 3,
            absolute: machine - 100_000,
            relative: machine - 50_000,
            machine,
            distance: 0,
        }
    }

    const fn value(&self, kind: PositionKind) -> i64 {
        match kind {
            PositionKind::Absolute => self.absolute,
            PositionKind::Relative => self.relative,
            PositionKind::Machine => self.machine,
            PositionKind::DistanceToGo => self.distance,
        }
    }
}

/// Contents of the simulated controller.
#[derive(Debug, Clone)]
#[allow(clippy::exhaustive_structs)]
pub struct SimMachine {
    /// Status record.
    pub status: RawStatus,
    /// System info record.
    pub sysinfo: RawSysInfo,
    /// Controlled axes.
    pub axes: Vec<SimAxis>,
    /// Stored programs by number.
    pub programs: BTreeMap<u32, Vec<u8>>,
    /// Stored programs by file path, for `upload_start_path`.
    pub files: BTreeMap<String, Vec<u8>>,
    /// Current path number.
    pub path: i16,
    /// Number of paths.
    pub max_path: i16,
    /// Upload chunk size in bytes.
    pub chunk_size: usize,
    /// Flag the final chunk as complete. When off, the end is signalled by
    /// a zero-length read only.
    pub flag_completion: bool,
    /// Report consecutive block numbers with each chunk.
    pub report_blocks: bool,
    /// Deliver every full, non-final chunk with `EW_BUFFER` instead of
    /// `EW_OK`, like a controller whose transfer buffer is backed up.
    pub buffer_pressure: bool,
    /// Extra position entries returned beyond the request.
    pub extra_positions: usize,
    /// Executing program.
    pub executing: RawProgram,
    /// Executing block.
    pub block: RawBlock,
    /// Active alarms.
    pub alarms: Vec<RawAlarm>,
    /// Actual feed rate.
    pub feed: i64,
    /// Actual spindle speed.
    pub speed: i64,
    /// Long parameters by number.
    pub parameters: BTreeMap<u16, i64>,
    /// Feed override percentage.
    pub feed_override: i64,
    /// Jog override percentage.
    pub jog_override: i64,
    /// Spindle meters.
    pub spindles: Vec<RawSpindle>,
    /// Raw spindle overrides (0..=16383), one per spindle.
    pub spindle_override: Vec<i16>,
    /// Delay applied to every call, outside the simulator lock.
    pub latency: Duration,
}

impl Default for SimMachine {
    /// A three-axis machining center running O100.
    fn default() -> Self {
        let mut programs = BTreeMap::new();
        programs.insert(100, b"%\nO0100 (DEMO)\nG90 G54 G0 X0 Y0\nG1 X10. F200\nM30\n%".to_vec());
        Self {
            status: RawStatus {
                tmmode: 1,
                aut: 1,
                run: 3,
                motion: 1,
                ..RawStatus::default()
            },
            sysinfo: RawSysInfo {
                addinfo: 0,
                max_axis: 32,
                cnc_type: *b" 0",
                mt_type: *b" M",
                series: *b"D4F1",
                version: *b"0030",
                axes: *b"03",
            },
            axes: vec![
                SimAxis::new(b'X', 125_000),
                SimAxis::new(b'Y', -42_500),
                SimAxis::new(b'Z', 310_250),
            ],
            programs,
            files: BTreeMap::new(),
            path: 1,
            max_path: 1,
            chunk_size: 256,
            flag_completion: true,
            report_blocks: false,
            buffer_pressure: false,
            extra_positions: 0,
            executing: RawProgram {
                name: b"O100".to_vec(),
                number: 100,
            },
            block: RawBlock {
                block: 3,
                text: b"G01 X10. F200;\nM30;\n".to_vec(),
            },
            alarms: vec![RawAlarm {
                number: 1001,
                kind: 3,
                axis: 0,
                message: b"SIMULATED ALARM".to_vec(),
            }],
            feed: 200,
            speed: 1200,
            parameters: BTreeMap::from([
                (PARAM_PARTS_COUNT, 1532),
                (PARAM_POWER_ON_TIME, 1_296_000),
                (PARAM_OPERATING_TIME, 540_000),
                (PARAM_CUTTING_TIME, 180_000),
                (PARAM_CYCLE_TIME, 95),
            ]),
            feed_override: 100,
            jog_override: 50,
            spindles: vec![RawSpindle {
                load: 125,
                load_dec: 1,
                speed: 1200,
                speed_dec: 0,
            }],
            spindle_override: vec![16383],
            latency: Duration::ZERO,
        }
    }
}

impl SimMachine {
    /// Stores `text` as program `number`.
    #[must_use]
    pub fn with_program(mut self, number: u32, text: &[u8]) -> Self {
        self.programs.insert(number, text.to_vec());
        self
    }

    /// Sets the upload chunk size (at least one byte).
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Stores `text` under the file `path`.
    #[must_use]
    pub fn with_program_file(mut self, path: &str, text: &[u8]) -> Self {
        self.files.insert(path.to_owned(), text.to_vec());
        self
    }

    /// Delivers full chunks with `EW_BUFFER`.
    #[must_use]
    pub const fn with_buffer_pressure(mut self, on: bool) -> Self {
        self.buffer_pressure = on;
        self
    }

    /// Sets a long parameter.
    #[must_use]
    pub fn with_parameter(mut self, number: u16, value: i64) -> Self {
        self.parameters.insert(number, value);
        self
    }

    /// Removes a parameter, so reading it fails with `EW_NUMBER`.
    #[must_use]
    pub fn without_parameter(mut self, number: u16) -> Self {
        self.parameters.remove(&number);
        self
    }

    /// Enables or disables the completion flag on the last chunk.
    #[must_use]
    pub const fn with_completion_flag(mut self, on: bool) -> Self {
        self.flag_completion = on;
        self
    }

    /// Reports block numbers with each chunk.
    #[must_use]
    pub const fn with_block_numbers(mut self, on: bool) -> Self {
        self.report_blocks = on;
        self
    }

    /// Returns `extra` more position entries than requested.
    #[must_use]
    pub const fn with_extra_positions(mut self, extra: usize) -> Self {
        self.extra_positions = extra;
        self
    }

    /// Sets the executing program name and number.
    #[must_use]
    pub fn with_executing(mut self, name: &str, number: i64) -> Self {
        self.executing = RawProgram {
            name: name.as_bytes().to_vec(),
            number,
        };
        self
    }

    /// Replaces the axes with `count` generated ones.
    #[must_use]
    pub fn with_axis_count(mut self, count: usize) -> Self {
        const LETTERS: &[u8] = b"XYZABCUVW";
        self.axes = LETTERS
            .iter()
            .cycle()
            .take(count)
            .zip(0_i64..)
            .map(|(&name, i)| SimAxis::new(name, i * 10_000))
            .collect();
        self
    }

    /// Delays every call by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

/// Where an upload reads from.
#[derive(Debug)]
enum Source {
    /// `cnc_upstart`.
    Number(u32),
    /// `cnc_upstart4`.
    File(String),
}

impl Source {
    fn text<'m>(&self, m: &'m SimMachine) -> Option<&'m Vec<u8>> {
        match self {
            Self::Number(n) => m.programs.get(n),
            Self::File(path) => m.files.get(path),
        }
    }
}

/// Controller-side upload cursor.
#[derive(Debug)]
struct Cursor {
    /// Program being read.
    source: Source,
    /// Next byte to send.
    offset: usize,
    /// Next block number.
    block: u32,
}

/// One open library session.
#[derive(Debug, Default)]
struct Session {
    /// Open upload, if any.
    upload: Option<Cursor>,
}

/// Everything behind the simulator lock.
#[derive(Debug)]
struct Inner {
    /// Controller contents.
    machine: SimMachine,
    /// Open sessions by raw handle.
    sessions: BTreeMap<u16, Session>,
    /// Queued failure codes per operation.
    faults: HashMap<SimOp, VecDeque<i16>>,
    /// Call counts per operation.
    calls: HashMap<SimOp, usize>,
}

/// Simulated transport.
#[derive(Debug)]
pub struct SimTransport {
    /// Simulator state.
    inner: Mutex<Inner>,
}

impl Default for SimTransport {
    fn default() -> Self {
        Self::new(SimMachine::default())
    }
}

impl SimTransport {
    /// Creates a simulator for `machine`.
    pub fn new(machine: SimMachine) -> Self {
        Self {
            inner: Mutex::new(Inner {
                machine,
                sessions: BTreeMap::new(),
                faults: HashMap::new(),
                calls: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the next call of `op` fail with `code`. Queued codes are used
    /// in order.
    pub fn fail_next(&self, op: SimOp, code: i16) {
        self.lock().faults.entry(op).or_default().push_back(code);
    }

    /// Edits the machine while the simulator runs.
    pub fn configure(&self, f: impl FnOnce(&mut SimMachine)) {
        f(&mut self.lock().machine);
    }

    /// Number of calls of `op` so far, failed ones included.
    pub fn calls(&self, op: SimOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Sessions the library still holds open.
    pub fn open_sessions(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Whether the controller has an upload open on `handle`.
    pub fn is_uploading(&self, handle: Handle) -> bool {
        self.lock()
            .sessions
            .get(&handle.raw())
            .is_some_and(|s| s.upload.is_some())
    }

    /// Counts the call, applies latency and injected faults, then runs `f`.
    fn op<R>(&self, op: SimOp, f: impl FnOnce(&mut Inner) -> Result<R, i16>) -> Result<R, i16> {
        let latency = {
            let mut inner = self.lock();
            *inner.calls.entry(op).or_default() += 1;
            inner.machine.latency
        };
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }
        let mut inner = self.lock();
        if let Some(code) = inner.faults.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(code);
        }
        f(&mut inner)
    }

    /// Like [`op`](Self::op) for calls that need an open session.
    fn session_op<R>(
        &self,
        op: SimOp,
        handle: Handle,
        f: impl FnOnce(&SimMachine, &mut Session) -> Result<R, i16>,
    ) -> Result<R, i16> {
        self.op(op, |inner| {
            let Inner {
                machine, sessions, ..
            } = inner;
            let session = sessions.get_mut(&handle.raw()).ok_or(EW_HANDLE)?;
            f(machine, session)
        })
    }
}

impl Transport for SimTransport {
    fn connect(&self, _host: &str, _port: u16, _timeout: Duration) -> Result<Handle, i16> {
        self.op(SimOp::Connect, |inner| {
            let raw = (1..=u16::MAX)
                .find(|n| !inner.sessions.contains_key(n))
                .ok_or(EW_BUSY)?;
            inner.sessions.insert(raw, Session::default());
            Ok(Handle::from_raw(raw))
        })
    }

    fn disconnect(&self, handle: Handle) -> Result<(), i16> {
        self.op(SimOp::Disconnect, |inner| {
            inner
                .sessions
                .remove(&handle.raw())
                .map(drop)
                .ok_or(EW_HANDLE)
        })
    }

    fn read_status(&self, handle: Handle) -> Result<RawStatus, i16> {
        self.session_op(SimOp::Status, handle, |m, _| Ok(m.status))
    }

    fn read_sysinfo(&self, handle: Handle) -> Result<RawSysInfo, i16> {
        self.session_op(SimOp::SysInfo, handle, |m, _| Ok(m.sysinfo))
    }

    fn read_axis_names(&self, handle: Handle, max: usize) -> Result<Vec<RawAxisName>, i16> {
        self.session_op(SimOp::AxisNames, handle, |m, _| {
            Ok(m.axes
                .iter()
                .take(max)
                .map(|a| RawAxisName {
                    name: a.name,
                    suffix: 0,
                })
                .collect())
        })
    }

    fn read_position(
        &self,
        handle: Handle,
        kind: PositionKind,
        requested: usize,
    ) -> Result<Vec<RawPosition>, i16> {
        self.session_op(SimOp::Position, handle, |m, _| {
            let count = requested.min(m.axes.len()) + m.extra_positions;
            Ok(m.axes
                .iter()
                .cycle()
                .take(count)
                .map(|a| RawPosition {
                    data: a.value(kind),
                    dec: a.dec,
                    name: a.name,
                    suffix: 0,
                })
                .collect())
        })
    }

    fn read_executing_program(&self, handle: Handle) -> Result<RawProgram, i16> {
        self.session_op(SimOp::ExecutingProgram, handle, |m, _| {
            Ok(m.executing.clone())
        })
    }

    fn upload_start(&self, handle: Handle, program: u32) -> Result<(), i16> {
        self.session_op(SimOp::UploadStart, handle, |m, session| {
            if session.upload.is_some() {
                return Err(EW_BUSY);
            }
            if !m.programs.contains_key(&program) {
                return Err(EW_DATA);
            }
            session.upload = Some(Cursor {
                source: Source::Number(program),
                offset: 0,
                block: 1,
            });
            Ok(())
        })
    }

    fn read_path(&self, handle: Handle) -> Result<(i16, i16), i16> {
        self.session_op(SimOp::Path, handle, |m, _| Ok((m.path, m.max_path)))
    }

    fn upload_start_path(&self, handle: Handle, path: &str) -> Result<(), i16> {
        self.session_op(SimOp::UploadStartPath, handle, |m, session| {
            if session.upload.is_some() {
                return Err(EW_BUSY);
            }
            if !m.files.contains_key(path) {
                return Err(EW_DATA);
            }
            session.upload = Some(Cursor {
                source: Source::File(path.to_owned()),
                offset: 0,
                block: 1,
            });
            Ok(())
        })
    }

    fn upload_read(&self, handle: Handle) -> Result<RawChunk, i16> {
        self.session_op(SimOp::UploadRead, handle, |m, session| {
            let cursor = session.upload.as_mut().ok_or(EW_FUNC)?;
            let text = cursor.source.text(m).ok_or(EW_DATA)?;
            let start = cursor.offset.min(text.len());
            let end = start.saturating_add(m.chunk_size).min(text.len());
            cursor.offset = end;
            let data = text[start..end].to_vec();
            let complete = m.flag_completion && !data.is_empty() && end == text.len();
            let full = data.len() == m.chunk_size && end < text.len();
            let block = (m.report_blocks && !data.is_empty()).then(|| {
                let b = cursor.block;
                cursor.block += 1;
                b
            });
            let code = if m.buffer_pressure && full { EW_BUFFER } else { EW_OK };
            let mut chunk = RawChunk::from_reply(code, data)?;
            chunk.complete = complete;
            chunk.block = block;
            Ok(chunk)
        })
    }

    fn upload_end(&self, handle: Handle) -> Result<(), i16> {
        self.session_op(SimOp::UploadEnd, handle, |_, session| {
            session.upload.take().map(drop).ok_or(EW_FUNC)
        })
    }

    fn read_alarms(&self, handle: Handle, max: usize) -> Result<Vec<RawAlarm>, i16> {
        self.session_op(SimOp::Alarms, handle, |m, _| {
            if max == 0 {
                return Err(EW_PARAM);
            }
            Ok(m.alarms.iter().take(max).cloned().collect())
        })
    }

    fn read_executing_block(&self, handle: Handle) -> Result<RawBlock, i16> {
        self.session_op(SimOp::ExecutingBlock, handle, |m, _| Ok(m.block.clone()))
    }

    fn read_actual_feed(&self, handle: Handle) -> Result<i64, i16> {
        self.session_op(SimOp::ActualFeed, handle, |m, _| Ok(m.feed))
    }

    fn read_actual_speed(&self, handle: Handle) -> Result<i64, i16> {
        self.session_op(SimOp::ActualSpeed, handle, |m, _| Ok(m.speed))
    }

    fn read_parameter(&self, handle: Handle, number: u16) -> Result<i64, i16> {
        self.session_op(SimOp::Parameter, handle, |m, _| {
            m.parameters.get(&number).copied().ok_or(EW_NUMBER)
        })
    }

    fn read_override(&self, handle: Handle, kind: OverrideKind) -> Result<i64, i16> {
        self.session_op(SimOp::Override, handle, |m, _| {
            Ok(match kind {
                OverrideKind::Feed => m.feed_override,
                OverrideKind::Jog => m.jog_override,
            })
        })
    }

    fn read_spindles(&self, handle: Handle, max: usize) -> Result<Vec<RawSpindle>, i16> {
        self.session_op(SimOp::Spindles, handle, |m, _| {
            Ok(m.spindles.iter().take(max).copied().collect())
        })
    }

    fn read_spindle_override(&self, handle: Handle) -> Result<Vec<i16>, i16> {
        self.session_op(SimOp::SpindleOverride, handle, |m, _| {
            Ok(m.spindle_override.clone())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn recycles_lowest_free_handle() {
        let sim = SimTransport::default();
        let t = Duration::from_secs(1);
        let a = sim.connect("h", 1, t).unwrap();
        let b = sim.connect("h", 1, t).unwrap();
        assert_eq!((a.raw(), b.raw()), (1, 2));
        sim.disconnect(a).unwrap();
        assert_eq!(sim.connect("h", 1, t).unwrap(), a);
        assert_eq!(sim.disconnect(Handle::from_raw(9)), Err(EW_HANDLE));
    }

    #[test]
    fn injected_faults_are_consumed_in_order() {
        let sim = SimTransport::default();
        let h = sim.connect("h", 1, Duration::from_secs(1)).unwrap();
        sim.fail_next(SimOp::Status, -1);
        sim.fail_next(SimOp::Status, -16);
        assert_eq!(sim.read_status(h), Err(-1));
        assert_eq!(sim.read_status(h), Err(-16));
        assert!(sim.read_status(h).is_ok());
        assert_eq!(sim.calls(SimOp::Status), 3);
    }

    #[test]
    fn upload_cursor() {
        let sim = SimTransport::new(
            SimMachine::default()
                .with_program(5, b"abcdef")
                .with_chunk_size(4)
                .with_block_numbers(true),
        );
        let h = sim.connect("h", 1, Duration::from_secs(1)).unwrap();
        assert_eq!(sim.upload_read(h), Err(EW_FUNC));
        sim.upload_start(h, 5).unwrap();
        assert_eq!(sim.upload_start(h, 5), Err(EW_BUSY));

        let first = sim.upload_read(h).unwrap();
        assert_eq!((first.data.as_slice(), first.complete, first.block), (&b"abcd"[..], false, Some(1)));
        let second = sim.upload_read(h).unwrap();
        assert_eq!((second.data.as_slice(), second.complete), (&b"ef"[..], true));
        assert!(sim.upload_read(h).unwrap().data.is_empty());

        assert!(sim.is_uploading(h));
        sim.upload_end(h).unwrap();
        assert!(!sim.is_uploading(h));
    }

    #[test]
    fn buffer_pressure_still_delivers_every_byte() {
        let sim = SimTransport::new(
            SimMachine::default()
                .with_program(5, b"abcdefghij")
                .with_chunk_size(4)
                .with_buffer_pressure(true),
        );
        let h = sim.connect("h", 1, Duration::from_secs(1)).unwrap();
        sim.upload_start(h, 5).unwrap();
        let mut text = Vec::new();
        loop {
            let chunk = sim.upload_read(h).unwrap();
            if chunk.data.is_empty() {
                break;
            }
            text.extend(chunk.data);
        }
        assert_eq!(text, b"abcdefghij");
    }

    #[test]
    fn file_uploads_and_parameters() {
        let sim = SimTransport::new(
            SimMachine::default()
                .with_program_file("//CNC_MEM/USER/PATH1/MAIN", b"%\nM30\n%")
                .without_parameter(PARAM_CYCLE_TIME),
        );
        let h = sim.connect("h", 1, Duration::from_secs(1)).unwrap();
        assert_eq!(sim.upload_start_path(h, "//CNC_MEM/USER/PATH1/NONE"), Err(EW_DATA));
        sim.upload_start_path(h, "//CNC_MEM/USER/PATH1/MAIN").unwrap();
        assert_eq!(sim.upload_start(h, 100), Err(EW_BUSY));
        assert_eq!(sim.read_parameter(h, PARAM_PARTS_COUNT), Ok(1532));
        assert_eq!(sim.read_parameter(h, PARAM_CYCLE_TIME), Err(EW_NUMBER));
    }

    #[test]
    fn configure_edits_running_machine() {
        let sim = SimTransport::default();
        let h = sim.connect("h", 1, Duration::from_secs(1)).unwrap();
        sim.configure(|m| m.status.run = 0);
        assert_eq!(sim.read_status(h).unwrap().run, 0);
    }

    #[test]
    fn generated_axes() {
        let m = SimMachine::default().with_axis_count(5);
        let names: Vec<u8> = m.axes.iter().map(|a| a.name).collect();
        assert_eq!(names, b"XYZAB");
    }
}
