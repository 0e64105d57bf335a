//! Point-in-time reads against a live handle.
//!
//! Every query validates the handle before touching the transport and is
//! rejected with [`Error::HandleBusy`] while an upload is open on it.

use tracing::warn;

use crate::alarm::Alarm;
use crate::code::call;
use crate::error::{Error, Fault, Result};
use crate::feed::OverrideKind;
use crate::handle::Handle;
use crate::manager::HandleManager;
use crate::parameter::ParameterCounters;
use crate::position::{AxisName, AxisValue, PositionKind, PositionSnapshot};
use crate::program::{ExecutingBlock, ExecutingProgram};
use crate::spindle::{MAX_SPINDLES, SpindleInfo};
use crate::status::{MachineStatus, SystemInfo};
use crate::transport::Transport;

/// Reply carried more entries than asked for, or an impossible value.
const fn data_fault(op: &'static str) -> Error {
    Error::Cnc {
        op,
        fault: Fault::DataFault,
    }
}

impl<T: Transport> HandleManager<T> {
    /// Run, mode, motion, emergency and alarm state.
    pub fn machine_status(&self, handle: Handle) -> Result<MachineStatus> {
        self.with_idle(handle, |t| {
            let raw = call("cnc_statinfo", t.read_status(handle))?;
            Ok(MachineStatus::from_raw(&raw))
        })
    }

    /// Controller identification.
    pub fn system_info(&self, handle: Handle) -> Result<SystemInfo> {
        self.with_idle(handle, |t| {
            let raw = call("cnc_sysinfo", t.read_sysinfo(handle))?;
            Ok(SystemInfo::from_raw(&raw))
        })
    }

    /// Name of the axis at `index` (zero-based), or `None` when the
    /// controller has no such axis.
    pub fn axis_name(&self, handle: Handle, index: usize) -> Result<Option<AxisName>> {
        let wanted = index
            .checked_add(1)
            .ok_or(Error::InvalidArgument("axis index out of range"))?;
        self.with_idle(handle, |t| {
            let names = call("cnc_rdaxisname", t.read_axis_names(handle, wanted))?;
            if names.len() > wanted {
                return Err(data_fault("cnc_rdaxisname"));
            }
            Ok(names.get(index).copied().map(AxisName::from))
        })
    }

    /// Names of all controlled axes, bounded by the controller's maximum.
    pub fn axis_names(&self, handle: Handle) -> Result<Vec<AxisName>> {
        self.with_idle(handle, |t| {
            let info = call("cnc_sysinfo", t.read_sysinfo(handle))?;
            let max = usize::try_from(info.max_axis).unwrap_or(0);
            if max == 0 {
                return Ok(Vec::new());
            }
            let names = call("cnc_rdaxisname", t.read_axis_names(handle, max))?;
            if names.len() > max {
                return Err(data_fault("cnc_rdaxisname"));
            }
            Ok(names.into_iter().map(AxisName::from).collect())
        })
    }

    /// Positions of up to `requested` axes.
    ///
    /// The controller may report fewer axes; the snapshot holds exactly
    /// what was reported. More than requested is a data fault.
    pub fn position(
        &self,
        handle: Handle,
        kind: PositionKind,
        requested: usize,
    ) -> Result<PositionSnapshot> {
        self.with_idle(handle, |t| {
            if requested == 0 {
                return Err(Error::InvalidArgument("requested axis count must be positive"));
            }
            let raw = call("cnc_rdposition", t.read_position(handle, kind, requested))?;
            if raw.len() > requested {
                return Err(data_fault("cnc_rdposition"));
            }
            Ok(PositionSnapshot {
                kind,
                requested,
                values: raw.iter().map(AxisValue::from_raw).collect(),
            })
        })
    }

    /// Name and number of the program selected for execution.
    pub fn executing_program(&self, handle: Handle) -> Result<ExecutingProgram> {
        self.with_idle(handle, |t| {
            let raw = call("cnc_exeprgname", t.read_executing_program(handle))?;
            ExecutingProgram::from_raw(&raw)
        })
    }

    /// Up to `max` active alarms with a message.
    pub fn alarms(&self, handle: Handle, max: usize) -> Result<Vec<Alarm>> {
        self.with_idle(handle, |t| {
            if max == 0 {
                return Err(Error::InvalidArgument("alarm count must be positive"));
            }
            let raw = call("cnc_rdalmmsg2", t.read_alarms(handle, max))?;
            if raw.len() > max {
                return Err(data_fault("cnc_rdalmmsg2"));
            }
            Ok(raw.iter().filter_map(Alarm::from_raw).collect())
        })
    }

    /// The block being executed.
    pub fn executing_block(&self, handle: Handle) -> Result<ExecutingBlock> {
        self.with_idle(handle, |t| {
            let raw = call("cnc_rdexecprog", t.read_executing_block(handle))?;
            Ok(ExecutingBlock::from_raw(&raw))
        })
    }

    /// Actual contour feed rate in the controller's units (mm/min or
    /// inch/min).
    #[doc(alias = "contour_feed_rate")]
    pub fn actual_feed_rate(&self, handle: Handle) -> Result<i64> {
        self.with_idle(handle, |t| call("cnc_actf", t.read_actual_feed(handle)))
    }

    /// Actual spindle speed in rpm.
    pub fn actual_spindle_speed(&self, handle: Handle) -> Result<i64> {
        self.with_idle(handle, |t| call("cnc_acts", t.read_actual_speed(handle)))
    }

    /// Feed or jog override in percent.
    pub fn override_percentage(&self, handle: Handle, kind: OverrideKind) -> Result<i64> {
        self.with_idle(handle, |t| call("cnc_rdtofs", t.read_override(handle, kind)))
    }

    /// Load, speed and override of every spindle.
    ///
    /// The override is read separately; when that read fails the spindles
    /// are still returned, without an override.
    pub fn spindles(&self, handle: Handle) -> Result<Vec<SpindleInfo>> {
        self.with_idle(handle, |t| {
            let meters = call("cnc_rdspmeter", t.read_spindles(handle, MAX_SPINDLES))?;
            if meters.len() > MAX_SPINDLES {
                return Err(data_fault("cnc_rdspmeter"));
            }
            let overrides = t
                .read_spindle_override(handle)
                .map_err(|code| warn!(handle = %handle, code, "spindle override unavailable"))
                .unwrap_or_default();
            Ok(meters
                .iter()
                .enumerate()
                .map(|(i, raw)| SpindleInfo::from_raw(i, raw, overrides.get(i).copied()))
                .collect())
        })
    }

    /// A long parameter that is not axis-specific.
    pub fn parameter(&self, handle: Handle, number: u16) -> Result<i64> {
        self.with_idle(handle, |t| call("cnc_rdparam", t.read_parameter(handle, number)))
    }

    /// Parts counter and machine timers.
    ///
    /// Parameters that cannot be read are logged and left `None`. Fails only
    /// when none of them could be read, with the first failure.
    pub fn parameter_counters(&self, handle: Handle) -> Result<ParameterCounters> {
        self.with_idle(handle, |t| {
            let mut values = [None; 5];
            let mut first_err = None;
            for (slot, number) in values.iter_mut().zip(ParameterCounters::PARAMETERS) {
                match call("cnc_rdparam", t.read_parameter(handle, number)) {
                    Ok(v) => *slot = Some(v),
                    Err(e) => {
                        warn!(handle = %handle, parameter = number, error = %e, "parameter unavailable");
                        first_err.get_or_insert(e);
                    }
                }
            }
            match first_err {
                Some(e) if values.iter().all(Option::is_none) => Err(e),
                _ => Ok(ParameterCounters::from_values(values)),
            }
        })
    }

    /// Current CNC path number, starting at 1.
    pub fn current_path(&self, handle: Handle) -> Result<i16> {
        self.with_idle(handle, |t| {
            let (path, max) = call("cnc_getpath", t.read_path(handle))?;
            if path < 1 || (max > 0 && path > max) {
                return Err(data_fault("cnc_getpath"));
            }
            Ok(path)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::code::{EW_BUSY, EW_SOCKET};
    use crate::handle::ConnectionTarget;
    use crate::sim::{SimMachine, SimOp, SimTransport};
    use crate::parameter::{PARAM_CYCLE_TIME, PARAM_PARTS_COUNT};
    use crate::status::RunState;

    fn connected(machine: SimMachine) -> (HandleManager<SimTransport>, Handle) {
        let m = HandleManager::new(SimTransport::new(machine));
        let h = m.connect(&ConnectionTarget::with_defaults("cnc")).unwrap();
        (m, h)
    }

    #[test]
    fn unknown_handle_never_calls_transport() {
        let m = HandleManager::new(SimTransport::new(SimMachine::default()));
        let h = Handle::from_raw(42);
        assert!(matches!(m.machine_status(h), Err(Error::InvalidHandle(x)) if x == h));
        assert!(matches!(
            m.position(h, PositionKind::Absolute, 3),
            Err(Error::InvalidHandle(_))
        ));
        assert_eq!(m.transport().calls(SimOp::Status), 0);
        assert_eq!(m.transport().calls(SimOp::Position), 0);
    }

    #[test]
    fn status_and_info() {
        let (m, h) = connected(SimMachine::default());
        let status = m.machine_status(h).unwrap();
        assert_eq!(status.run, RunState::Start);
        let info = m.system_info(h).unwrap();
        assert_eq!(info.axes, Some(3));
        assert_eq!(info.model(), "Series D4F1 Version 0030");
    }

    #[test]
    fn short_position_read_is_authoritative() {
        let (m, h) = connected(SimMachine::default());
        let snap = m.position(h, PositionKind::Absolute, 5).unwrap();
        assert_eq!(snap.requested, 5);
        assert_eq!(snap.values.len(), 3);
        let names: Vec<String> = snap.values.iter().map(|v| v.name.to_string()).collect();
        assert_eq!(names, ["X", "Y", "Z"]);
    }

    #[test]
    fn position_kinds_differ() {
        let (m, h) = connected(SimMachine::default());
        let abs = m.position(h, PositionKind::Absolute, 3).unwrap();
        let mach = m.position(h, PositionKind::Machine, 3).unwrap();
        assert_ne!(abs.values[0].raw, mach.values[0].raw);
    }

    #[test]
    fn over_reported_positions_are_a_data_fault() {
        let (m, h) = connected(SimMachine::default().with_extra_positions(1));
        assert!(matches!(
            m.position(h, PositionKind::Relative, 3),
            Err(Error::Cnc {
                op: "cnc_rdposition",
                fault: Fault::DataFault
            })
        ));
    }

    #[test]
    fn zero_requested_is_invalid() {
        let (m, h) = connected(SimMachine::default());
        assert!(matches!(
            m.position(h, PositionKind::Absolute, 0),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(m.transport().calls(SimOp::Position), 0);
    }

    #[test]
    fn axis_name_past_end_is_none() {
        let (m, h) = connected(SimMachine::default());
        assert_eq!(m.axis_name(h, 0).unwrap().unwrap().to_string(), "X");
        assert_eq!(m.axis_name(h, 2).unwrap().unwrap().to_string(), "Z");
        assert!(m.axis_name(h, 3).unwrap().is_none());
        let all = m.axis_names(h).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn transport_faults_are_decoded() {
        let (m, h) = connected(SimMachine::default());
        m.transport().fail_next(SimOp::Status, EW_BUSY);
        let err = m.machine_status(h).unwrap_err();
        assert!(err.is_transient());
        m.transport().fail_next(SimOp::Status, EW_SOCKET);
        assert!(matches!(
            m.machine_status(h),
            Err(Error::Cnc {
                fault: Fault::Disconnected,
                ..
            })
        ));
        // Faults do not unregister the handle.
        assert!(m.is_live(h));
        assert!(m.machine_status(h).is_ok());
    }

    #[test]
    fn long_program_name_rejected() {
        let long = "O".repeat(40);
        let (m, h) = connected(SimMachine::default().with_executing(&long, 1));
        assert!(matches!(
            m.executing_program(h),
            Err(Error::NameTooLong { len: 40, max: 35 })
        ));
    }

    #[test]
    fn overrides_and_spindles() {
        let (m, h) = connected(SimMachine::default());
        assert_eq!(m.override_percentage(h, OverrideKind::Feed).unwrap(), 100);
        assert_eq!(m.override_percentage(h, OverrideKind::Jog).unwrap(), 50);

        let spindles = m.spindles(h).unwrap();
        assert_eq!(spindles.len(), 1);
        assert_eq!(spindles[0].number, 1);
        assert!((spindles[0].load - 12.5).abs() < f64::EPSILON);
        assert_eq!(spindles[0].override_percent, Some(100));
    }

    #[test]
    fn spindle_override_failure_is_not_fatal() {
        let (m, h) = connected(SimMachine::default());
        m.transport().fail_next(SimOp::SpindleOverride, EW_BUSY);
        let spindles = m.spindles(h).unwrap();
        assert_eq!(spindles[0].override_percent, None);
        m.transport().fail_next(SimOp::Spindles, EW_SOCKET);
        assert!(m.spindles(h).is_err());
    }

    #[test]
    fn counters_tolerate_missing_parameters() {
        let (m, h) = connected(SimMachine::default().without_parameter(PARAM_CYCLE_TIME));
        let c = m.parameter_counters(h).unwrap();
        assert_eq!(c.parts_count, Some(1532));
        assert_eq!(c.power_on_secs, Some(1_296_000));
        assert_eq!(c.cycle_secs, None);
        assert_eq!(m.parameter(h, PARAM_PARTS_COUNT).unwrap(), 1532);
        assert!(matches!(
            m.parameter(h, PARAM_CYCLE_TIME),
            Err(Error::Cnc {
                fault: Fault::DataFault,
                ..
            })
        ));
    }

    #[test]
    fn counters_fail_when_nothing_reads() {
        let (m, h) = connected(SimMachine::default());
        for _ in 0..5 {
            m.transport().fail_next(SimOp::Parameter, EW_SOCKET);
        }
        assert!(matches!(
            m.parameter_counters(h),
            Err(Error::Cnc {
                fault: Fault::Disconnected,
                ..
            })
        ));
    }

    #[test]
    fn path_number() {
        let (m, h) = connected(SimMachine::default());
        assert_eq!(m.current_path(h).unwrap(), 1);
        m.transport().configure(|machine| machine.path = 0);
        assert!(matches!(
            m.current_path(h),
            Err(Error::Cnc {
                op: "cnc_getpath",
                fault: Fault::DataFault
            })
        ));
    }

    #[test]
    fn supplementary_reads() {
        let (m, h) = connected(SimMachine::default());
        let prog = m.executing_program(h).unwrap();
        assert_eq!(prog.name, "O100");
        let alarms = m.alarms(h, 10).unwrap();
        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].number, 1001);
        assert_eq!(m.executing_block(h).unwrap().text, "G01 X10. F200");
        assert_eq!(m.actual_feed_rate(h).unwrap(), 200);
        assert_eq!(m.actual_spindle_speed(h).unwrap(), 1200);
    }
}
