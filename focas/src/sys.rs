//! Transport over the vendor `fwlib32` library.
//!
//! Every method corresponds 1:1 to a `cnc_*` call.
//! All `unsafe` code in the crate is confined to this module.

#![allow(unsafe_code, clippy::missing_docs_in_private_items)]

use std::ffi::{CString, c_char, c_long, c_short, c_ushort};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use focas_sys as sys;

use crate::code::{self, EW_BUFFER, EW_LENGTH, EW_NUMBER, EW_OK, EW_PARAM};
use crate::error::Result;
use crate::feed::OverrideKind;
use crate::handle::Handle;
use crate::position::PositionKind;
use crate::transport::{
    RawAlarm, RawAxisName, RawBlock, RawChunk, RawPosition, RawProgram, RawSpindle, RawStatus,
    RawSysInfo, Transport,
};

/// Size of the `cnc_upload` data buffer.
const UPLOAD_BUF: usize = 256;

/// Size of the buffer handed to `cnc_rdexecprog`.
const EXEC_BUF: usize = 256;

/// `cnc_rdposition` type selecting every coordinate system at once.
const ALL_POSITIONS: c_short = -1;

/// `cnc_rdalmmsg2` type selecting every alarm category.
const ALL_ALARMS: c_short = -1;

/// `cnc_rdspmeter` type selecting load and speed.
const ALL_METERS: c_short = -1;

/// `cnc_rdspload` spindle number selecting every spindle.
const ALL_SPINDLES: c_short = -1;

/// `cnc_upstart4` type for NC programs.
const NC_PROGRAM: c_short = 0;

/// Result of the one-time `cnc_startupprocess` call.
static STARTUP: OnceLock<i16> = OnceLock::new();

/// [`Transport`] backed by `libfwlib32`.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct Fwlib;

impl Fwlib {
    /// Initializes the library once per process and returns the transport.
    ///
    /// `log_path` receives the library's own log. Later calls reuse the
    /// first result and ignore their arguments.
    pub fn startup(level: u16, log_path: &Path) -> Result<Self> {
        let code = *STARTUP.get_or_init(|| start_process(level, log_path));
        code::check("cnc_startupprocess", code)?;
        Ok(Self)
    }
}

#[cfg(unix)]
fn start_process(level: u16, log_path: &Path) -> i16 {
    if let Some(dir) = log_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        let _ = std::fs::create_dir_all(dir);
    }
    let Some(path) = log_path.to_str().and_then(|p| CString::new(p).ok()) else {
        return EW_PARAM;
    };
    unsafe { sys::cnc_startupprocess(level, path.as_ptr()) }
}

// The Windows DLL initializes itself on load.
#[cfg(not(unix))]
const fn start_process(_level: u16, _log_path: &Path) -> i16 {
    EW_OK
}

fn status(ret: c_short) -> std::result::Result<(), i16> {
    if ret == EW_OK { Ok(()) } else { Err(ret) }
}

/// Bytes of a C character array up to the first NUL.
#[allow(clippy::cast_sign_loss)]
fn c_bytes(chars: &[c_char]) -> Vec<u8> {
    chars
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect()
}

#[allow(clippy::cast_sign_loss)]
fn c_array<const N: usize>(chars: [c_char; N]) -> [u8; N] {
    chars.map(|c| c as u8)
}

/// Clamps a count into the library's `short` range.
fn count(n: usize) -> c_short {
    c_short::try_from(n).unwrap_or(c_short::MAX)
}

/// A count reported back by the library; negative counts are a protocol error.
fn reported(n: c_short) -> std::result::Result<usize, i16> {
    usize::try_from(n).map_err(|_| EW_LENGTH)
}

/// Whole seconds for `cnc_allclibhndl3`, rounded up, at least one.
fn timeout_secs(timeout: Duration) -> c_long {
    let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
    c_long::try_from(secs.max(1)).unwrap_or(c_long::MAX)
}

/// `length` argument for records carrying one `long` after two `short`s.
fn long_record_len() -> c_short {
    c_short::try_from(4 + std::mem::size_of::<c_long>()).unwrap_or(c_short::MAX)
}

/// Bytes of a `cnc_upload` buffer that are valid for status `ret`.
fn upload_len(ret: c_short, len: c_ushort) -> usize {
    if ret == EW_OK || ret == EW_BUFFER {
        usize::from(len).min(UPLOAD_BUF)
    } else {
        0
    }
}

impl Transport for Fwlib {
    fn connect(&self, host: &str, port: u16, timeout: Duration) -> std::result::Result<Handle, i16> {
        let host = CString::new(host).map_err(|_| EW_PARAM)?;
        let mut handle: c_ushort = 0;
        status(unsafe {
            sys::cnc_allclibhndl3(host.as_ptr(), port, timeout_secs(timeout), &raw mut handle)
        })?;
        Ok(Handle::from_raw(handle))
    }

    fn disconnect(&self, handle: Handle) -> std::result::Result<(), i16> {
        status(unsafe { sys::cnc_freelibhndl(handle.raw()) })
    }

    fn read_status(&self, handle: Handle) -> std::result::Result<RawStatus, i16> {
        let mut st = sys::ODBST::default();
        status(unsafe { sys::cnc_statinfo(handle.raw(), &raw mut st) })?;
        Ok(RawStatus {
            tmmode: st.tmmode,
            aut: st.aut,
            run: st.run,
            motion: st.motion,
            mstb: st.mstb,
            emergency: st.emergency,
            alarm: st.alarm,
            edit: st.edit,
        })
    }

    fn read_sysinfo(&self, handle: Handle) -> std::result::Result<RawSysInfo, i16> {
        let mut info = sys::ODBSYS::default();
        status(unsafe { sys::cnc_sysinfo(handle.raw(), &raw mut info) })?;
        Ok(RawSysInfo {
            addinfo: info.addinfo,
            max_axis: info.max_axis,
            cnc_type: c_array(info.cnc_type),
            mt_type: c_array(info.mt_type),
            series: c_array(info.series),
            version: c_array(info.version),
            axes: c_array(info.axes),
        })
    }

    #[allow(clippy::cast_sign_loss)]
    fn read_axis_names(
        &self,
        handle: Handle,
        max: usize,
    ) -> std::result::Result<Vec<RawAxisName>, i16> {
        let mut num = count(max);
        let mut buf = vec![sys::ODBAXISNAME::default(); reported(num)?];
        status(unsafe { sys::cnc_rdaxisname(handle.raw(), &raw mut num, buf.as_mut_ptr()) })?;
        buf.truncate(reported(num)?);
        Ok(buf
            .into_iter()
            .map(|a| RawAxisName {
                name: a.name as u8,
                suffix: a.suff as u8,
            })
            .collect())
    }

    #[allow(clippy::cast_sign_loss)]
    fn read_position(
        &self,
        handle: Handle,
        kind: PositionKind,
        requested: usize,
    ) -> std::result::Result<Vec<RawPosition>, i16> {
        let mut num = count(requested);
        let capacity = reported(num)?;
        let mut buf = vec![sys::ODBPOS::default(); capacity];
        status(unsafe {
            sys::cnc_rdposition(handle.raw(), ALL_POSITIONS, &raw mut num, buf.as_mut_ptr())
        })?;
        let n = reported(num)?;
        if n > capacity {
            return Err(EW_LENGTH);
        }
        buf.truncate(n);
        Ok(buf
            .iter()
            .map(|p| {
                let e = match kind {
                    PositionKind::Absolute => &p.abs,
                    PositionKind::Relative => &p.rel,
                    PositionKind::Machine => &p.mach,
                    PositionKind::DistanceToGo => &p.dist,
                };
                RawPosition {
                    data: i64::from(e.data),
                    dec: e.dec,
                    name: e.name as u8,
                    suffix: e.suff as u8,
                }
            })
            .collect())
    }

    fn read_executing_program(&self, handle: Handle) -> std::result::Result<RawProgram, i16> {
        // SAFETY: plain C struct, all-zero is a valid value.
        let mut prg: sys::ODBEXEPRG = unsafe { std::mem::zeroed() };
        status(unsafe { sys::cnc_exeprgname(handle.raw(), &raw mut prg) })?;
        Ok(RawProgram {
            name: c_bytes(&prg.name),
            number: i64::from(prg.o_num),
        })
    }

    fn upload_start(&self, handle: Handle, program: u32) -> std::result::Result<(), i16> {
        let number = c_short::try_from(program).map_err(|_| EW_NUMBER)?;
        status(unsafe { sys::cnc_upstart(handle.raw(), number) })
    }

    #[allow(clippy::cast_sign_loss)]
    fn upload_read(&self, handle: Handle) -> std::result::Result<RawChunk, i16> {
        // SAFETY: plain C struct, all-zero is a valid value.
        let mut up: sys::ODBUP = unsafe { std::mem::zeroed() };
        let mut len = c_ushort::try_from(UPLOAD_BUF).unwrap_or(c_ushort::MAX);
        let ret = unsafe { sys::cnc_upload(handle.raw(), &raw mut up, &raw mut len) };
        let data = up.data[..upload_len(ret, len)].iter().map(|&c| c as u8).collect();
        // The library has no completion flag; a zero-length read ends the stream.
        RawChunk::from_reply(ret, data)
    }

    fn read_path(&self, handle: Handle) -> std::result::Result<(i16, i16), i16> {
        let (mut path, mut max): (c_short, c_short) = (0, 0);
        status(unsafe { sys::cnc_getpath(handle.raw(), &raw mut path, &raw mut max) })?;
        Ok((path, max))
    }

    fn upload_start_path(&self, handle: Handle, path: &str) -> std::result::Result<(), i16> {
        let path = CString::new(path).map_err(|_| EW_PARAM)?;
        status(unsafe { sys::cnc_upstart4(handle.raw(), NC_PROGRAM, path.as_ptr()) })
    }

    fn upload_end(&self, handle: Handle) -> std::result::Result<(), i16> {
        status(unsafe { sys::cnc_upend(handle.raw()) })
    }

    #[allow(clippy::cast_sign_loss)]
    fn read_alarms(&self, handle: Handle, max: usize) -> std::result::Result<Vec<RawAlarm>, i16> {
        let mut num = count(max);
        let capacity = reported(num)?;
        // SAFETY: plain C struct, all-zero is a valid value.
        let mut buf = vec![unsafe { std::mem::zeroed::<sys::ODBALMMSG2>() }; capacity];
        status(unsafe {
            sys::cnc_rdalmmsg2(handle.raw(), ALL_ALARMS, &raw mut num, buf.as_mut_ptr())
        })?;
        let n = reported(num)?;
        if n > capacity {
            return Err(EW_LENGTH);
        }
        Ok(buf[..n]
            .iter()
            .map(|a| {
                let len = usize::try_from(a.msg_len).unwrap_or(0).min(a.alm_msg.len());
                RawAlarm {
                    number: i64::from(a.alm_no),
                    kind: a.type_,
                    axis: a.axis,
                    message: a.alm_msg[..len].iter().map(|&c| c as u8).collect(),
                }
            })
            .collect())
    }

    fn read_executing_block(&self, handle: Handle) -> std::result::Result<RawBlock, i16> {
        let mut text: [c_char; EXEC_BUF] = [0; EXEC_BUF];
        let mut len = c_ushort::try_from(EXEC_BUF).unwrap_or(c_ushort::MAX);
        let mut block: c_short = 0;
        status(unsafe {
            sys::cnc_rdexecprog(
                handle.raw(),
                &raw mut len,
                &raw mut block,
                text.as_mut_ptr(),
            )
        })?;
        let n = usize::from(len).min(EXEC_BUF);
        Ok(RawBlock {
            block: i64::from(block),
            text: c_bytes(&text[..n]),
        })
    }

    fn read_actual_feed(&self, handle: Handle) -> std::result::Result<i64, i16> {
        let mut act = sys::ODBACT::default();
        status(unsafe { sys::cnc_actf(handle.raw(), &raw mut act) })?;
        Ok(i64::from(act.data))
    }

    fn read_actual_speed(&self, handle: Handle) -> std::result::Result<i64, i16> {
        let mut act = sys::ODBACT::default();
        status(unsafe { sys::cnc_acts(handle.raw(), &raw mut act) })?;
        Ok(i64::from(act.data))
    }

    fn read_parameter(&self, handle: Handle, number: u16) -> std::result::Result<i64, i16> {
        let number = c_short::try_from(number).map_err(|_| EW_NUMBER)?;
        // SAFETY: plain C struct, all-zero is a valid value.
        let mut prm: sys::IODBPSD = unsafe { std::mem::zeroed() };
        status(unsafe {
            sys::cnc_rdparam(handle.raw(), number, 0, long_record_len(), &raw mut prm)
        })?;
        Ok(i64::from(prm.ldata))
    }

    fn read_override(&self, handle: Handle, kind: OverrideKind) -> std::result::Result<i64, i16> {
        let (number, type_) = kind.selector();
        let mut tofs = sys::ODBTOFS::default();
        status(unsafe {
            sys::cnc_rdtofs(handle.raw(), number, type_, long_record_len(), &raw mut tofs)
        })?;
        Ok(i64::from(tofs.data))
    }

    fn read_spindles(&self, handle: Handle, max: usize) -> std::result::Result<Vec<RawSpindle>, i16> {
        let mut num = count(max);
        let capacity = reported(num)?;
        let mut buf = vec![sys::ODBSPLOAD::default(); capacity];
        status(unsafe {
            sys::cnc_rdspmeter(handle.raw(), ALL_METERS, &raw mut num, buf.as_mut_ptr())
        })?;
        let n = reported(num)?;
        if n > capacity {
            return Err(EW_LENGTH);
        }
        Ok(buf[..n]
            .iter()
            .map(|s| RawSpindle {
                load: i64::from(s.spload.data),
                load_dec: s.spload.dec,
                speed: i64::from(s.spspeed.data),
                speed_dec: s.spspeed.dec,
            })
            .collect())
    }

    fn read_spindle_override(&self, handle: Handle) -> std::result::Result<Vec<i16>, i16> {
        let mut spn = sys::ODBSPN::default();
        status(unsafe { sys::cnc_rdspload(handle.raw(), ALL_SPINDLES, &raw mut spn) })?;
        Ok(spn.data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_rounds_up_to_seconds() {
        assert_eq!(timeout_secs(Duration::from_millis(1)), 1);
        assert_eq!(timeout_secs(Duration::from_millis(5000)), 5);
        assert_eq!(timeout_secs(Duration::from_millis(5001)), 6);
    }

    #[test]
    fn full_buffer_bytes_are_valid() {
        assert_eq!(upload_len(EW_OK, 120), 120);
        assert_eq!(upload_len(EW_BUFFER, 256), 256);
        assert_eq!(upload_len(EW_BUFFER, 9999), UPLOAD_BUF);
        assert_eq!(upload_len(code::EW_SOCKET, 256), 0);
    }

    #[test]
    fn chunks_never_complete_by_content() {
        for data in [&b"G1 X10. F200 (FEED 50%)\n%"[..], b"M30\n%"] {
            let chunk = RawChunk::from_reply(EW_OK, data.to_vec()).unwrap_or_default();
            assert!(!chunk.complete);
            assert_eq!(chunk.data, data);
        }
    }
}
