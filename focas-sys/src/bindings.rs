// Hand-maintained subset of fwlib32.h. Regenerate with the `regenerate`
// feature and `FOCAS_UPDATE_BINDINGS=1` to refresh from a vendor header.

pub use core::ffi::{c_char, c_long, c_short, c_ushort};

pub const EW_PROTOCOL: c_short = -17;
pub const EW_SOCKET: c_short = -16;
pub const EW_NODLL: c_short = -15;
pub const EW_BUS: c_short = -11;
pub const EW_SYSTEM2: c_short = -10;
pub const EW_HSSB: c_short = -9;
pub const EW_HANDLE: c_short = -8;
pub const EW_VERSION: c_short = -7;
pub const EW_UNEXP: c_short = -6;
pub const EW_SYSTEM: c_short = -5;
pub const EW_PARITY: c_short = -4;
pub const EW_MMCSYS: c_short = -3;
pub const EW_RESET: c_short = -2;
pub const EW_BUSY: c_short = -1;
pub const EW_OK: c_short = 0;
pub const EW_FUNC: c_short = 1;
pub const EW_LENGTH: c_short = 2;
pub const EW_NUMBER: c_short = 3;
pub const EW_ATTRIB: c_short = 4;
pub const EW_DATA: c_short = 5;
pub const EW_NOOPT: c_short = 6;
pub const EW_PROT: c_short = 7;
pub const EW_OVRFLOW: c_short = 8;
pub const EW_PARAM: c_short = 9;
pub const EW_BUFFER: c_short = 10;
pub const EW_PATH: c_short = 11;
pub const EW_MODE: c_short = 12;
pub const EW_REJECT: c_short = 13;
pub const EW_DTSRVR: c_short = 14;
pub const EW_ALARM: c_short = 15;
pub const EW_STOP: c_short = 16;
pub const EW_PASSWD: c_short = 17;

pub const MAX_AXIS: usize = 32;
pub const MAX_SPINDLE: usize = 8;

/// cnc_statinfo
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ODBST {
    pub hdck: c_short,
    pub tmmode: c_short,
    pub aut: c_short,
    pub run: c_short,
    pub motion: c_short,
    pub mstb: c_short,
    pub emergency: c_short,
    pub alarm: c_short,
    pub edit: c_short,
}

/// cnc_sysinfo
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ODBSYS {
    pub addinfo: c_short,
    pub max_axis: c_short,
    pub cnc_type: [c_char; 2],
    pub mt_type: [c_char; 2],
    pub series: [c_char; 4],
    pub version: [c_char; 4],
    pub axes: [c_char; 2],
}

/// cnc_rdaxisname
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ODBAXISNAME {
    pub name: c_char,
    pub suff: c_char,
}

/// One position element of cnc_rdposition.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct POSELM {
    pub data: c_long,
    pub dec: c_short,
    pub unit: c_short,
    pub disp: c_short,
    pub name: c_char,
    pub suff: c_char,
}

/// cnc_rdposition (one per axis)
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ODBPOS {
    pub abs: POSELM,
    pub mach: POSELM,
    pub rel: POSELM,
    pub dist: POSELM,
}

/// cnc_exeprgname
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ODBEXEPRG {
    pub name: [c_char; 36],
    pub o_num: c_long,
}

/// cnc_upload
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ODBUP {
    pub dummy: [c_short; 2],
    pub data: [c_char; 256],
}

/// cnc_actf, cnc_acts
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ODBACT {
    pub dummy: [c_short; 2],
    pub data: c_long,
}

/// cnc_rdalmmsg2
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ODBALMMSG2 {
    pub alm_no: c_long,
    pub type_: c_short,
    pub axis: c_short,
    pub dummy: c_short,
    pub msg_len: c_short,
    pub alm_msg: [c_char; 64],
}

/// cnc_rdparam, with the data union flattened to its `ldata` view.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct IODBPSD {
    pub datano: c_short,
    pub type_: c_short,
    pub ldata: c_long,
    pub reserve: [c_long; 2 * MAX_AXIS - 1],
}

/// cnc_rdtofs
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ODBTOFS {
    pub datano: c_short,
    pub type_: c_short,
    pub data: c_long,
}

/// One meter element of cnc_rdspmeter.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct LOADELM {
    pub data: c_long,
    pub dec: c_short,
    pub unit: c_short,
    pub name: c_char,
    pub suff1: c_char,
    pub suff2: c_char,
    pub reserve: c_char,
}

/// cnc_rdspmeter (one per spindle)
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ODBSPLOAD {
    pub spload: LOADELM,
    pub spspeed: LOADELM,
}

/// cnc_rdspload
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ODBSPN {
    pub datano: c_short,
    pub type_: c_short,
    pub data: [c_short; MAX_SPINDLE],
}

unsafe extern "C" {
    pub fn cnc_startupprocess(level: c_ushort, filename: *const c_char) -> c_short;
    pub fn cnc_exitprocess() -> c_short;

    pub fn cnc_allclibhndl3(
        ipaddr: *const c_char,
        port: c_ushort,
        timeout: c_long,
        FlibHndl: *mut c_ushort,
    ) -> c_short;
    pub fn cnc_freelibhndl(FlibHndl: c_ushort) -> c_short;

    pub fn cnc_statinfo(FlibHndl: c_ushort, statinfo: *mut ODBST) -> c_short;
    pub fn cnc_sysinfo(FlibHndl: c_ushort, sysinfo: *mut ODBSYS) -> c_short;
    pub fn cnc_rdaxisname(
        FlibHndl: c_ushort,
        data_num: *mut c_short,
        axname: *mut ODBAXISNAME,
    ) -> c_short;
    pub fn cnc_rdposition(
        FlibHndl: c_ushort,
        type_: c_short,
        data_num: *mut c_short,
        position: *mut ODBPOS,
    ) -> c_short;
    pub fn cnc_exeprgname(FlibHndl: c_ushort, exeprg: *mut ODBEXEPRG) -> c_short;
    pub fn cnc_rdexecprog(
        FlibHndl: c_ushort,
        length: *mut c_ushort,
        blknum: *mut c_short,
        data: *mut c_char,
    ) -> c_short;

    pub fn cnc_upstart(FlibHndl: c_ushort, prgnum: c_short) -> c_short;
    pub fn cnc_upload(FlibHndl: c_ushort, upload: *mut ODBUP, length: *mut c_ushort) -> c_short;
    pub fn cnc_upend(FlibHndl: c_ushort) -> c_short;
    pub fn cnc_upstart4(FlibHndl: c_ushort, type_: c_short, prgname: *const c_char) -> c_short;
    pub fn cnc_getpath(
        FlibHndl: c_ushort,
        path_no: *mut c_short,
        maxpath_no: *mut c_short,
    ) -> c_short;

    pub fn cnc_rdparam(
        FlibHndl: c_ushort,
        number: c_short,
        axis: c_short,
        length: c_short,
        param: *mut IODBPSD,
    ) -> c_short;
    pub fn cnc_rdtofs(
        FlibHndl: c_ushort,
        number: c_short,
        type_: c_short,
        length: c_short,
        tofs: *mut ODBTOFS,
    ) -> c_short;
    pub fn cnc_rdspmeter(
        FlibHndl: c_ushort,
        type_: c_short,
        data_num: *mut c_short,
        loadmeter: *mut ODBSPLOAD,
    ) -> c_short;
    pub fn cnc_rdspload(FlibHndl: c_ushort, sp_no: c_short, serialspindle: *mut ODBSPN) -> c_short;

    pub fn cnc_actf(FlibHndl: c_ushort, actualfeed: *mut ODBACT) -> c_short;
    pub fn cnc_acts(FlibHndl: c_ushort, actualspindle: *mut ODBACT) -> c_short;
    pub fn cnc_rdalmmsg2(
        FlibHndl: c_ushort,
        type_: c_short,
        num: *mut c_short,
        almmsg: *mut ODBALMMSG2,
    ) -> c_short;
}
