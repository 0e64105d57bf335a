//! Integration tests: session lifecycle, upload state machine and
//! concurrency against the simulated controller.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use focas::{
    ConnectionTarget, EndOutcome, Error, Fault, Handle, HandleManager, PositionKind,
    ReleaseError, ReleaseOutcome, SimMachine, SimOp, SimTransport, UploadPhase,
};

// ── Helpers ──────────────────────────────────────────────────────

const PROGRAM: &[u8] = b"%\nO0100 (BRACKET)\nG90 G54 G0 X0 Y0\nG1 X25. F300\nG1 Y40.\nM30\n%";

fn manager(machine: SimMachine) -> HandleManager<SimTransport> {
    HandleManager::new(SimTransport::new(machine))
}

fn target() -> ConnectionTarget {
    ConnectionTarget::new("10.0.0.21", 8193, Duration::from_secs(2))
}

fn uploader() -> SimMachine {
    SimMachine::default()
        .with_program(100, PROGRAM)
        .with_chunk_size(16)
        .with_block_numbers(true)
}

// ── Lifecycle ────────────────────────────────────────────────────

#[test]
fn connect_then_release_leaves_nothing_live() {
    let m = manager(SimMachine::default());
    for _ in 0..3 {
        let h = m.connect(&target()).unwrap();
        assert!(m.is_live(h));
        assert!(m.release(h).unwrap().is_clean());
        assert!(!m.is_live(h));
    }
    assert!(m.live_handles().is_empty());
    assert_eq!(m.transport().open_sessions(), 0);
}

#[test]
fn never_issued_handle_is_invalid() {
    let m = manager(SimMachine::default());
    let bogus = Handle::from_raw(4711);
    assert!(matches!(m.machine_status(bogus), Err(Error::InvalidHandle(h)) if h == bogus));
    assert!(matches!(m.system_info(bogus), Err(Error::InvalidHandle(_))));
    assert!(matches!(m.start_upload(bogus, 100), Err(Error::InvalidHandle(_))));
    assert_eq!(m.transport().calls(SimOp::Status), 0);
    assert_eq!(m.transport().calls(SimOp::SysInfo), 0);
    assert_eq!(m.transport().calls(SimOp::UploadStart), 0);
}

#[test]
fn short_position_then_release_invalidates() {
    let m = manager(SimMachine::default().with_axis_count(3));
    let h = m.connect(&target()).unwrap();

    let snap = m.position(h, PositionKind::Absolute, 5).unwrap();
    assert_eq!(snap.values.len(), 3);

    m.release(h).unwrap();
    assert!(matches!(m.machine_status(h), Err(Error::InvalidHandle(x)) if x == h));
    assert!(matches!(
        m.release(h),
        Err(Error::Release(ReleaseError::AlreadyReleased(_)))
    ));
}

// ── Upload ───────────────────────────────────────────────────────

#[test]
fn second_start_is_busy_in_every_open_phase() {
    let m = manager(uploader().with_program(200, b"%\nO0200\nM30\n%"));
    let h = m.connect(&target()).unwrap();

    let mut s = m.start_upload(h, 100).unwrap();
    for program in [100, 200, 9999] {
        assert!(matches!(m.start_upload(h, program), Err(Error::UploadBusy(_))));
    }
    s.read().unwrap();
    assert!(matches!(s.phase(), UploadPhase::Streaming { .. }));
    for program in [100, 200] {
        assert!(matches!(m.start_upload(h, program), Err(Error::UploadBusy(_))));
    }
    s.end().unwrap();
    let mut next = m.start_upload(h, 200).unwrap();
    next.end().unwrap();
}

#[test]
fn chunks_reproduce_program() {
    let m = manager(uploader());
    let h = m.connect(&target()).unwrap();

    let mut s = m.start_upload(h, 100).unwrap();
    let mut chunks = Vec::new();
    while let Some(chunk) = s.read().unwrap() {
        chunks.push(chunk);
    }
    assert!(matches!(s.phase(), UploadPhase::Ended { .. }));
    assert!(chunks.last().unwrap().complete);
    assert!(chunks.iter().rev().skip(1).all(|c| !c.complete));

    let indices: Vec<u32> = chunks.iter().map(|c| c.index).collect();
    let expected: Vec<u32> = (0..u32::try_from(chunks.len()).unwrap()).collect();
    assert_eq!(indices, expected);

    let joined: Vec<u8> = chunks.into_iter().flat_map(|c| c.data).collect();
    assert_eq!(joined, PROGRAM);
    assert_eq!(s.end().unwrap(), EndOutcome::Ended);
}

#[test]
fn end_twice_is_not_fatal() {
    let m = manager(uploader());
    let h = m.connect(&target()).unwrap();
    let mut s = m.start_upload(h, 100).unwrap();
    assert_eq!(s.end().unwrap(), EndOutcome::Ended);
    assert_eq!(s.end().unwrap(), EndOutcome::AlreadyEnded);
    assert_eq!(m.transport().calls(SimOp::UploadEnd), 1);
    assert!(m.machine_status(h).is_ok());
}

#[test]
fn release_mid_stream_force_ends() {
    let m = manager(uploader());
    let h = m.connect(&target()).unwrap();

    let mut s = m.start_upload(h, 100).unwrap();
    let first = s.read().unwrap().unwrap();
    assert!(!first.complete);

    let outcome = m.release(h).unwrap();
    assert!(outcome.is_clean());
    assert!(!m.is_live(h));
    assert!(!m.transport().is_uploading(h));

    assert!(matches!(s.read(), Err(Error::UploadNotOpen(_))));
    assert_eq!(s.end().unwrap(), EndOutcome::AlreadyEnded);
    drop(s);
    assert_eq!(m.transport().calls(SimOp::UploadEnd), 1);
}

#[test]
fn release_mid_stream_with_failed_end_is_partial() {
    let m = manager(uploader());
    let h = m.connect(&target()).unwrap();
    let mut s = m.start_upload(h, 100).unwrap();
    s.read().unwrap();

    m.transport().fail_next(SimOp::UploadEnd, focas::code::EW_SOCKET);
    match m.release(h).unwrap() {
        ReleaseOutcome::PartialCleanup {
            cause: Error::Cnc { op, fault },
        } => {
            assert_eq!(op, "cnc_upend");
            assert_eq!(fault, Fault::Disconnected);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(!m.is_live(h));
    assert_eq!(m.transport().open_sessions(), 0);
}

#[test]
fn recycled_handle_does_not_inherit_upload() {
    let m = manager(uploader());
    let h = m.connect(&target()).unwrap();
    let mut stale = m.start_upload(h, 100).unwrap();
    m.release(h).unwrap();

    let again = m.connect(&target()).unwrap();
    assert_eq!(again, h);
    assert_eq!(m.upload_phase(again).unwrap(), UploadPhase::Idle);
    assert!(matches!(stale.read(), Err(Error::UploadNotOpen(_))));
    drop(stale);
    assert!(m.machine_status(again).is_ok());
}

// ── Concurrency ──────────────────────────────────────────────────

#[test]
fn handles_work_in_parallel() {
    let m = manager(uploader());
    let handles: Vec<Handle> = (0..4).map(|_| m.connect(&target()).unwrap()).collect();

    thread::scope(|scope| {
        for (i, &h) in handles.iter().enumerate() {
            let m = &m;
            scope.spawn(move || {
                if i % 2 == 0 {
                    let mut s = m.start_upload(h, 100).unwrap();
                    let mut buf = Vec::new();
                    s.read_to_end(&mut buf).unwrap();
                    assert_eq!(buf, PROGRAM);
                    s.end().unwrap();
                } else {
                    for _ in 0..20 {
                        m.machine_status(h).unwrap();
                        m.position(h, PositionKind::Machine, 3).unwrap();
                    }
                }
            });
        }
    });

    for (h, result) in m.release_all() {
        assert!(result.unwrap().is_clean(), "handle {h}");
    }
    assert_eq!(m.transport().open_sessions(), 0);
}

#[test]
fn release_waits_for_in_flight_call() {
    let latency = Duration::from_millis(300);
    let m = Arc::new(manager(SimMachine::default().with_latency(latency)));
    let h = m.connect(&target()).unwrap();

    let worker = {
        let m = Arc::clone(&m);
        thread::spawn(move || m.machine_status(h))
    };
    thread::sleep(Duration::from_millis(50));

    m.release(h).unwrap();

    assert!(worker.join().unwrap().is_ok());
    assert!(matches!(m.machine_status(h), Err(Error::InvalidHandle(_))));
}
