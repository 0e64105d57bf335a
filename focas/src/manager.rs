//! Handle registry and session lifecycle.
//!
//! The registry lock is held only to look up, insert or remove a slot. Each
//! live handle has its own slot lock, held for the whole duration of every
//! vendor call on that handle. Different handles never contend.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::code;
use crate::error::{ConnectError, Error, ReleaseError, Result};
use crate::handle::{ConnectionTarget, Handle};
use crate::state::UploadPhase;
use crate::transport::Transport;

/// Result of a successful release.
#[derive(Debug)]
#[non_exhaustive]
pub enum ReleaseOutcome {
    /// Upload (if any) ended and the session closed cleanly.
    Clean,
    /// The handle is gone, but ending the upload or closing the session
    /// failed on the controller side.
    PartialCleanup {
        /// First cleanup failure.
        cause: Error,
    },
}

impl ReleaseOutcome {
    /// `true` for [`ReleaseOutcome::Clean`].
    pub const fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }
}

/// Owns the identity and liveness of every session.
///
/// `HandleManager` is `Send + Sync`; share it by reference or `Arc`. Query
/// and upload operations live in sibling modules as further `impl` blocks.
pub struct HandleManager<T: Transport> {
    /// Vendor call seam.
    pub(crate) transport: T,
    /// Live and released handles.
    registry: Mutex<Registry>,
    /// Source of upload generations, unique across recycled handles.
    generations: AtomicU64,
}

impl<T: Transport> std::fmt::Debug for HandleManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleManager")
            .field("live", &self.live_handles())
            .finish_non_exhaustive()
    }
}

/// Handle bookkeeping behind the registry lock.
#[derive(Default)]
struct Registry {
    /// Handles registered live.
    live: HashMap<Handle, Arc<Slot>>,
    /// Handles released and not reissued since.
    released: HashSet<Handle>,
}

/// Per-handle entry.
pub(crate) struct Slot {
    /// `host:port`, for diagnostics.
    pub(crate) peer: String,
    /// Guarded session state.
    state: Mutex<SlotState>,
}

/// Mutable per-handle state, only touched under the slot lock.
#[derive(Debug, Default)]
pub(crate) struct SlotState {
    /// Cleared by release before any cleanup runs.
    pub(crate) live: bool,
    /// Upload state machine.
    pub(crate) upload: UploadPhase,
    /// Generation of the current upload; ties an `UploadSession` to it.
    pub(crate) generation: u64,
    /// Last block number seen in the current upload.
    pub(crate) last_block: Option<u32>,
}

impl Slot {
    fn new(peer: String) -> Self {
        Self {
            peer,
            state: Mutex::new(SlotState {
                live: true,
                ..SlotState::default()
            }),
        }
    }

    /// Locks the slot, recovering from poisoning. State transitions are
    /// written in one assignment, so a poisoned guard is still consistent.
    pub(crate) fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Transport> HandleManager<T> {
    /// Creates a manager over `transport`.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            registry: Mutex::new(Registry::default()),
            generations: AtomicU64::new(0),
        }
    }

    /// The underlying transport.
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A generation number never handed out before by this manager.
    pub(crate) fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The slot of a registered handle.
    pub(crate) fn slot(&self, handle: Handle) -> Option<Arc<Slot>> {
        self.registry().live.get(&handle).map(Arc::clone)
    }

    /// Runs `f` under the slot lock of a live handle with no upload open.
    pub(crate) fn with_idle<R>(&self, handle: Handle, f: impl FnOnce(&T) -> Result<R>) -> Result<R> {
        let slot = self.slot(handle).ok_or(Error::InvalidHandle(handle))?;
        let state = slot.lock();
        if !state.live {
            return Err(Error::InvalidHandle(handle));
        }
        if state.upload.is_open() {
            return Err(Error::HandleBusy(handle));
        }
        f(&self.transport)
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Opens a session and registers its handle live.
    ///
    /// A zero timeout is rejected before the transport is touched.
    pub fn connect(&self, target: &ConnectionTarget) -> Result<Handle> {
        if target.timeout.is_zero() {
            return Err(Error::InvalidTimeout);
        }
        if target.host.is_empty() || target.host.contains('\0') {
            return Err(Error::InvalidArgument("host must be non-empty and free of NUL"));
        }

        let peer = target.peer();
        let handle = self
            .transport
            .connect(&target.host, target.port, target.timeout)
            .map_err(|code| {
                let err = ConnectError::from_code(code);
                warn!(peer = %peer, code, error = %err, "connect failed");
                err
            })?;

        let mut registry = self.registry();
        if registry.live.contains_key(&handle) {
            // Closing it would tear down the session already registered.
            return Err(ConnectError::DuplicateHandle(handle.raw()).into());
        }
        registry.released.remove(&handle);
        registry.live.insert(handle, Arc::new(Slot::new(peer.clone())));
        drop(registry);

        info!(handle = %handle, peer = %peer, "connected");
        Ok(handle)
    }

    /// Releases a handle, force-ending any open upload first.
    ///
    /// Blocks until the in-flight call on this handle (if any) returns. Once
    /// this returns, no operation runs against the handle. Cleanup failures
    /// never keep the handle alive; they are reported as
    /// [`ReleaseOutcome::PartialCleanup`].
    pub fn release(&self, handle: Handle) -> Result<ReleaseOutcome> {
        let slot = {
            let registry = self.registry();
            match registry.live.get(&handle) {
                Some(slot) => Arc::clone(slot),
                None if registry.released.contains(&handle) => {
                    return Err(ReleaseError::AlreadyReleased(handle).into());
                }
                None => return Err(ReleaseError::NotFound(handle).into()),
            }
        };

        let mut state = slot.lock();
        if !state.live {
            return Err(ReleaseError::AlreadyReleased(handle).into());
        }
        state.live = false;

        let mut cause = None;
        let prior = state.upload.reset();
        if prior.is_open() {
            match self.transport.upload_end(handle) {
                Ok(()) => debug!(handle = %handle, phase = %prior, "upload force-ended"),
                Err(code) => {
                    let err = code::failure("cnc_upend", code);
                    warn!(handle = %handle, error = %err, "force-ending upload failed");
                    cause = Some(err);
                }
            }
        }

        {
            let mut registry = self.registry();
            registry.live.remove(&handle);
            registry.released.insert(handle);
        }

        if let Err(code) = self.transport.disconnect(handle) {
            let err = code::failure("cnc_freelibhndl", code);
            warn!(handle = %handle, error = %err, "closing session failed");
            cause.get_or_insert(err);
        }
        drop(state);

        info!(handle = %handle, peer = %slot.peer, clean = cause.is_none(), "released");
        Ok(cause.map_or(ReleaseOutcome::Clean, |cause| {
            ReleaseOutcome::PartialCleanup { cause }
        }))
    }

    /// Releases every live handle.
    pub fn release_all(&self) -> Vec<(Handle, Result<ReleaseOutcome>)> {
        self.live_handles()
            .into_iter()
            .map(|handle| (handle, self.release(handle)))
            .collect()
    }

    // ── Inspection ───────────────────────────────────────────────

    /// Whether `handle` is registered live.
    pub fn is_live(&self, handle: Handle) -> bool {
        self.registry().live.contains_key(&handle)
    }

    /// All live handles, ascending.
    pub fn live_handles(&self) -> Vec<Handle> {
        let mut handles: Vec<Handle> = self.registry().live.keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    /// `host:port` the handle was opened against.
    pub fn peer(&self, handle: Handle) -> Option<String> {
        self.slot(handle).map(|slot| slot.peer.clone())
    }

    /// Current upload phase of a live handle.
    pub fn upload_phase(&self, handle: Handle) -> Result<UploadPhase> {
        let slot = self.slot(handle).ok_or(Error::InvalidHandle(handle))?;
        let state = slot.lock();
        if !state.live {
            return Err(Error::InvalidHandle(handle));
        }
        Ok(state.upload)
    }
}

impl<T: Transport> Drop for HandleManager<T> {
    fn drop(&mut self) {
        for (handle, result) in self.release_all() {
            match result {
                Ok(ReleaseOutcome::Clean) => {}
                Ok(ReleaseOutcome::PartialCleanup { cause }) => {
                    warn!(handle = %handle, error = %cause, "partial cleanup on drop");
                }
                Err(e) => warn!(handle = %handle, error = %e, "release on drop failed"),
            }
        }
    }
}
