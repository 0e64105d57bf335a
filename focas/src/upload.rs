//! Three-phase program upload: start, repeated reads, end.
//!
//! An [`UploadSession`] borrows the manager and is tied to one upload by a
//! generation number, so a stale session can never end a newer upload on a
//! recycled handle. Dropping an open session ends it.

use tracing::{debug, warn};

use crate::code::{self, EW_DATA, EW_NUMBER, call};
use crate::error::{Error, Fault, Result};
use crate::handle::Handle;
use crate::manager::{HandleManager, SlotState};
use crate::program::{ProgramChunk, normalize_program_text, program_file_path};
use crate::state::UploadPhase;
use crate::transport::Transport;

/// Result of ending an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum EndOutcome {
    /// The upload was open and is now closed on the controller.
    Ended,
    /// Nothing to end: already ended, force-ended by release, or aborted
    /// by a hard fault.
    AlreadyEnded,
}

/// What an upload reads.
#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    /// Program number, via `cnc_upstart`.
    Number(u32),
    /// File path, via `cnc_upstart4`.
    File(&'a str),
}

/// An open program upload on one handle.
#[must_use = "an upload holds the handle busy until ended or dropped"]
pub struct UploadSession<'m, T: Transport> {
    /// Owning manager.
    manager: &'m HandleManager<T>,
    /// Session handle.
    handle: Handle,
    /// Program being uploaded; 0 for uploads opened by file path.
    program: u32,
    /// File path, for uploads opened by path.
    file: Option<String>,
    /// Upload generation this session belongs to.
    generation: u64,
}

impl<T: Transport> std::fmt::Debug for UploadSession<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadSession")
            .field("handle", &self.handle)
            .field("program", &self.program)
            .field("file", &self.file)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> HandleManager<T> {
    /// Starts uploading `program`. Queries on the handle are rejected until
    /// the upload ends.
    pub fn start_upload(&self, handle: Handle, program: u32) -> Result<UploadSession<'_, T>> {
        if program == 0 {
            return Err(Error::InvalidArgument("program number must be positive"));
        }
        self.open_upload(handle, Target::Number(program))
    }

    /// Starts uploading the program stored at `path`, e.g.
    /// `//CNC_MEM/USER/PATH1/MAIN`. The session and the upload phase report
    /// program number 0.
    pub fn start_upload_file(&self, handle: Handle, path: &str) -> Result<UploadSession<'_, T>> {
        if path.is_empty() || path.contains('\0') {
            return Err(Error::InvalidArgument("program path must be non-empty and free of NUL"));
        }
        self.open_upload(handle, Target::File(path))
    }

    fn open_upload(&self, handle: Handle, target: Target<'_>) -> Result<UploadSession<'_, T>> {
        let program = match target {
            Target::Number(n) => n,
            Target::File(_) => 0,
        };
        let slot = self.slot(handle).ok_or(Error::InvalidHandle(handle))?;
        let mut state = slot.lock();
        if !state.live {
            return Err(Error::InvalidHandle(handle));
        }
        state
            .upload
            .start(program)
            .map_err(|_| Error::UploadBusy(handle))?;

        let started = match target {
            Target::Number(n) => self.transport.upload_start(handle, n),
            Target::File(path) => self.transport.upload_start_path(handle, path),
        };
        if let Err(code) = started {
            state.upload.reset();
            return Err(match (target, code) {
                (Target::Number(n), EW_DATA | EW_NUMBER) => Error::ProgramNotFound(n),
                (Target::File(path), EW_DATA | EW_NUMBER) => {
                    Error::ProgramFileNotFound(path.to_owned())
                }
                (Target::Number(_), code) => code::failure("cnc_upstart", code),
                (Target::File(_), code) => code::failure("cnc_upstart4", code),
            });
        }
        state.generation = self.next_generation();
        state.last_block = None;
        let generation = state.generation;
        drop(state);

        debug!(handle = %handle, ?target, "upload started");
        Ok(UploadSession {
            manager: self,
            handle,
            program,
            file: match target {
                Target::File(path) => Some(path.to_owned()),
                Target::Number(_) => None,
            },
            generation,
        })
    }

    /// Ends whatever upload is open on `handle`.
    ///
    /// For unconditional cleanup paths that no longer hold the session.
    pub fn end_upload(&self, handle: Handle) -> Result<EndOutcome> {
        if self.slot(handle).is_none() {
            return Err(Error::InvalidHandle(handle));
        }
        self.finish_upload(handle, None, false)
    }

    /// Uploads the program selected for execution and returns its cleaned
    /// text. The upload is always ended, also when reading fails.
    pub fn upload_executing_program(&self, handle: Handle) -> Result<String> {
        self.upload_executing_program_raw(handle)
            .map(|raw| normalize_program_text(&raw))
    }

    /// Uploads the program selected for execution and returns the bytes
    /// exactly as received.
    ///
    /// Programs named `O<digits>` (or with a positive number) are uploaded
    /// by number. Other names are uploaded by file path under the current
    /// path's user folder.
    pub fn upload_executing_program_raw(&self, handle: Handle) -> Result<Vec<u8>> {
        let program = self.executing_program(handle)?;
        let name = program.name.trim();
        let mut session = match program.upload_number() {
            Some(number) => self.start_upload(handle, number)?,
            None if !name.is_empty() => {
                let path = program_file_path(self.current_path(handle)?, name);
                self.start_upload_file(handle, &path)?
            }
            None => {
                return Err(Error::NoExecutingProgram {
                    name: program.name,
                    number: program.number,
                });
            }
        };

        let mut raw = Vec::new();
        let read = session.read_to_end(&mut raw);
        let ended = session.end();
        read?;
        ended?;
        Ok(raw)
    }

    /// Closes the open upload if it belongs to `generation` (any upload when
    /// `None`). With `force`, a transient `cnc_upend` failure still returns
    /// the handle to `Idle`.
    fn finish_upload(
        &self,
        handle: Handle,
        generation: Option<u64>,
        force: bool,
    ) -> Result<EndOutcome> {
        let Some(slot) = self.slot(handle) else {
            return Ok(EndOutcome::AlreadyEnded);
        };
        let mut state = slot.lock();
        if !owns(&state, generation) {
            return Ok(EndOutcome::AlreadyEnded);
        }
        match self.transport.upload_end(handle) {
            Ok(()) => {
                let prior = state.upload.reset();
                debug!(handle = %handle, phase = %prior, "upload ended");
                Ok(EndOutcome::Ended)
            }
            Err(code) => {
                let err = code::failure("cnc_upend", code);
                if force || !err.is_transient() {
                    state.upload.reset();
                }
                Err(err)
            }
        }
    }
}

/// `block` does not directly follow `prev`. Missing numbers are never a gap.
fn block_gap(prev: Option<u32>, block: Option<u32>) -> bool {
    matches!((prev, block), (Some(prev), Some(block)) if block != prev.wrapping_add(1))
}

/// The slot has an open upload matching `generation`.
fn owns(state: &SlotState, generation: Option<u64>) -> bool {
    state.live && state.upload.is_open() && generation.is_none_or(|g| g == state.generation)
}

impl<T: Transport> UploadSession<'_, T> {
    /// Handle the upload runs on.
    pub const fn handle(&self) -> Handle {
        self.handle
    }

    /// Program being uploaded; 0 when opened by file path.
    pub const fn program(&self) -> u32 {
        self.program
    }

    /// File path of an upload opened with
    /// [`start_upload_file`](HandleManager::start_upload_file).
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// Current phase; `Idle` once this session is no longer open.
    pub fn phase(&self) -> UploadPhase {
        self.manager
            .slot(self.handle)
            .map(|slot| {
                let state = slot.lock();
                if owns(&state, Some(self.generation)) {
                    state.upload
                } else {
                    UploadPhase::Idle
                }
            })
            .unwrap_or_default()
    }

    /// Reads the next chunk.
    ///
    /// Returns `Ok(None)` once the program has been read completely.
    /// Transient faults leave the session where it was, so the same read can
    /// be repeated. Any other fault aborts the upload and returns the handle
    /// to `Idle`.
    pub fn read(&mut self) -> Result<Option<ProgramChunk>> {
        let handle = self.handle;
        let slot = self
            .manager
            .slot(handle)
            .ok_or(Error::UploadNotOpen(handle))?;
        let mut state = slot.lock();
        if !owns(&state, Some(self.generation)) {
            return Err(Error::UploadNotOpen(handle));
        }
        if matches!(state.upload, UploadPhase::Ended { .. }) {
            return Ok(None);
        }

        let transport = &self.manager.transport;
        let raw = match call("cnc_upload", transport.upload_read(handle)) {
            Ok(raw) => raw,
            Err(err) if err.is_transient() => {
                debug!(handle = %handle, error = %err, "upload read deferred");
                return Err(err);
            }
            Err(err) => {
                state.upload.reset();
                let link_gone = matches!(
                    err,
                    Error::Cnc {
                        fault: Fault::Disconnected,
                        ..
                    }
                );
                if !link_gone {
                    if let Err(code) = transport.upload_end(handle) {
                        warn!(handle = %handle, code, "ending aborted upload failed");
                    }
                }
                warn!(handle = %handle, program = self.program, error = %err, "upload aborted");
                return Err(err);
            }
        };

        if raw.data.is_empty() {
            state
                .upload
                .finish()
                .map_err(|_| Error::UploadNotOpen(handle))?;
            debug!(handle = %handle, "upload stream drained");
            return Ok(None);
        }

        if block_gap(state.last_block, raw.block) {
            debug!(handle = %handle, prev = ?state.last_block, block = ?raw.block, "block number out of sequence");
        }
        if raw.block.is_some() {
            state.last_block = raw.block;
        }

        let index = state
            .upload
            .chunk(raw.complete)
            .map_err(|_| Error::UploadNotOpen(handle))?;
        debug!(handle = %handle, index, len = raw.data.len(), complete = raw.complete, "chunk");
        Ok(Some(ProgramChunk {
            index,
            data: raw.data,
            complete: raw.complete,
            block: raw.block,
        }))
    }

    /// Appends every remaining chunk to `buf`, in read order. Returns the
    /// number of bytes appended. Bytes read before an error stay in `buf`.
    pub fn read_to_end(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        let start = buf.len();
        while let Some(chunk) = self.read()? {
            buf.extend_from_slice(&chunk.data);
        }
        Ok(buf.len() - start)
    }

    /// Ends the upload. Always legal; the second call reports
    /// [`EndOutcome::AlreadyEnded`].
    ///
    /// A transient `cnc_upend` failure keeps the upload open so `end` can be
    /// retried.
    pub fn end(&mut self) -> Result<EndOutcome> {
        self.manager
            .finish_upload(self.handle, Some(self.generation), false)
    }
}

impl<T: Transport> Drop for UploadSession<'_, T> {
    fn drop(&mut self) {
        match self
            .manager
            .finish_upload(self.handle, Some(self.generation), true)
        {
            Ok(EndOutcome::Ended) => {
                debug!(handle = %self.handle, "open upload ended on drop");
            }
            Ok(EndOutcome::AlreadyEnded) => {}
            Err(e) => warn!(handle = %self.handle, error = %e, "ending upload on drop failed"),
        }
    }
}
