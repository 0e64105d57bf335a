//! Per-handle upload state machine.
//!
//! ```text
//!  Idle ──start──► Started ──chunk──► Streaming ──last chunk──► Ended
//!   ▲                 │                   │                       │
//!   └─────────────────┴───── end / hard fault / release ──────────┘
//! ```
//!
//! Transitions are validated and return `Result` instead of panicking.

use std::fmt;

use serde::Serialize;

// ── UploadPhase ──────────────────────────────────────────────────

/// Upload state of one handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[non_exhaustive]
pub enum UploadPhase {
    /// No upload open; queries are allowed.
    #[default]
    Idle,

    /// `cnc_upstart` succeeded; nothing read yet.
    Started {
        /// Program being uploaded.
        program: u32,
    },

    /// At least one chunk has been read.
    Streaming {
        /// Program being uploaded.
        program: u32,
        /// Chunks read so far.
        chunks: u32,
    },

    /// The last chunk was read; `cnc_upend` still pending.
    Ended {
        /// Program that was uploaded.
        program: u32,
        /// Total chunks read.
        chunks: u32,
    },
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Started { .. } => write!(f, "Started"),
            Self::Streaming { .. } => write!(f, "Streaming"),
            Self::Ended { .. } => write!(f, "Ended"),
        }
    }
}

/// A transition that is not legal from the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action}: upload is {from}")]
#[non_exhaustive]
pub struct InvalidTransition {
    /// Phase the transition was attempted from.
    pub from: UploadPhase,
    /// Attempted transition.
    pub action: &'static str,
}

impl UploadPhase {
    /// Any phase other than `Idle`.
    pub const fn is_open(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// The program of the open upload.
    pub const fn program(&self) -> Option<u32> {
        match *self {
            Self::Idle => None,
            Self::Started { program }
            | Self::Streaming { program, .. }
            | Self::Ended { program, .. } => Some(program),
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Started`.
    ///
    /// Valid from: `Idle`.
    pub fn start(&mut self, program: u32) -> Result<(), InvalidTransition> {
        match self {
            Self::Idle => {
                *self = Self::Started { program };
                Ok(())
            }
            _ => Err(self.invalid("start")),
        }
    }

    /// Records a received chunk and returns its zero-based index.
    /// `last` moves to `Ended`, otherwise to `Streaming`.
    ///
    /// Valid from: `Started`, `Streaming`.
    pub fn chunk(&mut self, last: bool) -> Result<u32, InvalidTransition> {
        let (program, index) = match *self {
            Self::Started { program } => (program, 0),
            Self::Streaming { program, chunks } => (program, chunks),
            _ => return Err(self.invalid("read")),
        };
        let chunks = index.saturating_add(1);
        *self = if last {
            Self::Ended { program, chunks }
        } else {
            Self::Streaming { program, chunks }
        };
        Ok(index)
    }

    /// Transition to `Ended` without a chunk (zero-length read).
    ///
    /// Valid from: `Started`, `Streaming`.
    pub fn finish(&mut self) -> Result<(), InvalidTransition> {
        match *self {
            Self::Started { program } => {
                *self = Self::Ended {
                    program,
                    chunks: 0,
                };
                Ok(())
            }
            Self::Streaming { program, chunks } => {
                *self = Self::Ended { program, chunks };
                Ok(())
            }
            _ => Err(self.invalid("finish")),
        }
    }

    /// Back to `Idle` from any phase, returning the previous one.
    pub const fn reset(&mut self) -> Self {
        std::mem::replace(self, Self::Idle)
    }

    const fn invalid(self, action: &'static str) -> InvalidTransition {
        InvalidTransition { from: self, action }
    }
}
