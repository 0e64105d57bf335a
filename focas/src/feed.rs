//! Override percentages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which override percentage to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum OverrideKind {
    /// Feed rate override (F%).
    Feed,
    /// Jog feed override.
    Jog,
}

impl OverrideKind {
    /// `(number, type)` selector passed to `cnc_rdtofs`.
    pub const fn selector(self) -> (i16, i16) {
        match self {
            Self::Feed => (1, 0),
            Self::Jog => (1, 1),
        }
    }
}

impl fmt::Display for OverrideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Feed => "feed",
            Self::Jog => "jog",
        })
    }
}
