//! Program identity, upload chunks and program text helpers.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::status::decode_ascii;
use crate::transport::{RawBlock, RawProgram};

/// Size of the controller's program name field, NUL terminator included.
pub const PROGRAM_NAME_CAPACITY: usize = 36;

/// Longest name that fits in [`PROGRAM_NAME_CAPACITY`].
pub const PROGRAM_NAME_MAX: usize = PROGRAM_NAME_CAPACITY - 1;

/// The program currently selected for execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ExecutingProgram {
    /// Program name, e.g. `O1234`.
    pub name: String,
    /// Program number as reported alongside the name.
    pub number: i64,
}

impl ExecutingProgram {
    /// Validates the name length. Over-long names are rejected, never cut.
    pub fn from_raw(raw: &RawProgram) -> Result<Self> {
        let end = raw.name.iter().position(|&b| b == 0).unwrap_or(raw.name.len());
        if end > PROGRAM_NAME_MAX {
            return Err(Error::NameTooLong {
                len: end,
                max: PROGRAM_NAME_MAX,
            });
        }
        Ok(Self {
            name: String::from_utf8_lossy(&raw.name[..end]).into_owned(),
            number: raw.number,
        })
    }

    /// The number to upload: taken from an `O<digits>` name, else the
    /// numeric field. `None` when neither yields a positive number.
    pub fn upload_number(&self) -> Option<u32> {
        parse_program_name(&self.name)
            .filter(|&n| n > 0)
            .or_else(|| u32::try_from(self.number).ok().filter(|&n| n > 0))
    }
}

/// Parses `O1234` (also `O 1234`) into `1234`.
pub fn parse_program_name(name: &str) -> Option<u32> {
    name.trim().strip_prefix('O')?.trim().parse().ok()
}

/// File path of a program stored in the user folder of CNC path `path_no`.
pub fn program_file_path(path_no: i16, name: &str) -> String {
    format!("//CNC_MEM/USER/PATH{path_no}/{name}")
}

/// One piece of an upload, in read order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ProgramChunk {
    /// Zero-based position of this chunk in the upload.
    pub index: u32,
    /// Program bytes.
    pub data: Vec<u8>,
    /// This is the last chunk of the program.
    pub complete: bool,
    /// Block sequence number, when the transport reports one.
    pub block: Option<u32>,
}

/// The block currently being executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ExecutingBlock {
    /// Block number.
    pub block: i64,
    /// NC text of the executing block, first line only.
    pub text: String,
}

impl ExecutingBlock {
    /// Decodes a raw `cnc_rdexecprog` reply.
    pub fn from_raw(raw: &RawBlock) -> Self {
        let text = decode_ascii(&raw.text);
        let first = text
            .split(['\n', ';'])
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default()
            .to_owned();
        Self {
            block: raw.block,
            text: first,
        }
    }
}

/// Cleans uploaded program text.
///
/// Removes NUL bytes, drops anything after the closing `%` when an opening
/// one precedes it, trims surrounding whitespace and makes sure the text
/// starts with a `%` line.
pub fn normalize_program_text(raw: &[u8]) -> String {
    let text: String = String::from_utf8_lossy(raw).chars().filter(|&c| c != '\0').collect();
    let body = match (text.find('%'), text.rfind('%')) {
        (Some(first), Some(last)) if last > first => &text[..=last],
        _ => text.as_str(),
    };
    let body = body.trim();
    if body.starts_with('%') {
        body.to_owned()
    } else {
        format!("%\n{body}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn file_path_for_named_program() {
        assert_eq!(program_file_path(1, "MAIN"), "//CNC_MEM/USER/PATH1/MAIN");
    }

    #[test]
    fn name_at_capacity_is_accepted() {
        let raw = RawProgram {
            name: vec![b'A'; PROGRAM_NAME_MAX],
            number: 1,
        };
        assert_eq!(ExecutingProgram::from_raw(&raw).unwrap().name.len(), 35);
    }

    #[test]
    fn name_over_capacity_is_rejected() {
        let raw = RawProgram {
            name: vec![b'A'; PROGRAM_NAME_CAPACITY],
            number: 1,
        };
        assert!(matches!(
            ExecutingProgram::from_raw(&raw),
            Err(Error::NameTooLong { len: 36, max: 35 })
        ));
    }

    #[test]
    fn name_stops_at_nul() {
        let raw = RawProgram {
            name: b"O0100\0garbage".to_vec(),
            number: 100,
        };
        assert_eq!(ExecutingProgram::from_raw(&raw).unwrap().name, "O0100");
    }

    #[test]
    fn upload_number_prefers_name() {
        let p = ExecutingProgram {
            name: "O1234".into(),
            number: 99,
        };
        assert_eq!(p.upload_number(), Some(1234));

        let by_number = ExecutingProgram {
            name: "MAIN-PART".into(),
            number: 77,
        };
        assert_eq!(by_number.upload_number(), Some(77));

        let none = ExecutingProgram {
            name: String::new(),
            number: 0,
        };
        assert_eq!(none.upload_number(), None);
    }

    #[test]
    fn parse_name_variants() {
        assert_eq!(parse_program_name("O 42"), Some(42));
        assert_eq!(parse_program_name("O0001"), Some(1));
        assert_eq!(parse_program_name("P100"), None);
        assert_eq!(parse_program_name("Oabc"), None);
    }

    #[test]
    fn normalize_cuts_after_last_percent() {
        let raw = b"%\nO100\nG0 X1\nM30\n%\0\0junk";
        assert_eq!(normalize_program_text(raw), "%\nO100\nG0 X1\nM30\n%");
    }

    #[test]
    fn normalize_adds_leading_percent() {
        assert_eq!(normalize_program_text(b"\nO100\nM30\n"), "%\nO100\nM30");
        assert_eq!(normalize_program_text(b"O1\nM30\n%"), "%\nO1\nM30\n%");
    }

    #[test]
    fn executing_block_first_line() {
        let raw = RawBlock {
            block: 12,
            text: b"G01 X10. F200;\nG01 Y5.;\0\0".to_vec(),
        };
        let b = ExecutingBlock::from_raw(&raw);
        assert_eq!(b.block, 12);
        assert_eq!(b.text, "G01 X10. F200");
    }
}
