// Row and position counters
//
// Every counter moves once per consumed line (a returned record or a skipped
// blank/comment line), never mid-record. A snapshot taken right after a read
// is enough to reopen the same stream and continue with the next record.

use super::encoding::{count_chars, Encoding};

/// Stream position after the most recently consumed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Position {
    /// Input bytes consumed; the offset to seek the source stream to.
    pub offset: u64,
    /// Characters consumed.
    pub char_count: u64,
    /// Bytes consumed, measured in the dialect encoding. Zero unless byte
    /// counting is enabled.
    pub byte_count: u64,
    /// Logical records returned (plus skipped lines when those are counted).
    pub row: u64,
    /// Physical lines consumed.
    pub raw_row: u64,
}

impl Position {
    /// Account for one consumed line of raw text.
    pub(crate) fn consume(&mut self, raw: &str, count_bytes: Option<Encoding>) {
        self.offset += raw.len() as u64;
        self.char_count += count_chars(raw.as_bytes()) as u64;
        if let Some(encoding) = count_bytes {
            self.byte_count += encoding.encoded_len(raw) as u64;
        }
    }
}
