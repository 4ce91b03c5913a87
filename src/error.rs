// Error types for parsing and writing sessions
//
// Configuration errors are raised once, when a Dialect is built, or when a
// writer is asked to emit a field the active mode cannot represent. Stream
// faults pass through unchanged. Bad data is only an error under the default
// policy; callers can swap the policy on the Reader.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong in a read or write session.
#[derive(Debug, Error)]
pub enum Error {
    /// Failure from the underlying reader or writer.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid dialect, or a field the dialect cannot represent.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A field that violates the escaping rules of the active mode.
    #[error(
        "bad data at row {row} (raw row {raw_row}), field {field_index}: {field:?}"
    )]
    BadData {
        row: u64,
        raw_row: u64,
        field_index: usize,
        field: String,
        raw_record: String,
    },

    /// Input that is not valid UTF-8.
    #[error("invalid UTF-8 in record ending at raw row {raw_row} (input offset {offset})")]
    Utf8 { raw_row: u64, offset: u64 },

    /// A field starting with an injection character under `InjectionOptions::Exception`.
    #[error("field {field:?} starts with injection character {character:?}")]
    Injection { field: String, character: char },

    /// The session has been closed.
    #[error("session is closed")]
    Closed,
}

/// Dialect validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("delimiter must not be empty")]
    EmptyDelimiter,

    #[error("newline must not be empty")]
    EmptyNewline,

    #[error("{0} must not contain the reserved NUL character")]
    ReservedCharacter(&'static str),

    #[error("{0} must be a single ASCII character")]
    NotAscii(&'static str),

    #[error("{first} and {second} must be distinct ({value:?})")]
    Collision {
        first: &'static str,
        second: &'static str,
        value: String,
    },

    #[error("buffer size {size} is too small; at least {min} is required")]
    BufferTooSmall { size: usize, min: usize },

    #[error("quote_all and quote_none cannot both be enabled")]
    ConflictingQuoteToggles,

    #[error("delimiter detection needs at least one candidate")]
    NoDelimiterCandidates,

    #[error("field {field:?} cannot be written in {mode} mode: {reason}")]
    Unrepresentable {
        field: String,
        mode: &'static str,
        reason: &'static str,
    },
}
