// Core primitives for CSV tokenizing

pub mod buffer;
pub mod cache;
pub mod counters;
pub mod encoding;
pub mod matcher;
pub mod newlines;
pub mod record;
pub mod scanner;

pub use cache::FieldCache;
pub use counters::Position;
pub use encoding::Encoding;
pub use matcher::{match_sequence, MatchResult, PartialMatch, TokenKind, TokenMatcher};
pub use newlines::Newlines;
pub use record::{OwnedRecord, Record};
pub use scanner::{FindSpecial, MemchrScan, ScalarScan, Scanner, SpecialSet, SwarScan};
