// tidecsv - Streaming CSV tokenizer and writer
//
// Layers:
// core:     buffer, token matching, byte scanners, record assembly, counters
// dialect:  validated configuration shared by readers and writers
// strategy: Reader and Writer sessions, delimiter detection, bad-data
//           handling, parallel sessions over independent streams
//
// Reading modes: RFC4180 (quoted fields), Escape (escape character, no
// quoting) and NoEscape (verbatim). Delimiters and newlines may be several
// bytes long; every scanner strategy produces identical records.

//! Streaming CSV reading and writing.
//!
//! ```
//! use tidecsv::{Dialect, Reader, Writer};
//!
//! let mut rdr = Reader::from_reader("name,note\nada,\"hi, there\"\n".as_bytes());
//! let mut rows = Vec::new();
//! while let Some(record) = rdr.read()? {
//!     rows.push(record.iter().map(String::from).collect::<Vec<_>>());
//! }
//! assert_eq!(rows[1], ["ada", "hi, there"]);
//!
//! let mut wtr = Writer::with_dialect(Vec::new(), Dialect::default());
//! wtr.write_record(&rows[1])?;
//! assert_eq!(wtr.into_inner()?, b"ada,\"hi, there\"\r\n");
//! # Ok::<(), tidecsv::Error>(())
//! ```

pub mod core;
pub mod dialect;
pub mod error;
pub mod strategy;

pub use crate::core::{Encoding, OwnedRecord, Position, Record, Scanner};
pub use crate::dialect::{
    Dialect, DialectBuilder, InjectionOptions, Mode, Newline, ScanStrategy, TrimOptions,
};
pub use crate::error::{ConfigError, Error, Result};
pub use crate::strategy::{
    read_all_parallel, BadData, BadDataHandler, BadDataPolicy, FieldContext, Reader, Records,
    Writer,
};
