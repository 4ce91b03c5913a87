// Parallel sessions using Rayon
//
// Sessions share nothing but the immutable Dialect, so independent streams
// parse on the rayon pool with one Reader each. A single stream is never
// split: record boundaries depend on quote state from the start of input.

use std::io::Read;

use rayon::prelude::*;
use tracing::debug;

use super::streaming::Reader;
use crate::core::record::OwnedRecord;
use crate::dialect::Dialect;
use crate::error::Result;

/// Parse every source to completion, one session per source. Results come
/// back in input order; a failure in one stream does not affect the others.
pub fn read_all_parallel<R>(sources: Vec<R>, dialect: &Dialect) -> Vec<Result<Vec<OwnedRecord>>>
where
    R: Read + Send,
{
    debug!(streams = sources.len(), "parsing streams in parallel");
    sources
        .into_par_iter()
        .map(|source| read_all(source, dialect.clone()))
        .collect()
}

/// Parse one source to completion.
pub fn read_all<R: Read>(source: R, dialect: Dialect) -> Result<Vec<OwnedRecord>> {
    let mut rdr = Reader::with_dialect(source, dialect);
    let mut records = Vec::new();
    while let Some(record) = rdr.read_owned()? {
        records.push(record);
    }
    rdr.close();
    Ok(records)
}

/// Thread count for a dedicated pool: available parallelism, capped at 8.
pub fn recommended_threads() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get().min(8))
        .unwrap_or(4)
}
