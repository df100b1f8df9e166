//! Segment recovery
//!
//! Rebuilds a segment's index by replaying its log from the first byte.
//! Any corruption aborts the replay; there is no truncate-and-continue.

use std::path::Path;

use crate::codec::RecordReader;
use crate::error::Result;

use super::HashIndex;

/// Outcome of replaying one log file
#[derive(Debug)]
pub(super) struct Replay {
    /// Latest offset per key, tombstones included
    pub index: HashIndex,

    /// Number of records decoded
    pub records: u64,

    /// Offset just past the last record (where the next append lands)
    pub end_offset: u64,
}

/// Replay `path` sequentially, keeping the last offset seen for each key
pub(super) fn replay(path: &Path) -> Result<Replay> {
    let mut reader = RecordReader::open(path)?;
    let mut index = HashIndex::new();
    let mut records = 0u64;

    for item in reader.by_ref() {
        let (offset, record) = item?;
        index.insert(record.key, offset);
        records += 1;
    }

    Ok(Replay {
        index,
        records,
        end_offset: reader.offset(),
    })
}
