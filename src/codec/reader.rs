//! Sequential record reader
//!
//! Walks a log from the start, yielding each record with the offset it
//! begins at. Used by recovery and compaction scans.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::Result;

use super::{decode, Record};

/// Iterator over `(offset, record)` pairs in file order
///
/// Stops cleanly at a zero-byte end of input. On a decode error it yields
/// the error once and then ends; it cannot resume mid-scan.
pub struct RecordReader<R> {
    inner: R,
    /// Offset of the next record (= bytes consumed so far)
    offset: u64,
    done: bool,
}

impl RecordReader<BufReader<File>> {
    /// Open a log file for scanning from the beginning
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            done: false,
        }
    }

    /// Bytes consumed so far; after a clean finish, the log length
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<(u64, Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match decode(&mut self.inner) {
            Ok(Some((record, consumed))) => {
                let start = self.offset;
                self.offset += consumed as u64;
                Some(Ok((start, record)))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
