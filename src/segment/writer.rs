//! Segment background writer
//!
//! The sole consumer of a segment's write queue. Appends frames in FIFO
//! order, then publishes each new offset to the index.

use std::fs::File;
use std::io::{self, Write};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use bytes::Bytes;
use crossbeam::channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use crate::config::SyncStrategy;
use crate::error::{KvError, Result};

use super::HashIndex;

/// Work items accepted by the writer
pub(super) enum Request {
    /// Append an encoded record for `key`
    Append { key: Vec<u8>, frame: Bytes },

    /// Sync and acknowledge once everything queued before it is on disk
    Flush(Sender<Result<()>>),
}

/// State shared between a segment handle and its writer thread
pub(super) struct Shared {
    pub index: RwLock<HashIndex>,

    /// First append/sync failure; once set the writer stops touching the file
    pub failure: Mutex<Option<String>>,

    /// Bytes on disk plus bytes accepted into the queue
    pub projected_size: AtomicU64,
}

impl Shared {
    pub fn new(index: HashIndex, size: u64) -> Self {
        Self {
            index: RwLock::new(index),
            failure: Mutex::new(None),
            projected_size: AtomicU64::new(size),
        }
    }

    pub fn check_failure(&self) -> Result<()> {
        match self.failure.lock().as_ref() {
            Some(msg) => Err(KvError::Write(msg.clone())),
            None => Ok(()),
        }
    }
}

pub(super) struct Writer {
    file: File,
    /// Offset where the next frame lands
    offset: u64,
    sync_strategy: SyncStrategy,
    /// Appends since the last fsync
    unsynced: usize,
    shared: Arc<Shared>,
    label: String,
}

impl Writer {
    pub fn new(
        file: File,
        offset: u64,
        sync_strategy: SyncStrategy,
        shared: Arc<Shared>,
        label: String,
    ) -> Self {
        Self {
            file,
            offset,
            sync_strategy,
            unsynced: 0,
            shared,
            label,
        }
    }

    /// Drain the queue until every sender is gone, then sync and exit
    pub fn run(mut self, requests: Receiver<Request>) {
        for request in requests.iter() {
            match request {
                Request::Append { key, frame } => self.append(key, &frame),
                Request::Flush(reply) => {
                    let _ = reply.send(self.flush());
                }
            }
        }

        if self.shared.failure.lock().is_none() {
            if let Err(e) = self.sync() {
                self.fail(format!("final sync failed: {}", e));
            }
        }

        tracing::debug!(segment = %self.label, offset = self.offset, "segment writer stopped");
    }

    fn append(&mut self, key: Vec<u8>, frame: &[u8]) {
        if self.shared.failure.lock().is_some() {
            tracing::warn!(segment = %self.label, "dropping append after earlier write failure");
            return;
        }

        if let Err(e) = self.file.write_all(frame) {
            self.fail(format!("append at offset {} failed: {}", self.offset, e));
            return;
        }

        // Index only after the bytes are written
        let offset = self.offset;
        self.offset += frame.len() as u64;
        self.shared.index.write().insert(key, offset);
        self.unsynced += 1;

        let due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => self.unsynced >= count,
            SyncStrategy::OnFlush => false,
        };
        if due {
            if let Err(e) = self.sync() {
                self.fail(format!("sync failed: {}", e));
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.shared.check_failure()?;
        if let Err(e) = self.sync() {
            let msg = format!("sync failed: {}", e);
            self.fail(msg.clone());
            return Err(KvError::Write(msg));
        }
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        if self.unsynced > 0 {
            self.file.sync_data()?;
            self.unsynced = 0;
        }
        Ok(())
    }

    fn fail(&self, msg: String) {
        tracing::error!(segment = %self.label, "{}", msg);
        let mut failure = self.shared.failure.lock();
        if failure.is_none() {
            *failure = Some(msg);
        }
    }
}
