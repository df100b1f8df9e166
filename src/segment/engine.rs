//! Segment handle
//!
//! Owns a log file's writer thread and index. All methods except `close`
//! take `&self`, so a segment can be shared by reference across readers.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use crossbeam::channel::{self, Sender};

use crate::codec::{decode, encode, Record, RecordReader};
use crate::config::SegmentOptions;
use crate::error::{KvError, Result};

use super::recovery;
use super::writer::{Request, Shared, Writer};

/// One append-only log file plus its in-memory index
///
/// ## Lifecycle
/// - `open`: replay the log, then start the writer thread
/// - `put`/`delete`: enqueue and return (not yet durable)
/// - `flush`: wait until everything queued so far is durable
/// - `close`: drain the queue, stop the writer, release the file
///
/// A closed segment still serves `get`, `read_all` and `size`.
pub struct Segment {
    path: PathBuf,
    shared: Arc<Shared>,
    sender: Option<Sender<Request>>,
    writer: Option<JoinHandle<()>>,
}

impl Segment {
    /// Open or create a segment with default options
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_options(path, &SegmentOptions::default())
    }

    /// Open or create a segment
    ///
    /// On open:
    /// 1. Open the log for append (creating it if missing)
    /// 2. Replay it from the start to rebuild the index
    /// 3. Start the background writer at the end offset
    ///
    /// A corrupt or truncated record anywhere in the log fails the open.
    pub fn open_with_options(path: &Path, options: &SegmentOptions) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        let replay = recovery::replay(path)?;
        tracing::debug!(
            path = %path.display(),
            records = replay.records,
            keys = replay.index.len(),
            size = replay.end_offset,
            "segment recovered"
        );

        let label = file_label(path);
        let shared = Arc::new(Shared::new(replay.index, replay.end_offset));
        let writer = Writer::new(
            file,
            replay.end_offset,
            options.sync_strategy,
            Arc::clone(&shared),
            label.clone(),
        );

        let (sender, receiver) = channel::bounded(options.queue_capacity.max(1));
        let handle = thread::Builder::new()
            .name(format!("segment-writer:{}", label))
            .spawn(move || writer.run(receiver))?;

        Ok(Self {
            path: path.to_path_buf(),
            shared,
            sender: Some(sender),
            writer: Some(handle),
        })
    }

    /// Queue a record for append
    ///
    /// Returns once the record is queued, not once it is durable. Blocks
    /// while the queue is full. An empty `value` writes a tombstone.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let (sender, frame) = self.prepare(&Record::new(key, value))?;
        self.send(sender, key.to_vec(), frame)
    }

    /// Queue a tombstone for `key`
    ///
    /// The key leaves the index at once; once the writer appends the
    /// tombstone the index points at it, so `get` then returns an empty
    /// value rather than `NotFound`.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let (sender, frame) = self.prepare(&Record::tombstone(key))?;

        // Remove before queueing so this can never undo the writer's
        // insert of the tombstone's own offset.
        self.shared.index.write().remove(key);

        self.send(sender, key.to_vec(), frame)
    }

    /// Read the latest record for `key`
    ///
    /// Returns:
    /// - `Ok(value)` — may be empty, meaning the key's latest record is a tombstone
    /// - `Err(NotFound)` — key is not in this segment's index
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let offset = self
            .shared
            .index
            .read()
            .get(key)
            .copied()
            .ok_or(KvError::NotFound)?;

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut reader = BufReader::new(file);

        match decode(&mut reader)? {
            Some((record, _)) if record.key == key => Ok(record.value),
            Some((record, _)) => Err(KvError::Corruption(format!(
                "Offset {} in {} holds key {:?}, expected {:?}",
                offset,
                self.path.display(),
                String::from_utf8_lossy(&record.key),
                String::from_utf8_lossy(key)
            ))),
            None => Err(KvError::Corruption(format!(
                "Indexed offset {} is past the end of {}",
                offset,
                self.path.display()
            ))),
        }
    }

    /// Stream every record in file order (oldest first), tombstones included
    pub fn iter(&self) -> Result<RecordReader<BufReader<File>>> {
        RecordReader::open(&self.path)
    }

    /// Collect every record in file order (oldest first), tombstones included
    pub fn read_all(&self) -> Result<Vec<Record>> {
        self.iter()?
            .map(|item| item.map(|(_, record)| record))
            .collect()
    }

    /// Current log file length in bytes
    pub fn size(&self) -> Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    /// Log length once every queued record has been written
    pub fn projected_size(&self) -> u64 {
        self.shared.projected_size.load(Ordering::SeqCst)
    }

    /// Block until every record queued so far is written, indexed and synced
    pub fn flush(&self) -> Result<()> {
        let Some(sender) = self.sender.as_ref() else {
            return self.shared.check_failure();
        };

        let (reply, ack) = channel::bounded(1);
        sender
            .send(Request::Flush(reply))
            .map_err(|_| KvError::Write("segment writer has stopped".to_string()))?;

        ack.recv().map_err(|_| {
            KvError::Write("segment writer stopped before acknowledging flush".to_string())
        })?
    }

    /// Drain the write queue, stop the writer and release the file
    ///
    /// Safe to call more than once; later calls are no-ops. Returns the
    /// first append failure the writer hit, if any.
    pub fn close(&mut self) -> Result<()> {
        let Some(sender) = self.sender.take() else {
            return Ok(());
        };
        drop(sender);

        if let Some(handle) = self.writer.take() {
            handle
                .join()
                .map_err(|_| KvError::Write("segment writer panicked".to_string()))?;
        }

        tracing::debug!(path = %self.path.display(), "segment closed");
        self.shared.check_failure()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_none()
    }

    /// Number of indexed keys (tombstoned keys included)
    pub fn len(&self) -> usize {
        self.shared.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        file_label(&self.path)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Fail fast on a closed or failed segment, then encode the record
    fn prepare(&self, record: &Record) -> Result<(&Sender<Request>, Bytes)> {
        let sender = self.sender.as_ref().ok_or(KvError::Closed)?;
        self.shared.check_failure()?;
        let frame = encode(record)?;
        Ok((sender, frame))
    }

    fn send(&self, sender: &Sender<Request>, key: Vec<u8>, frame: Bytes) -> Result<()> {
        let len = frame.len() as u64;
        sender
            .send(Request::Append { key, frame })
            .map_err(|_| KvError::Write("segment writer has stopped".to_string()))?;
        self.shared.projected_size.fetch_add(len, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(path = %self.path.display(), error = %e, "segment close on drop failed");
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
