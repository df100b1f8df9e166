//! Segmented store
//!
//! Owns every open segment and the manifest that names them.

use std::fs;
use std::path::Path;

use parking_lot::RwLock;

use crate::config::Config;
use crate::error::{KvError, Result};
use crate::manifest::{Manifest, MANIFEST_FILENAME};
use crate::segment::Segment;

use super::layout;

/// An ordered set of segments behind a single key-value API
///
/// ## Concurrency
/// - `state`: one coarse RwLock around the manifest and segment list
/// - `get` takes it shared; `put`, `delete`, rotation and `merge` take it
///   exclusively, so two writers can never both decide to rotate
/// - Each segment's index has its own lock underneath
pub struct SegmentedStore {
    config: Config,
    state: RwLock<StoreState>,
}

/// Everything that changes when segment topology changes
pub(super) struct StoreState {
    pub manifest: Manifest,

    /// Open segments, oldest first; only the last one accepts writes
    pub segments: Vec<Segment>,

    /// Id for the next segment file
    pub next_id: u64,
}

impl StoreState {
    pub fn active(&self) -> Result<&Segment> {
        self.segments.last().ok_or(KvError::Closed)
    }
}

impl SegmentedStore {
    /// Open or create a store in `dir` with default segment options
    pub fn open(dir: impl AsRef<Path>, max_segment_size: u64) -> Result<Self> {
        let config = Config::builder()
            .data_dir(dir.as_ref())
            .max_segment_size(max_segment_size)
            .build();
        Self::open_with_config(config)
    }

    /// Open or create a store with the given config
    ///
    /// On startup:
    /// 1. Create the data directory if needed
    /// 2. Refuse to start if segment files exist without a manifest
    /// 3. Load the manifest and sweep files it does not reference
    /// 4. Open each listed segment, oldest → newest
    /// 5. With no segments, create one and write a fresh manifest
    pub fn open_with_config(config: Config) -> Result<Self> {
        let dir = config.data_dir.clone();
        fs::create_dir_all(&dir)?;

        if !Manifest::exists(&dir) {
            let orphans = layout::segment_files(&dir)?;
            if !orphans.is_empty() {
                return Err(KvError::Manifest(format!(
                    "{} has segment files {:?} but no {}",
                    dir.display(),
                    orphans,
                    MANIFEST_FILENAME
                )));
            }
        }

        let mut manifest = Manifest::load(&dir)?;
        layout::sweep_unreferenced(&dir, &manifest)?;
        let mut next_id = layout::next_segment_id(&manifest);

        let mut segments = Vec::with_capacity(manifest.segments.len());
        let last = manifest.segments.len().saturating_sub(1);
        for (i, name) in manifest.segments.iter().enumerate() {
            let path = dir.join(name);
            if !path.is_file() {
                return Err(KvError::Manifest(format!(
                    "segment {} listed in manifest is missing",
                    path.display()
                )));
            }

            let mut segment = Segment::open_with_options(&path, &config.segment)?;
            // Rotated-out segments are read-only; their writers are not needed
            if i < last {
                segment.close()?;
            }
            segments.push(segment);
        }

        if segments.is_empty() {
            let name = layout::segment_file_name(next_id);
            segments.push(Segment::open_with_options(&dir.join(&name), &config.segment)?);
            next_id += 1;

            manifest.push_segment(name);
            manifest.save(&dir)?;
        }

        tracing::info!(
            dir = %dir.display(),
            segments = segments.len(),
            max_segment_size = config.max_segment_size,
            "store opened"
        );

        Ok(Self {
            config,
            state: RwLock::new(StoreState {
                manifest,
                segments,
                next_id,
            }),
        })
    }

    /// Get a value by key
    ///
    /// Searches segments newest → oldest. The first segment that indexes
    /// the key decides: a value is returned, a tombstone means deleted.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let state = self.state.read();

        for segment in state.segments.iter().rev() {
            match segment.get(key) {
                Ok(value) if value.is_empty() => return Err(KvError::NotFound),
                Ok(value) => return Ok(value),
                Err(KvError::NotFound) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(KvError::NotFound)
    }

    /// Put a key-value pair
    ///
    /// Rotates first if the active segment is full, then queues the write.
    /// Returns before the record is durable; use `flush` to wait.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if value.is_empty() {
            return Err(KvError::InvalidArgument(
                "empty value is reserved for deletes".to_string(),
            ));
        }

        let mut state = self.state.write();
        self.rotate_if_full(&mut state)?;
        state.active()?.put(key, value)
    }

    /// Delete a key
    ///
    /// Appends a tombstone to the active segment and waits until it is
    /// durable, so a failed append is reported here.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let state = self.state.write();
        let active = state.active()?;
        active.delete(key)?;
        active.flush()
    }

    /// Block until every queued write to the active segment is durable
    pub fn flush(&self) -> Result<()> {
        self.state.read().active()?.flush()
    }

    /// Close the active segment and start a new one
    pub fn rotate(&self) -> Result<()> {
        let mut state = self.state.write();
        self.rotate_locked(&mut state)
    }

    /// Close every segment, draining queued writes
    ///
    /// Returns the first error; every segment is still closed.
    pub fn close(self) -> Result<()> {
        let mut state = self.state.into_inner();
        let mut first_error = None;

        for segment in state.segments.iter_mut() {
            if let Err(e) = segment.close() {
                tracing::error!(segment = %segment.file_name(), error = %e, "segment close failed");
                first_error.get_or_insert(e);
            }
        }

        tracing::info!(dir = %self.config.data_dir.display(), "store closed");
        first_error.map_or(Ok(()), Err)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn max_segment_size(&self) -> u64 {
        self.config.max_segment_size
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn segment_count(&self) -> usize {
        self.state.read().segments.len()
    }

    /// Segment file names, oldest first
    pub fn segment_names(&self) -> Vec<String> {
        self.state.read().manifest.segments.clone()
    }

    /// (file name, on-disk size) per segment, oldest first
    pub fn segment_sizes(&self) -> Result<Vec<(String, u64)>> {
        self.state
            .read()
            .segments
            .iter()
            .map(|segment| -> Result<(String, u64)> { Ok((segment.file_name(), segment.size()?)) })
            .collect()
    }

    /// Snapshot of the in-memory manifest
    pub fn manifest(&self) -> Manifest {
        self.state.read().manifest.clone()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    pub(super) fn state(&self) -> &RwLock<StoreState> {
        &self.state
    }

    /// Rotate when the active segment has reached the threshold
    ///
    /// Queued bytes count towards the size so a backlog in the writer
    /// cannot hide a full segment. A failed size check also rotates.
    fn rotate_if_full(&self, state: &mut StoreState) -> Result<()> {
        let active = state.active()?;
        let full = match active.size() {
            Ok(size) => size.max(active.projected_size()) >= self.config.max_segment_size,
            Err(e) => {
                tracing::warn!(segment = %active.file_name(), error = %e, "size check failed, rotating");
                true
            }
        };

        if full {
            self.rotate_locked(state)?;
        }
        Ok(())
    }

    /// Open the next segment and commit it to the manifest, then retire
    /// the old active segment. A failure before the commit leaves the old
    /// segment active and writable.
    fn rotate_locked(&self, state: &mut StoreState) -> Result<()> {
        let name = layout::segment_file_name(state.next_id);
        let path = self.dir().join(&name);
        let segment = Segment::open_with_options(&path, &self.config.segment)?;

        let mut manifest = state.manifest.clone();
        manifest.push_segment(name.clone());
        if let Err(e) = manifest.save(self.dir()) {
            drop(segment);
            let _ = fs::remove_file(&path);
            return Err(e);
        }

        state.next_id += 1;
        state.manifest = manifest;
        state.segments.push(segment);

        let retired = state.segments.len() - 1;
        if retired > 0 {
            let old = &mut state.segments[retired - 1];
            if let Err(e) = old.close() {
                tracing::error!(segment = %old.file_name(), error = %e, "closing rotated segment failed");
                return Err(e);
            }
        }

        tracing::info!(segment = %name, segments = state.segments.len(), "rotated to new segment");
        Ok(())
    }
}
