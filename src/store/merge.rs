//! Compaction
//!
//! Collapses every segment into one, keeping only each key's latest live
//! value. The new segment and a manifest naming it are both durable before
//! any old segment file is removed, so a crash at any step leaves either
//! the old or the new state intact.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::config::SegmentOptions;
use crate::error::Result;
use crate::manifest::Manifest;
use crate::segment::Segment;

use super::layout;
use super::SegmentedStore;

impl SegmentedStore {
    /// Compact all segments into a single active segment
    ///
    /// Steps:
    /// 1. Flush the active segment, then scan every segment oldest → newest
    /// 2. Write the surviving keys to `merge-{id}.tmp` and close it
    /// 3. Rename it to `segment-{id}.db`
    /// 4. Save a manifest listing only the new segment
    /// 5. Swap the new segment in, then close and delete the old ones
    ///
    /// # Errors
    ///
    /// Any I/O or write failure before step 4 leaves the store unchanged.
    pub fn merge(&self) -> Result<()> {
        let dir = self.dir().to_path_buf();
        let mut state = self.state().write();

        state.active()?.flush()?;
        let live = collect_live(&state.segments)?;

        let id = state.next_id;
        state.next_id += 1;
        let name = layout::segment_file_name(id);
        let tmp_path = dir.join(layout::merge_tmp_name(id));
        let final_path = dir.join(&name);

        remove_if_exists(&tmp_path)?;
        if let Err(e) = write_segment(&tmp_path, &live, &self.config().segment) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
        if let Err(e) = fs::rename(&tmp_path, &final_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        let mut manifest = Manifest::default();
        manifest.replace_all(name.clone());
        if let Err(e) = manifest.save(&dir) {
            let _ = fs::remove_file(&final_path);
            return Err(e);
        }

        // From here on the manifest names only the compacted segment
        state.manifest = manifest;
        let compacted = match Segment::open_with_options(&final_path, &self.config().segment) {
            Ok(segment) => segment,
            Err(e) => {
                tracing::error!(
                    segment = %name,
                    error = %e,
                    "compacted segment failed to open; reopen the store to recover"
                );
                return Err(e);
            }
        };
        let old = std::mem::replace(&mut state.segments, vec![compacted]);
        let replaced = old.len();

        for mut segment in old {
            if let Err(e) = segment.close() {
                tracing::warn!(segment = %segment.file_name(), error = %e, "closing merged segment failed");
            }
            if let Err(e) = fs::remove_file(segment.path()) {
                tracing::warn!(segment = %segment.file_name(), error = %e, "removing merged segment failed");
            }
        }

        tracing::info!(segment = %name, replaced, keys = live.len(), "segments merged");
        Ok(())
    }
}

/// Replay every segment in creation order into key → latest live value
fn collect_live(segments: &[Segment]) -> Result<HashMap<Vec<u8>, Vec<u8>>> {
    let mut live = HashMap::new();

    for segment in segments {
        for item in segment.iter()? {
            let (_, record) = item?;
            if record.is_tombstone() {
                live.remove(&record.key);
            } else {
                live.insert(record.key, record.value);
            }
        }
    }

    Ok(live)
}

fn write_segment(
    path: &Path,
    entries: &HashMap<Vec<u8>, Vec<u8>>,
    options: &SegmentOptions,
) -> Result<()> {
    let mut segment = Segment::open_with_options(path, options)?;
    for (key, value) in entries {
        segment.put(key, value)?;
    }
    segment.close()
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
