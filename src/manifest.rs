//! Manifest
//!
//! Persisted list of live segment files, oldest first, so a store can
//! reopen the right segments in the right order after a restart.
//!
//! ## File Format
//!
//! `manifest.json` in the store directory:
//!
//! ```text
//! {
//!   "segments": ["segment-0.db", "segment-1.db"],
//!   "active_index": 1
//! }
//! ```
//!
//! `active_index` is `-1` when no segment exists yet. The last entry is
//! always the active segment.
//!
//! ## Crash Safety
//!
//! Saves write `manifest.json.tmp`, fsync it, then rename it over
//! `manifest.json`, so a reader sees either the old or the new content.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KvError, Result};

/// Name of the manifest file within the store directory
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Temporary file used during manifest rewrites
pub const MANIFEST_TMP_FILENAME: &str = "manifest.json.tmp";

/// Ordered list of segment file names plus the active segment's position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Segment file names in creation order
    pub segments: Vec<String>,

    /// Position of the active segment, `-1` when empty
    pub active_index: i64,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            segments: Vec::new(),
            active_index: -1,
        }
    }
}

impl Manifest {
    /// Load the manifest from `dir`
    ///
    /// A missing file is the first-run case and yields an empty manifest.
    ///
    /// # Errors
    ///
    /// `Manifest` if the file exists but is not valid JSON or its
    /// `active_index` does not point at the last segment.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILENAME);

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };

        let manifest: Manifest = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            KvError::Manifest(format!("failed to decode {}: {}", path.display(), e))
        })?;
        manifest.validate()?;

        Ok(manifest)
    }

    /// Whether `dir` holds a saved manifest
    pub fn exists(dir: &Path) -> bool {
        dir.join(MANIFEST_FILENAME).is_file()
    }

    /// Persist the full manifest to `dir`, replacing any prior content
    pub fn save(&self, dir: &Path) -> Result<()> {
        let tmp_path = dir.join(MANIFEST_TMP_FILENAME);

        {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            let mut writer = BufWriter::new(file);

            serde_json::to_writer_pretty(&mut writer, self)
                .map_err(|e| KvError::Manifest(format!("failed to encode manifest: {}", e)))?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        fs::rename(&tmp_path, dir.join(MANIFEST_FILENAME))?;
        Ok(())
    }

    /// Append a new active segment (does **not** save to disk)
    pub fn push_segment(&mut self, name: impl Into<String>) {
        self.segments.push(name.into());
        self.active_index = self.segments.len() as i64 - 1;
    }

    /// Replace every entry with a single active segment (used after compaction)
    pub fn replace_all(&mut self, name: impl Into<String>) {
        self.segments = vec![name.into()];
        self.active_index = 0;
    }

    /// File name of the active segment
    pub fn active_segment(&self) -> Option<&str> {
        usize::try_from(self.active_index)
            .ok()
            .and_then(|i| self.segments.get(i))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn validate(&self) -> Result<()> {
        let expected = self.segments.len() as i64 - 1;
        if self.active_index != expected {
            return Err(KvError::Manifest(format!(
                "active_index {} does not point at the last of {} segments",
                self.active_index,
                self.segments.len()
            )));
        }
        Ok(())
    }
}
