//! Store file naming and cleanup
//!
//! Segment files are `segment-{id}.db` with ids that only ever grow, so a
//! compacted segment never reuses the name of a file it replaces.

use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::manifest::Manifest;

const SEGMENT_PREFIX: &str = "segment-";
const SEGMENT_EXT: &str = ".db";
const MERGE_PREFIX: &str = "merge-";
const TMP_EXT: &str = ".tmp";

/// "segment-{id}.db"
pub fn segment_file_name(id: u64) -> String {
    format!("{}{}{}", SEGMENT_PREFIX, id, SEGMENT_EXT)
}

/// Temp file a compaction writes before renaming it into place
pub(super) fn merge_tmp_name(id: u64) -> String {
    format!("{}{}{}", MERGE_PREFIX, id, TMP_EXT)
}

/// "segment-42.db" → Some(42)
pub fn parse_segment_id(name: &str) -> Option<u64> {
    name.strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_EXT)?
        .parse()
        .ok()
}

/// One past the highest id the manifest references, or 0
pub(super) fn next_segment_id(manifest: &Manifest) -> u64 {
    manifest
        .segments
        .iter()
        .filter_map(|name| parse_segment_id(name))
        .max()
        .map_or(0, |id| id + 1)
}

/// Names of every `segment-*.db` file in `dir`, sorted by id
pub(super) fn segment_files(dir: &Path) -> Result<Vec<String>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(id) = parse_segment_id(&name) {
            found.push((id, name));
        }
    }
    found.sort_unstable();
    Ok(found.into_iter().map(|(_, name)| name).collect())
}

/// Remove leftovers of an interrupted rotation or compaction
///
/// Deletes `*.tmp` files and any `segment-*.db` the manifest does not
/// list. Returns how many files were removed.
pub(super) fn sweep_unreferenced(dir: &Path, manifest: &Manifest) -> Result<usize> {
    let mut removed = 0;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let stale = name.ends_with(TMP_EXT)
            || (parse_segment_id(&name).is_some() && !manifest.segments.contains(&name));

        if stale {
            tracing::warn!(file = %name, "removing file not referenced by manifest");
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }

    Ok(removed)
}
