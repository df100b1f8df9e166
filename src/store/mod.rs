//! Segmented Store Module
//!
//! Orchestrates an ordered sequence of segments.
//!
//! ## Responsibilities
//! - Route writes to the newest (active) segment
//! - Rotate to a fresh segment once the active one is full
//! - Resolve reads newest → oldest
//! - Compact every segment into one, dropping superseded and deleted keys
//! - Keep the manifest in step with the segment list
//!
//! ## Directory Layout
//! ```text
//! {data_dir}/
//!   ├── manifest.json      [segment-3.db, segment-4.db], active_index = 1
//!   ├── segment-3.db       read-only (rotated out)
//!   └── segment-4.db       active
//! ```

mod layout;
mod merge;
mod segmented;

pub use layout::{parse_segment_id, segment_file_name};
pub use segmented::SegmentedStore;
