//! Configuration for segkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Default soft cap on the active segment's size (bytes)
pub const DEFAULT_MAX_SEGMENT_SIZE: u64 = 1 << 10;

/// Default capacity of a segment's write queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

/// Main configuration for a segmented store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── manifest.json    (ordered segment list)
    ///     ├── segment-0.db     (oldest segment)
    ///     └── segment-N.db     (active segment)
    pub data_dir: PathBuf,

    /// Rotate to a new segment once the active one reaches this many bytes.
    /// Checked before each write, so a segment may overshoot by one record.
    pub max_segment_size: u64,

    // -------------------------------------------------------------------------
    // Segment Configuration
    // -------------------------------------------------------------------------
    /// Options applied to every segment the store opens
    pub segment: SegmentOptions,
}

/// Per-segment writer options
#[derive(Debug, Clone, Copy)]
pub struct SegmentOptions {
    /// Bounded write queue size; a full queue blocks `put`
    pub queue_capacity: usize,

    /// How often the background writer fsyncs the log
    pub sync_strategy: SyncStrategy,
}

/// Log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every append (safest, slowest)
    EveryWrite,

    /// fsync after N appends (balanced durability/performance)
    EveryNEntries { count: usize },

    /// fsync only on explicit flush or close
    OnFlush,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            sync_strategy: SyncStrategy::EveryNEntries { count: 100 },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./segkv_data"),
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            segment: SegmentOptions::default(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the segment rotation threshold (in bytes)
    pub fn max_segment_size(mut self, size: u64) -> Self {
        self.config.max_segment_size = size;
        self
    }

    /// Set the write queue capacity of each segment
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.segment.queue_capacity = capacity;
        self
    }

    /// Set the log sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.segment.sync_strategy = strategy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
