//! # segkv
//!
//! A segmented, append-only key-value store with:
//! - Per-segment hash indexes rebuilt by log replay
//! - A single background writer per segment (ordered, asynchronous appends)
//! - Size-based segment rotation
//! - Manifest-based recovery of segment order
//! - Crash-safe compaction that drops superseded values and tombstones
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     SegmentedStore                          │
//! │          put / get / delete / merge / flush / close         │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐               ┌──────────────────┐
//!   │    Manifest     │               │  Segment × N     │
//!   │ (manifest.json) │               │ oldest … active  │
//!   └─────────────────┘               └────────┬─────────┘
//!                                              │
//!                                   ┌──────────┴──────────┐
//!                                   ▼                     ▼
//!                           ┌──────────────┐      ┌──────────────┐
//!                           │ Writer thread│      │  HashIndex   │
//!                           │ (FIFO queue) │─────►│  (RwLock)    │
//!                           └──────┬───────┘      └──────────────┘
//!                                  ▼
//!                           ┌──────────────┐
//!                           │ Record codec │
//!                           │  (log file)  │
//!                           └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod segment;
pub mod manifest;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::{Config, SegmentOptions, SyncStrategy};
pub use codec::Record;
pub use manifest::Manifest;
pub use segment::Segment;
pub use store::SegmentedStore;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of segkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
