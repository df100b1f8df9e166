//! Segment Engine Module
//!
//! One append-only log file plus an in-memory hash index.
//!
//! ## Responsibilities
//! - Replay the log at open time to rebuild the index
//! - Serialize all appends through a single background writer
//! - Point lookups by seeking to an indexed offset
//! - Full scans for compaction
//!
//! ## Concurrency Model: Single-Writer / Multiple-Reader
//!
//! ```text
//!   put/delete ──► bounded queue ──► writer thread ──► log file
//!                                         │
//!                                         ▼ (after the append)
//!   get ◄──────── RwLock<HashIndex> ◄─────┘
//! ```
//!
//! The index only ever points at bytes that have already been written.
//! `delete` is the one caller-side mutation: it drops the key from the
//! index before queueing the tombstone, under the same lock.

mod engine;
mod recovery;
mod writer;

use std::collections::HashMap;

pub use engine::Segment;

/// key → byte offset of that key's latest record in the log
pub type HashIndex = HashMap<Vec<u8>, u64>;
