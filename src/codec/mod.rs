//! Record Codec Module
//!
//! Binary encoding of a single key-value record, the unit of durability
//! and of recovery scanning.
//!
//! ## Responsibilities
//! - Self-delimiting framing so a decoder knows exactly how many bytes it used
//! - CRC32 checksums for corruption detection
//! - Sequential scanning of a log file (recovery, compaction)
//!
//! ## Record Format
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │ Record                                          │
//! │ ┌─────────┬─────────┬─────────────────────────┐ │
//! │ │ CRC (4) │ Len (4) │ bincode { key, value }  │ │
//! │ └─────────┴─────────┴─────────────────────────┘ │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! An empty `value` is a tombstone: the key is deleted as of that record.

mod reader;
mod record;

pub use reader::RecordReader;
pub use record::{decode, encode, Record};

/// Header size: CRC (4) + payload length (4)
pub const HEADER_SIZE: usize = 8;

/// Largest payload a decoder will accept (64 MB)
pub const MAX_RECORD_SIZE: u32 = 64 * 1024 * 1024;
