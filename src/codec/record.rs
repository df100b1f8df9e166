//! Record definition and framing
//!
//! `encode` and `decode` are exact inverses; `decode` reports the number of
//! bytes it consumed so callers can track file offsets.

use std::io::{self, Read};

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{KvError, Result};

use super::{HEADER_SIZE, MAX_RECORD_SIZE};

/// A single key-value record as stored in a segment log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub key: Vec<u8>,

    /// Empty means tombstone
    pub value: Vec<u8>,
}

impl Record {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a tombstone marking `key` deleted
    pub fn tombstone(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: Vec::new(),
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_empty()
    }
}

/// Encode a record into its framed on-disk form
///
/// Format: crc32(payload) (4) + payload_len (4) + payload
pub fn encode(record: &Record) -> Result<Bytes> {
    let payload =
        bincode::serialize(record).map_err(|e| KvError::Serialization(e.to_string()))?;

    if payload.len() > MAX_RECORD_SIZE as usize {
        return Err(KvError::Serialization(format!(
            "Record too large: {} bytes (max {})",
            payload.len(),
            MAX_RECORD_SIZE
        )));
    }

    let mut frame = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    frame.put_u32_le(crc32fast::hash(&payload));
    frame.put_u32_le(payload.len() as u32);
    frame.put_slice(&payload);

    Ok(frame.freeze())
}

/// Decode exactly one record from the reader's current position
///
/// Returns:
/// - `Ok(Some((record, consumed)))` — a whole record was read
/// - `Ok(None)` — clean end of input, no bytes consumed
/// - `Err(Corruption)` — input ended mid-record or the frame is malformed
pub fn decode<R: Read>(reader: &mut R) -> Result<Option<(Record, usize)>> {
    let mut header = [0u8; HEADER_SIZE];
    let read = read_full(reader, &mut header)?;

    if read == 0 {
        return Ok(None);
    }
    if read < HEADER_SIZE {
        return Err(KvError::Corruption(format!(
            "Truncated record header: expected {} bytes, got {}",
            HEADER_SIZE, read
        )));
    }

    let crc = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let payload_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    if payload_len > MAX_RECORD_SIZE {
        return Err(KvError::Corruption(format!(
            "Record length {} exceeds maximum {}",
            payload_len, MAX_RECORD_SIZE
        )));
    }

    let mut payload = vec![0u8; payload_len as usize];
    let read = read_full(reader, &mut payload)?;
    if read < payload.len() {
        return Err(KvError::Corruption(format!(
            "Truncated record payload: expected {} bytes, got {}",
            payload_len, read
        )));
    }

    let actual = crc32fast::hash(&payload);
    if actual != crc {
        return Err(KvError::Corruption(format!(
            "CRC mismatch: stored {:#010x}, computed {:#010x}",
            crc, actual
        )));
    }

    let record: Record = bincode::deserialize(&payload)
        .map_err(|e| KvError::Corruption(format!("Undecodable record payload: {}", e)))?;

    Ok(Some((record, HEADER_SIZE + payload.len())))
}

/// Fill `buf` from `reader`, stopping early only at end of input.
/// Returns the number of bytes actually read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
