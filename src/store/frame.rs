//! Commit frame definitions
//!
//! Defines the on-disk structure of a single committed batch.

use bytes::Bytes;

use crate::error::{Result, ShardError};

/// Frame header: seq (8) + crc (4) + payload_len (4)
pub const HEADER_SIZE: usize = 16;

/// Per-entry header inside the payload: key_len (4) + value_len (4)
const ENTRY_HEADER_SIZE: usize = 8;

/// Where a value lives in the data log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueLocation {
    /// Absolute byte offset of the value in the data log
    pub offset: u64,

    /// Value length in bytes
    pub len: u32,
}

/// One batch, as written by a single commit
#[derive(Debug, Clone)]
pub struct CommitFrame {
    /// Commit sequence number, 1-based and contiguous
    pub seq: u64,

    /// Key-value pairs in the batch
    pub entries: Vec<(Vec<u8>, Bytes)>,
}

/// A frame serialized for appending, with value positions relative to the frame start
#[derive(Debug)]
pub struct EncodedFrame {
    pub bytes: Vec<u8>,
    pub locations: Vec<(Vec<u8>, u64, u32)>,
}

impl EncodedFrame {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Resolve relative value positions against the frame's file offset
    pub fn locate(self, frame_offset: u64) -> Vec<(Vec<u8>, ValueLocation)> {
        self.locations
            .into_iter()
            .map(|(key, rel, len)| {
                (
                    key,
                    ValueLocation {
                        offset: frame_offset + rel,
                        len,
                    },
                )
            })
            .collect()
    }
}

impl CommitFrame {
    pub fn new(seq: u64, entries: Vec<(Vec<u8>, Bytes)>) -> Self {
        Self { seq, entries }
    }

    /// Serialize the frame
    ///
    /// ```text
    /// ┌─────────┬─────────┬─────────┬───────────┬──────────────────────────────┐
    /// │ Seq (8) │ CRC (4) │ Len (4) │ Count (4) │ KeyLen ValLen Key Value ...  │
    /// └─────────┴─────────┴─────────┴───────────┴──────────────────────────────┘
    /// ```
    pub fn encode(&self) -> Result<EncodedFrame> {
        let payload_len: usize = 4 + self
            .entries
            .iter()
            .map(|(k, v)| ENTRY_HEADER_SIZE + k.len() + v.len())
            .sum::<usize>();

        if payload_len > u32::MAX as usize {
            return Err(ShardError::CommitFailure(format!(
                "batch too large for a single frame: {} bytes",
                payload_len
            )));
        }

        let mut payload = Vec::with_capacity(payload_len);
        let mut locations = Vec::with_capacity(self.entries.len());
        payload.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());

        for (key, value) in &self.entries {
            let key_len = u32::try_from(key.len())
                .map_err(|_| ShardError::CommitFailure("key too large".to_string()))?;
            let value_len = u32::try_from(value.len())
                .map_err(|_| ShardError::CommitFailure("value too large".to_string()))?;

            payload.extend_from_slice(&key_len.to_be_bytes());
            payload.extend_from_slice(&value_len.to_be_bytes());
            payload.extend_from_slice(key);

            let rel = (HEADER_SIZE + payload.len()) as u64;
            locations.push((key.clone(), rel, value_len));
            payload.extend_from_slice(value);
        }

        let crc = crc32fast::hash(&payload);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&self.seq.to_be_bytes());
        bytes.extend_from_slice(&crc.to_be_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&payload);

        Ok(EncodedFrame { bytes, locations })
    }
}

/// Parsed frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub seq: u64,
    pub crc: u32,
    pub payload_len: u32,
}

impl FrameHeader {
    pub fn parse(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut seq = [0u8; 8];
        seq.copy_from_slice(&bytes[0..8]);
        let mut crc = [0u8; 4];
        crc.copy_from_slice(&bytes[8..12]);
        let mut len = [0u8; 4];
        len.copy_from_slice(&bytes[12..16]);

        Self {
            seq: u64::from_be_bytes(seq),
            crc: u32::from_be_bytes(crc),
            payload_len: u32::from_be_bytes(len),
        }
    }
}

/// Walk a CRC-verified payload, yielding (key, value offset in payload, value len)
///
/// The payload must already have passed its CRC check; structural damage here
/// means the writer produced a bad frame, which is reported as corruption.
pub fn parse_payload(payload: &[u8]) -> Result<Vec<(Vec<u8>, usize, u32)>> {
    let corrupt = |what: &str| ShardError::Corruption(format!("malformed frame payload: {}", what));

    let count_bytes: [u8; 4] = payload
        .get(0..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| corrupt("missing entry count"))?;
    let count = u32::from_be_bytes(count_bytes) as usize;

    let mut entries = Vec::with_capacity(count.min(1 << 16));
    let mut pos = 4;
    for _ in 0..count {
        let header: [u8; ENTRY_HEADER_SIZE] = payload
            .get(pos..pos + ENTRY_HEADER_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| corrupt("truncated entry header"))?;
        let key_len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let value_len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        pos += ENTRY_HEADER_SIZE;

        let key = payload
            .get(pos..pos + key_len)
            .ok_or_else(|| corrupt("truncated key"))?
            .to_vec();
        pos += key_len;

        let value_end = pos + value_len as usize;
        if value_end > payload.len() {
            return Err(corrupt("truncated value"));
        }
        entries.push((key, pos, value_len));
        pos = value_end;
    }

    if pos != payload.len() {
        return Err(corrupt("trailing bytes"));
    }
    Ok(entries)
}
