//! Data log writer and replay
//!
//! Appends commit frames and rebuilds the key index on open.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::config::SyncStrategy;
use crate::error::{Result, ShardError};

use super::frame::{parse_payload, CommitFrame, FrameHeader, ValueLocation, HEADER_SIZE};

// =============================================================================
// Writer
// =============================================================================

/// Appends commit frames to the data log
pub struct LogWriter {
    file: File,

    /// Length of the log after the last successful append
    len: u64,

    /// Sequence number of the last successful append
    last_seq: u64,

    sync_strategy: SyncStrategy,

    /// Appends since the last fsync
    unsynced: usize,

    /// Set when a failed append could not be rolled back
    poisoned: bool,
}

impl LogWriter {
    /// Open the log for appending at `valid_len`, discarding anything after it
    pub fn open(path: &Path, valid_len: u64, last_seq: u64, sync_strategy: SyncStrategy) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let on_disk = file.metadata()?.len();
        if on_disk > valid_len {
            tracing::warn!(
                path = %path.display(),
                discarded = on_disk - valid_len,
                "Truncating torn tail of data log"
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::Start(valid_len))?;

        Ok(Self {
            file,
            len: valid_len,
            last_seq,
            sync_strategy,
            unsynced: 0,
            poisoned: false,
        })
    }

    /// Append one batch as a single frame
    ///
    /// Returns the locations of every value in the frame. On failure the log is
    /// rolled back to its previous length so no partial frame stays behind.
    pub fn append(
        &mut self,
        entries: Vec<(Vec<u8>, bytes::Bytes)>,
        max_size: u64,
    ) -> Result<Vec<(Vec<u8>, ValueLocation)>> {
        if self.poisoned {
            return Err(ShardError::CommitFailure(
                "data log is poisoned by an earlier failed rollback".to_string(),
            ));
        }

        let seq = self.last_seq + 1;
        let encoded = CommitFrame::new(seq, entries).encode()?;

        if self.len + encoded.len() > max_size {
            return Err(ShardError::CommitFailure(format!(
                "data log would grow to {} bytes, exceeding max size {}",
                self.len + encoded.len(),
                max_size
            )));
        }

        let frame_offset = self.len;
        if let Err(e) = self.write_frame(&encoded.bytes) {
            self.rollback(frame_offset);
            return Err(ShardError::CommitFailure(e.to_string()));
        }

        self.len += encoded.len();
        self.last_seq = seq;
        Ok(encoded.locate(frame_offset))
    }

    fn write_frame(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.file.write_all(bytes)?;
        self.file.flush()?;

        self.unsynced += 1;
        let due = match self.sync_strategy {
            SyncStrategy::EveryCommit => true,
            SyncStrategy::EveryNCommits { count } => self.unsynced >= count.max(1),
        };
        if due {
            self.file.sync_data()?;
            self.unsynced = 0;
        }
        Ok(())
    }

    fn rollback(&mut self, len: u64) {
        let restored = self
            .file
            .set_len(len)
            .and_then(|_| self.file.seek(SeekFrom::Start(len)).map(|_| ()));
        if let Err(e) = restored {
            tracing::error!(error = %e, "Failed to roll back partial frame, refusing further commits");
            self.poisoned = true;
        }
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        self.unsynced = 0;
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }
}

// =============================================================================
// Replay
// =============================================================================

/// Result of replaying a data log
#[derive(Debug, Default)]
pub struct ReplayResult {
    /// Every key's latest value location, in replay order
    pub entries: Vec<(Vec<u8>, ValueLocation)>,

    /// Number of complete frames replayed
    pub frames: u64,

    /// Sequence number of the last complete frame
    pub last_seq: u64,

    /// Length of the log covered by complete frames
    pub valid_len: u64,

    /// Whether bytes after `valid_len` were ignored
    pub torn_tail: bool,

    /// Whether a complete frame failed validation with more data after it
    ///
    /// Unlike a torn tail this cannot come from an interrupted append, and
    /// truncating at `valid_len` would throw away frames that may be intact.
    pub damaged_mid_log: bool,
}

impl ReplayResult {
    fn mark_damaged(&mut self, frame_end: u64, file_len: u64) {
        self.torn_tail = true;
        if frame_end < file_len {
            self.damaged_mid_log = true;
            tracing::warn!(
                offset = self.valid_len,
                discarded = file_len - self.valid_len,
                "Damaged frame is followed by more data"
            );
        }
    }
}

/// Replay every complete frame in the data log
///
/// Stops at the first frame that is incomplete, fails its CRC, or breaks the
/// sequence; everything from there on is reported as a torn tail. A damaged
/// frame that is not the last one is also flagged in `damaged_mid_log`.
pub fn replay(path: &Path) -> Result<ReplayResult> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let mut result = ReplayResult::default();

    loop {
        let mut header = [0u8; HEADER_SIZE];
        match read_full(&mut reader, &mut header)? {
            0 => break,
            n if n < HEADER_SIZE => {
                result.torn_tail = true;
                break;
            }
            _ => {}
        }
        let header = FrameHeader::parse(&header);
        let frame_end = result.valid_len + HEADER_SIZE as u64 + header.payload_len as u64;

        if header.seq != result.last_seq + 1 {
            tracing::warn!(
                expected = result.last_seq + 1,
                found = header.seq,
                "Data log sequence break, ignoring remainder"
            );
            result.mark_damaged(frame_end, file_len);
            break;
        }

        if frame_end > file_len {
            result.torn_tail = true;
            break;
        }

        let mut payload = vec![0u8; header.payload_len as usize];
        if read_full(&mut reader, &mut payload)? < payload.len() {
            result.torn_tail = true;
            break;
        }

        if crc32fast::hash(&payload) != header.crc {
            tracing::warn!(seq = header.seq, "Data log CRC mismatch, ignoring remainder");
            result.mark_damaged(frame_end, file_len);
            break;
        }

        let payload_offset = result.valid_len + HEADER_SIZE as u64;
        for (key, offset, len) in parse_payload(&payload)? {
            result.entries.push((
                key,
                ValueLocation {
                    offset: payload_offset + offset as u64,
                    len,
                },
            ));
        }

        result.frames += 1;
        result.last_seq = header.seq;
        result.valid_len = frame_end;
    }

    if !result.torn_tail && result.valid_len < file_len {
        result.torn_tail = true;
    }
    Ok(result)
}

/// Read until `buf` is full or EOF, returning the number of bytes read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
