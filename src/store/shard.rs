//! Shard store
//!
//! One embedded store instance: data log, key index, counter and lock marker.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::codec::{self, Namespace, COUNTER_KEY};
use crate::config::ShardOptions;
use crate::error::{Result, ShardError};

use super::batch::WriteBatch;
use super::frame::ValueLocation;
use super::log::{self, LogWriter};
use super::manifest::MANIFEST_FILENAME;

/// An open shard
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader
///
/// - **Writes** (`commit_batch`): need `&mut self`, so only the owner of the
///   store can commit. The write pipeline's coordinator is that owner.
/// - **Reads** (`get`): take `&self`; the file handle used for positioned reads
///   sits behind a mutex, the index is immutable between commits.
/// - Independent read-only handles on the same shard may coexist in any number.
pub struct ShardStore {
    dir: PathBuf,
    options: ShardOptions,

    /// Committed record count
    counter: u64,

    /// `None` once closed
    state: Option<OpenState>,
}

struct OpenState {
    /// Latest value location for every committed key
    index: BTreeMap<Vec<u8>, ValueLocation>,

    /// Handle used for value reads
    reader: Mutex<File>,

    /// Present only for writable stores
    writer: Option<LogWriter>,
}

impl ShardStore {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    pub const DATA_FILENAME: &'static str = "data.log";
    pub const LOCK_FILENAME: &'static str = "LOCK";

    /// Open or create a shard at `path`
    ///
    /// On open:
    /// 1. Create the directory if allowed, or fail with `PathNotFound`
    /// 2. Clear stale files if requested
    /// 3. Replay the data log into the key index
    /// 4. Load the counter (absent means zero)
    pub fn open(path: impl AsRef<Path>, options: ShardOptions) -> Result<Self> {
        let dir = path.as_ref().to_path_buf();

        if options.read_only && options.clear_existing {
            return Err(ShardError::Config(
                "clear_existing cannot be combined with read_only".to_string(),
            ));
        }

        // Step 1: Directory
        if !dir.is_dir() {
            if options.create && !options.read_only {
                fs::create_dir_all(&dir)?;
            } else {
                return Err(ShardError::PathNotFound(dir));
            }
        }

        // Step 2: Clear stale files
        if options.clear_existing {
            Self::clear_files(&dir)?;
        }

        let data_path = dir.join(Self::DATA_FILENAME);
        if !data_path.exists() && (options.read_only || !options.create) {
            return Err(ShardError::PathNotFound(data_path));
        }

        // Step 3: Replay and open handles
        if !options.read_only {
            // Create before replay so a fresh shard replays as empty
            File::options().create(true).append(true).open(&data_path)?;
        }

        let replayed = log::replay(&data_path)?;
        if replayed.damaged_mid_log && !options.read_only {
            return Err(ShardError::Corruption(format!(
                "{}: damaged frame at offset {} is followed by more data",
                data_path.display(),
                replayed.valid_len
            )));
        }
        if replayed.torn_tail {
            tracing::warn!(
                path = %data_path.display(),
                valid_len = replayed.valid_len,
                "Data log has an incomplete tail"
            );
        }

        if !options.read_only {
            let lock_path = dir.join(Self::LOCK_FILENAME);
            if lock_path.exists() {
                tracing::warn!(
                    path = %dir.display(),
                    "Lock marker present, previous writer did not close cleanly"
                );
            }
            fs::write(&lock_path, std::process::id().to_string())?;
        }

        let writer = if options.read_only {
            None
        } else {
            Some(LogWriter::open(
                &data_path,
                replayed.valid_len,
                replayed.last_seq,
                options.sync_strategy,
            )?)
        };

        let mut index = BTreeMap::new();
        for (key, location) in replayed.entries {
            index.insert(key, location);
        }

        let reader = File::open(&data_path)?;
        let state = OpenState {
            index,
            reader: Mutex::new(reader),
            writer,
        };

        // Step 4: Counter
        let counter_bytes = Self::read_location(&state, COUNTER_KEY)?;
        let counter = codec::decode_counter(counter_bytes.as_deref())?;

        tracing::info!(
            path = %dir.display(),
            counter,
            frames = replayed.frames,
            read_only = options.read_only,
            "Opened shard"
        );

        Ok(Self {
            dir,
            options,
            counter,
            state: Some(state),
        })
    }

    /// Remove the data log, lock marker and manifest of a shard directory
    fn clear_files(dir: &Path) -> Result<()> {
        let mut cleared = false;
        for name in [Self::DATA_FILENAME, Self::LOCK_FILENAME, MANIFEST_FILENAME] {
            let path = dir.join(name);
            if path.exists() {
                fs::remove_file(&path)?;
                cleared = true;
            }
        }
        if cleared {
            tracing::info!(path = %dir.display(), "Cleared existing shard");
        }
        Ok(())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Atomically commit a batch together with the new counter value
    ///
    /// Either every entry and the counter become visible, or none do.
    /// The counter never moves backwards.
    pub fn commit_batch(&mut self, batch: &WriteBatch, new_counter: u64) -> Result<()> {
        let counter = self.counter;
        let max_size = self.options.max_size;
        let state = self.state.as_mut().ok_or(ShardError::Closed)?;
        let writer = state.writer.as_mut().ok_or(ShardError::ReadOnly)?;

        if new_counter < counter {
            return Err(ShardError::CommitFailure(format!(
                "counter would move backwards from {} to {}",
                counter, new_counter
            )));
        }

        let mut entries: Vec<(Vec<u8>, Bytes)> = batch
            .iter()
            .filter(|(key, _)| key.as_slice() != COUNTER_KEY)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        entries.push((COUNTER_KEY.to_vec(), Bytes::from(codec::encode_counter(new_counter))));

        let locations = writer.append(entries, max_size).inspect_err(|e| {
            tracing::error!(error = %e, counter, "Commit failed, counter not advanced");
        })?;

        for (key, location) in locations {
            state.index.insert(key, location);
        }
        self.counter = new_counter;

        tracing::debug!(
            keys = batch.len(),
            counter = new_counter,
            seq = writer.last_seq(),
            "Committed batch"
        );
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Look up a record value by namespace and local index
    pub fn get(&self, namespace: Namespace, index: u64) -> Result<Option<Bytes>> {
        self.get_raw(&codec::index_key(namespace, index))
    }

    /// Look up any key
    pub fn get_raw(&self, key: &[u8]) -> Result<Option<Bytes>> {
        let state = self.state.as_ref().ok_or(ShardError::Closed)?;
        Self::read_location(state, key)
    }

    fn read_location(state: &OpenState, key: &[u8]) -> Result<Option<Bytes>> {
        let Some(location) = state.index.get(key).copied() else {
            return Ok(None);
        };

        let mut buf = vec![0u8; location.len as usize];
        let mut reader = state.reader.lock();
        reader.seek(SeekFrom::Start(location.offset))?;
        reader.read_exact(&mut buf).map_err(|e| {
            ShardError::Corruption(format!(
                "value at offset {} unreadable: {}",
                location.offset, e
            ))
        })?;
        Ok(Some(Bytes::from(buf)))
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.state
            .as_ref()
            .is_some_and(|state| state.index.contains_key(key))
    }

    /// Keys starting with `prefix`, in key order
    pub fn keys_with_prefix(&self, prefix: &[u8]) -> Vec<Vec<u8>> {
        let Some(state) = self.state.as_ref() else {
            return Vec::new();
        };
        state
            .index
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Number of committed record keys in a namespace
    pub fn count_keys(&self, namespace: Namespace) -> usize {
        let Some(state) = self.state.as_ref() else {
            return 0;
        };
        let prefix = namespace.prefix();
        state
            .index
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .count()
    }

    /// Number of distinct committed keys, metadata included
    pub fn len_keys(&self) -> usize {
        self.state.as_ref().map_or(0, |state| state.index.len())
    }

    /// Current durable record count
    pub fn counter(&self) -> u64 {
        self.counter
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Release the store handles; calling it again is a no-op
    pub fn close(&mut self) -> Result<()> {
        let Some(state) = self.state.take() else {
            return Ok(());
        };

        if let Some(mut writer) = state.writer {
            writer.sync()?;
            let lock_path = self.dir.join(Self::LOCK_FILENAME);
            if lock_path.exists() {
                fs::remove_file(&lock_path)?;
            }
        }

        tracing::debug!(path = %self.dir.display(), counter = self.counter, "Closed shard");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_none()
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Size of the committed data log in bytes
    pub fn data_len(&self) -> u64 {
        self.state
            .as_ref()
            .and_then(|state| state.writer.as_ref())
            .map_or_else(
                || fs::metadata(self.dir.join(Self::DATA_FILENAME)).map_or(0, |m| m.len()),
                LogWriter::len,
            )
    }
}

impl Drop for ShardStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(path = %self.dir.display(), error = %e, "Error closing shard");
        }
    }
}
