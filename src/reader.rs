//! Multi-Shard Reader
//!
//! Presents an ordered list of shards as one contiguous index space.
//!
//! ```text
//!  logical:  0 1 2 3 4 5 6 7 8
//!           └──A──┘ └───B───┘ └C┘
//!  offsets: [0,     3,        7, 9]
//! ```
//!
//! Shard `i` covers logical indices `offsets[i]..offsets[i + 1]`.

use std::path::Path;

use crate::codec::{self, ImagePayload, Namespace};
use crate::config::ShardOptions;
use crate::error::{Result, ShardError};
use crate::store::ShardStore;

/// One record read back from a dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub image: ImagePayload,
    pub label: String,
}

/// Read-only view over one or more shards
pub struct DatasetReader {
    shards: Vec<ShardStore>,

    /// Prefix sums of shard counters; `offsets.len() == shards.len() + 1`
    offsets: Vec<u64>,
}

impl DatasetReader {
    /// Open every shard read-only, in order
    ///
    /// If any shard fails to open, the ones already opened are closed and the
    /// error is returned.
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        if paths.is_empty() {
            return Err(ShardError::Config("no shard paths given".to_string()));
        }

        let mut shards: Vec<ShardStore> = Vec::with_capacity(paths.len());
        for path in paths {
            match ShardStore::open(path.as_ref(), ShardOptions::read_only()) {
                Ok(shard) => shards.push(shard),
                Err(e) => {
                    for shard in shards.iter_mut() {
                        if let Err(close_err) = shard.close() {
                            tracing::error!(error = %close_err, "Error closing shard");
                        }
                    }
                    return Err(e);
                }
            }
        }

        let mut offsets = Vec::with_capacity(shards.len() + 1);
        offsets.push(0u64);
        for shard in &shards {
            let last = offsets[offsets.len() - 1];
            offsets.push(last + shard.counter());
        }

        tracing::debug!(shards = shards.len(), length = offsets[shards.len()], "Opened dataset");
        Ok(Self { shards, offsets })
    }

    /// Open a single shard
    pub fn open_single(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(&[path.as_ref()])
    }

    /// Total number of records across all shards
    pub fn len(&self) -> u64 {
        self.offsets[self.offsets.len() - 1]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Prefix-sum boundaries, `shard_count() + 1` entries starting at zero
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Resolve a logical index to (shard position, local index)
    pub fn locate(&self, index: i64) -> Result<(usize, u64)> {
        let length = self.len();
        if index < 0 || index as u64 >= length {
            return Err(ShardError::IndexOutOfRange { index, length });
        }
        let index = index as u64;

        if self.shards.len() == 1 {
            return Ok((0, index));
        }

        // First boundary strictly above `index`; its predecessor owns the index.
        // Empty shards share a boundary with their successor and are skipped.
        let shard = self.offsets.partition_point(|&offset| offset <= index) - 1;
        Ok((shard, index - self.offsets[shard]))
    }

    /// Read the record at a logical index
    pub fn get(&self, index: i64) -> Result<Record> {
        let (position, local) = self.locate(index)?;
        let shard = &self.shards[position];

        let image = shard.get(Namespace::Image, local)?.ok_or_else(|| {
            ShardError::RecordIntegrity(format!(
                "image not found for index {} (shard {}, local {})",
                index,
                shard.path().display(),
                local
            ))
        })?;
        let label = shard.get(Namespace::Label, local)?.ok_or_else(|| {
            ShardError::RecordIntegrity(format!(
                "label not found for index {} (shard {}, local {})",
                index,
                shard.path().display(),
                local
            ))
        })?;

        Ok(Record {
            image: codec::decode_content(image)?,
            label: codec::decode_label(&label)?,
        })
    }

    /// Iterate over every record in logical order
    pub fn iter(&self) -> impl Iterator<Item = Result<Record>> + '_ {
        (0..self.len()).map(move |index| self.get(index as i64))
    }

    /// Close all shards; calling it again is a no-op
    pub fn close(&mut self) -> Result<()> {
        let mut first_err = None;
        for shard in self.shards.iter_mut() {
            if let Err(e) = shard.close() {
                tracing::error!(path = %shard.path().display(), error = %e, "Error closing shard");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
