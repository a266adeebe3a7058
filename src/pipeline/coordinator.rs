//! Pipeline coordinator
//!
//! The single writer: assigns indices, stages records and commits batches.

use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError};

use crate::codec::{self, Namespace, MAX_INDEX};
use crate::config::PipelineConfig;
use crate::error::{Result, ShardError};
use crate::store::{ManifestWriter, ShardStore, WriteBatch};

use super::{ProcessedItem, ShutdownHandle};

/// Why the coordinator stopped consuming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every worker finished and the result channel drained
    Drained,

    /// Shutdown was requested
    Interrupted,
}

/// Owns the shard for writing for the duration of a run
pub struct Coordinator {
    shard: ShardStore,
    manifest: ManifestWriter,

    /// Staged entries not yet committed
    cache: WriteBatch,

    /// Next index to assign (in-memory counter)
    next_index: u64,

    /// Durable counter after the last successful commit
    committed: u64,

    /// Records consumed from the result channel
    consumed: u64,

    batch_size: usize,
    progress_interval: u64,

    /// Set after a failed commit; no further commits are attempted
    failed: bool,
}

impl Coordinator {
    pub fn new(shard: ShardStore, manifest: ManifestWriter, config: &PipelineConfig) -> Self {
        let counter = shard.counter();
        Self {
            shard,
            manifest,
            cache: WriteBatch::new(),
            next_index: counter,
            committed: counter,
            consumed: 0,
            batch_size: config.batch_size,
            progress_interval: config.progress_interval,
            failed: false,
        }
    }

    /// Consume results until the channel closes or shutdown is requested
    pub fn consume(
        &mut self,
        results: &Receiver<ProcessedItem>,
        shutdown: &ShutdownHandle,
        poll_interval: Duration,
    ) -> Result<StopReason> {
        loop {
            if shutdown.is_triggered() {
                tracing::info!(consumed = self.consumed, "Shutdown requested, draining");
                return Ok(StopReason::Interrupted);
            }

            match results.recv_timeout(poll_interval) {
                Ok(item) => self.stage(item)?,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Ok(StopReason::Drained),
            }
        }
    }

    /// Assign the next index to an item and stage its entries
    pub fn stage(&mut self, item: ProcessedItem) -> Result<()> {
        let index = self.next_index;
        if index > MAX_INDEX {
            return Err(ShardError::CommitFailure(format!(
                "index space exhausted at {}",
                index
            )));
        }

        self.cache.put(codec::index_key(Namespace::Image, index), item.content);
        self.cache
            .put(codec::index_key(Namespace::Label, index), codec::encode_label(&item.label));
        self.manifest.stage(&item.original_filename);

        self.next_index += 1;
        self.consumed += 1;
        tracing::trace!(index, filename = %item.original_filename, "Staged record");

        if self.cache.len() >= self.batch_size {
            self.commit()?;
        }

        if self.consumed % self.progress_interval == 0 {
            tracing::info!(processed = self.consumed, counter = self.next_index, "Progress");
        }
        Ok(())
    }

    /// Commit the cache and the new counter, then append the manifest lines
    pub fn commit(&mut self) -> Result<()> {
        if self.cache.is_empty() {
            return Ok(());
        }
        if self.failed {
            return Err(ShardError::CommitFailure(
                "an earlier commit failed, refusing to continue".to_string(),
            ));
        }

        if let Err(e) = self.shard.commit_batch(&self.cache, self.next_index) {
            self.failed = true;
            let lost = self.manifest.discard_pending();
            self.cache.clear();
            self.next_index = self.committed;
            tracing::error!(error = %e, lost, counter = self.committed, "Batch commit failed");
            return Err(e);
        }

        self.committed = self.next_index;
        self.cache.clear();
        self.manifest.commit()?;
        Ok(())
    }

    /// Flush anything staged and close the shard
    ///
    /// Runs on every exit path; a failed commit earlier in the run means the
    /// cache was already discarded, so only the close happens.
    pub fn finish(&mut self) -> Result<u64> {
        let flushed = if self.failed { Ok(()) } else { self.commit() };
        let closed = self.shard.close();
        flushed?;
        closed?;
        Ok(self.committed)
    }

    /// Durable counter after the last successful commit
    pub fn committed(&self) -> u64 {
        self.committed
    }

    pub fn staged(&self) -> usize {
        self.cache.len()
    }
}
