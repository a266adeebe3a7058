//! Write Pipeline Module
//!
//! Turns a task source into durable records in one shard.
//!
//! ## Architecture
//! ```text
//!   TaskSource ──► producer ──► [task channel, bounded] ──► worker × N
//!                                                             │
//!                                                             ▼
//!   ShardStore ◄── coordinator ◄──── [result channel] ◄───────┘
//!   (single writer)
//! ```
//!
//! - The producer closing the task channel tells the workers there is no more
//!   work; the last worker dropping its result sender tells the coordinator.
//! - Workers never touch the shard. The coordinator is the only writer.
//! - Indices are assigned in completion order, not submission order.

mod coordinator;
mod task;
pub mod worker;

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel;

use crate::config::PipelineConfig;
use crate::error::{Result, ShardError};
use crate::store::{ManifestWriter, ShardStore};

pub use coordinator::{Coordinator, StopReason};
pub use task::{ProcessedItem, TaskItem, TaskSource};

/// Cooperative shutdown flag shared by the producer, workers and coordinator
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the pipeline to stop; staged records are still committed
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Counters shared across pipeline threads
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub submitted: AtomicU64,
    pub failed: AtomicU64,
}

/// Summary of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Counter when the run started (non-zero when resuming)
    pub start_counter: u64,

    /// Durable counter when the run ended
    pub final_counter: u64,

    /// Items taken from the source
    pub submitted: u64,

    /// Items dropped because they could not be processed
    pub failed: u64,

    pub stop_reason: StopReason,
    pub elapsed: Duration,
}

impl PipelineReport {
    /// Records made durable by this run
    pub fn written(&self) -> u64 {
        self.final_counter - self.start_counter
    }
}

/// Bounded worker pool feeding a single-writer commit loop
pub struct WritePipeline {
    config: PipelineConfig,
    shutdown: ShutdownHandle,
}

impl WritePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_shutdown(config, ShutdownHandle::new())
    }

    /// Build a pipeline that stops when `shutdown` is triggered
    ///
    /// Lets one handle, e.g. a Ctrl+C handler, stop several runs in turn.
    pub fn with_shutdown(config: PipelineConfig, shutdown: ShutdownHandle) -> Self {
        Self { config, shutdown }
    }

    /// Handle that can stop a running pipeline from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Open (or create) the shard at `shard_path` and write `source` into it
    pub fn run<S: TaskSource + ?Sized>(&self, source: &S, shard_path: &Path) -> Result<PipelineReport> {
        let shard = ShardStore::open(shard_path, self.config.shard_options())?;
        self.run_with_shard(source, shard)
    }

    /// Write `source` into an already open shard, closing it when done
    pub fn run_with_shard<S: TaskSource + ?Sized>(
        &self,
        source: &S,
        shard: ShardStore,
    ) -> Result<PipelineReport> {
        let started = Instant::now();
        let start_counter = shard.counter();

        let manifest = if self.config.resume {
            tracing::info!(counter = start_counter, "Resuming from counter");
            ManifestWriter::resume(shard.path(), start_counter)?
        } else if start_counter > 0 {
            return Err(ShardError::Config(format!(
                "shard {} already holds {} records; resume or clear it first",
                shard.path().display(),
                start_counter
            )));
        } else {
            ManifestWriter::create(shard.path())?
        };

        tracing::info!(
            shard = %shard.path().display(),
            items = source.len(),
            workers = self.config.worker_count,
            batch_size = self.config.batch_size,
            "Starting write pipeline"
        );

        let stats = PipelineStats::default();
        let mut coordinator = Coordinator::new(shard, manifest, &self.config);

        let outcome = self.drive(source, &mut coordinator, &stats);

        // Flush-on-exit happens whether or not the run itself succeeded
        let finished = coordinator.finish();
        let stop_reason = match (outcome, finished) {
            (Ok(reason), Ok(_)) => reason,
            (Err(e), finished) => {
                if let Err(close_err) = finished {
                    tracing::error!(error = %close_err, "Error finishing shard after failure");
                }
                return Err(e);
            }
            (Ok(_), Err(e)) => return Err(e),
        };

        let report = PipelineReport {
            start_counter,
            final_counter: coordinator.committed(),
            submitted: stats.submitted.load(Ordering::Relaxed),
            failed: stats.failed.load(Ordering::Relaxed),
            stop_reason,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            written = report.written(),
            failed = report.failed,
            counter = report.final_counter,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Write pipeline finished"
        );
        Ok(report)
    }

    /// Spawn producer and workers, and run the coordinator on this thread
    fn drive<S: TaskSource + ?Sized>(
        &self,
        source: &S,
        coordinator: &mut Coordinator,
        stats: &PipelineStats,
    ) -> Result<StopReason> {
        let shutdown = &self.shutdown;
        let poll_interval = self.config.poll_interval;

        thread::scope(|scope| -> Result<StopReason> {
            let (task_tx, task_rx) = channel::bounded(self.config.task_queue_capacity);
            let (result_tx, result_rx) = channel::bounded(self.config.task_queue_capacity);

            thread::Builder::new()
                .name("shard-producer".to_string())
                .spawn_scoped(scope, move || worker::produce(source, task_tx, shutdown, stats))?;

            for id in 0..self.config.worker_count {
                let tasks = task_rx.clone();
                let results = result_tx.clone();
                thread::Builder::new()
                    .name(format!("shard-worker-{}", id))
                    .spawn_scoped(scope, move || worker::run(id, tasks, results, shutdown, stats))?;
            }

            // Only the spawned threads may hold these from here on
            drop(task_rx);
            drop(result_tx);

            // Returning drops the receiver, so workers stop as soon as they
            // try to hand over another result
            coordinator.consume(&result_rx, shutdown, poll_interval)
        })
    }
}
