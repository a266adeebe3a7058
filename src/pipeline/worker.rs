//! Pipeline workers
//!
//! Stateless stages that read and encode task items.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;

use bytes::Bytes;
use crossbeam::channel::{Receiver, Sender};

use crate::codec;
use crate::error::{Result, ShardError};

use super::{PipelineStats, ProcessedItem, ShutdownHandle, TaskItem, TaskSource};

/// Turn one task into an encoded record
pub fn process(task: &TaskItem) -> Result<ProcessedItem> {
    let raw = fs::read(&task.content_path).map_err(|e| ShardError::item(&task.content_path, e))?;
    let content = codec::encode_content(Bytes::from(raw))
        .map_err(|e| ShardError::item(&task.content_path, e))?;

    Ok(ProcessedItem {
        content,
        original_filename: task.original_filename(),
        label: task.label.clone(),
    })
}

/// Worker loop: take tasks until the task channel is drained and closed
///
/// A failing item is logged and dropped. The loop also ends when the
/// coordinator stops listening or shutdown is requested.
pub fn run(
    id: usize,
    tasks: Receiver<TaskItem>,
    results: Sender<ProcessedItem>,
    shutdown: &ShutdownHandle,
    stats: &PipelineStats,
) {
    tracing::trace!(worker = id, "Worker started");

    for task in tasks.iter() {
        if shutdown.is_triggered() {
            break;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| process(&task)))
            .unwrap_or_else(|_| Err(ShardError::item(&task.content_path, "worker panicked")));

        match outcome {
            Ok(item) => {
                if results.send(item).is_err() {
                    // Coordinator is gone
                    break;
                }
            }
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(worker = id, error = %e, "Dropping item");
            }
        }
    }

    tracing::trace!(worker = id, "Worker stopped");
}

/// Producer loop: feed every item of the source into the task channel
///
/// Dropping the sender when done is the completion signal for the workers.
pub fn produce<S: TaskSource + ?Sized>(
    source: &S,
    tasks: Sender<TaskItem>,
    shutdown: &ShutdownHandle,
    stats: &PipelineStats,
) {
    for index in 0..source.len() {
        if shutdown.is_triggered() {
            tracing::info!(submitted = index, "Shutdown requested, no more tasks");
            break;
        }

        match source.item_at(index) {
            Ok(task) => {
                stats.submitted.fetch_add(1, Ordering::Relaxed);
                if tasks.send(task).is_err() {
                    break;
                }
            }
            Err(e) => {
                stats.submitted.fetch_add(1, Ordering::Relaxed);
                stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(index, error = %e, "Dropping item");
            }
        }
    }
}
