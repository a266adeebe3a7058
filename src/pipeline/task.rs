//! Task definitions
//!
//! Units of work flowing through the write pipeline.

use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::Result;

/// One source item submitted to the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskItem {
    /// Path of the content file to read
    pub content_path: PathBuf,

    /// Label text for the content
    pub label: String,
}

impl TaskItem {
    pub fn new(content_path: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            content_path: content_path.into(),
            label: label.into(),
        }
    }

    /// Filename recorded in the manifest (the path's final component)
    pub fn original_filename(&self) -> String {
        file_name_of(&self.content_path)
    }
}

/// A task turned into an encoded record, not yet assigned an index
#[derive(Debug, Clone)]
pub struct ProcessedItem {
    pub content: Bytes,
    pub original_filename: String,
    pub label: String,
}

/// A sequence of task items, as produced by a dataset adapter
///
/// Implementations must be shareable across the pipeline's producer thread.
pub trait TaskSource: Sync {
    /// Number of items in the source
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve the item at `index` (`index < len()`)
    fn item_at(&self, index: usize) -> Result<TaskItem>;
}

impl TaskSource for Vec<TaskItem> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn item_at(&self, index: usize) -> Result<TaskItem> {
        self.get(index).cloned().ok_or_else(|| {
            crate::ShardError::IndexOutOfRange {
                index: index as i64,
                length: self.as_slice().len() as u64,
            }
        })
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
