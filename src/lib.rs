//! # shardpack
//!
//! Packs large collections of (image, label) pairs into shard archives with:
//! - Atomic batch commits with a durable record counter
//! - Resumable writes after an interrupted run
//! - Random access across several shards as one index space
//! - Recovery of the original files from a shard
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Dataset Adapter (TaskSource)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ TaskItem
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    Write Pipeline                           │
//! │           (N workers → single-writer coordinator)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ commit_batch
//!          ┌────────────▼────────────┐
//!          │        ShardStore       │
//!          │ (data log + manifest)   │
//!          └──────┬───────────┬──────┘
//!                 │           │
//!                 ▼           ▼
//!        ┌──────────────┐ ┌──────────────┐
//!        │DatasetReader │ │   Recovery   │
//!        │ (N shards)   │ │ (1 shard)    │
//!        └──────────────┘ └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod store;
pub mod pipeline;
pub mod reader;
pub mod recovery;
pub mod adapter;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ShardError, Result};
pub use config::{PipelineConfig, ShardOptions, SyncStrategy};
pub use store::{ShardStore, WriteBatch};
pub use pipeline::{PipelineReport, ShutdownHandle, TaskItem, TaskSource, WritePipeline};
pub use reader::{DatasetReader, Record};
pub use recovery::{recover, RecoveryReport};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of shardpack
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
