//! Shard Store Module
//!
//! The embedded store behind a single shard.
//!
//! ## Responsibilities
//! - Atomic batch commits (entries + counter in one frame)
//! - CRC32 checksums for torn-write detection
//! - Replay of the data log into an in-memory key index on open
//! - Point lookups by namespace and local index
//! - The append-only manifest of original filenames
//!
//! ## Shard Layout
//! ```text
//! {shard_dir}/
//!   ├── data.log      (commit frames)
//!   ├── LOCK          (present while a writer has the shard open)
//!   └── shard.lst     (manifest, one filename per record index)
//! ```
//!
//! ## Data Log Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Frame 1                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ Seq (8) │ CRC (4) │Len (4) │ Batch  │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Frame 2                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ Seq (8) │ CRC (4) │Len (4) │ Batch  │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! └─────────────────────────────────────────┘
//! ```

mod batch;
mod frame;
mod log;
pub mod manifest;
mod shard;

pub use batch::WriteBatch;
pub use frame::{CommitFrame, ValueLocation, HEADER_SIZE};
pub use log::{replay, LogWriter, ReplayResult};
pub use manifest::{ManifestWriter, MANIFEST_FILENAME};
pub use shard::ShardStore;
