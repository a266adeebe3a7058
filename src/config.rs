//! Configuration for shardpack
//!
//! Centralized configuration with sensible defaults.
//!
//! Two layers live here:
//! - Runtime options (`ShardOptions`, `PipelineConfig`) built in code with builders
//! - Run files (`RunConfig` in YAML, `DatasetCatalog` in JSON) loaded by the CLI

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::adapter::LabelSchema;
use crate::error::{Result, ShardError};

/// Default upper bound for a shard's data log (1 TiB)
pub const DEFAULT_MAX_SIZE: u64 = 1 << 40;

// =============================================================================
// Shard Options
// =============================================================================

/// Options used when opening a shard store
#[derive(Debug, Clone)]
pub struct ShardOptions {
    /// Create the shard directory and data log if missing
    pub create: bool,

    /// Delete any pre-existing data log, lock marker and manifest first
    pub clear_existing: bool,

    /// Open without write access (never creates or mutates files)
    pub read_only: bool,

    /// Maximum size of the data log in bytes
    pub max_size: u64,

    /// Sync strategy: how often to fsync the data log
    pub sync_strategy: SyncStrategy,
}

/// Data log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every commit (safest, slowest)
    EveryCommit,

    /// fsync after N commits (balanced durability/performance)
    EveryNCommits { count: usize },
}

impl Default for ShardOptions {
    fn default() -> Self {
        Self {
            create: true,
            clear_existing: false,
            read_only: false,
            max_size: DEFAULT_MAX_SIZE,
            sync_strategy: SyncStrategy::EveryCommit,
        }
    }
}

impl ShardOptions {
    /// Create a new options builder
    pub fn builder() -> ShardOptionsBuilder {
        ShardOptionsBuilder::default()
    }

    /// Options for opening an existing shard for reading only
    pub fn read_only() -> Self {
        Self {
            create: false,
            read_only: true,
            ..Self::default()
        }
    }
}

/// Builder for ShardOptions
#[derive(Default)]
pub struct ShardOptionsBuilder {
    options: ShardOptions,
}

impl ShardOptionsBuilder {
    pub fn create(mut self, create: bool) -> Self {
        self.options.create = create;
        self
    }

    pub fn clear_existing(mut self, clear: bool) -> Self {
        self.options.clear_existing = clear;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.options.read_only = read_only;
        self
    }

    /// Set the maximum data log size (in bytes)
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.options.max_size = bytes;
        self
    }

    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.options.sync_strategy = strategy;
        self
    }

    pub fn build(self) -> ShardOptions {
        self.options
    }
}

// =============================================================================
// Pipeline Configuration
// =============================================================================

/// Configuration for one write pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of staged keys that triggers a commit (two keys per record)
    pub batch_size: usize,

    /// Number of encoding workers
    pub worker_count: usize,

    /// Continue an existing shard instead of starting fresh
    pub resume: bool,

    /// Log progress every N consumed records
    pub progress_interval: u64,

    /// How long the coordinator waits for a result before checking for shutdown
    pub poll_interval: Duration,

    /// Capacity of the bounded task channel
    pub task_queue_capacity: usize,

    /// Maximum size of the shard data log (in bytes)
    pub max_size: u64,

    /// Sync strategy for the shard data log
    pub sync_strategy: SyncStrategy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let worker_count = default_worker_count();
        Self {
            batch_size: 1000,
            worker_count,
            resume: false,
            progress_interval: 1000,
            poll_interval: Duration::from_millis(100),
            task_queue_capacity: worker_count * 4,
            max_size: DEFAULT_MAX_SIZE,
            sync_strategy: SyncStrategy::EveryCommit,
        }
    }
}

impl PipelineConfig {
    /// Create a new config builder
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Shard options implied by this pipeline configuration
    ///
    /// A fresh run always clears the target; a resumed run keeps it.
    pub fn shard_options(&self) -> ShardOptions {
        ShardOptions::builder()
            .create(true)
            .clear_existing(!self.resume)
            .read_only(false)
            .max_size(self.max_size)
            .sync_strategy(self.sync_strategy)
            .build()
    }
}

/// One fewer than the available cores, at least one
fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// Builder for PipelineConfig
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
    queue_capacity_set: bool,
}

impl PipelineConfigBuilder {
    /// Set the batch size (staged keys per commit)
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size.max(1);
        self
    }

    /// Set the number of workers
    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.worker_count = count.max(1);
        self
    }

    pub fn resume(mut self, resume: bool) -> Self {
        self.config.resume = resume;
        self
    }

    pub fn progress_interval(mut self, every: u64) -> Self {
        self.config.progress_interval = every.max(1);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn task_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.task_queue_capacity = capacity.max(1);
        self.queue_capacity_set = true;
        self
    }

    pub fn max_size(mut self, bytes: u64) -> Self {
        self.config.max_size = bytes;
        self
    }

    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    pub fn build(mut self) -> PipelineConfig {
        if !self.queue_capacity_set {
            self.config.task_queue_capacity = self.config.worker_count * 4;
        }
        self.config
    }
}

// =============================================================================
// Run Files
// =============================================================================

/// Run configuration, loaded from YAML
///
/// ```yaml
/// dataset: "receipts, invoices"
/// dataset_info: ./dataset_info.json
/// batch_size: 1000
/// num_workers: 7
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Comma-separated dataset names to process
    pub dataset: String,

    /// Path to the JSON dataset catalogue
    pub dataset_info: PathBuf,

    #[serde(default)]
    pub batch_size: Option<usize>,

    #[serde(default)]
    pub num_workers: Option<usize>,

    #[serde(default)]
    pub resume: bool,

    #[serde(default)]
    pub max_size: Option<u64>,
}

impl RunConfig {
    /// Load a run configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ShardError::PathNotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Dataset names, trimmed, in the order given
    pub fn dataset_names(&self) -> Vec<String> {
        self.dataset
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Pipeline configuration with any overrides from this file applied
    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut builder = PipelineConfig::builder().resume(self.resume);
        if let Some(size) = self.batch_size {
            builder = builder.batch_size(size);
        }
        if let Some(workers) = self.num_workers {
            builder = builder.worker_count(workers);
        }
        if let Some(bytes) = self.max_size {
            builder = builder.max_size(bytes);
        }
        builder.build()
    }

    /// Load the catalogue and resolve every named dataset
    pub fn resolve_datasets(&self) -> Result<Vec<(String, DatasetEntry)>> {
        let catalog = DatasetCatalog::load(&self.dataset_info)?;
        self.dataset_names()
            .into_iter()
            .map(|name| {
                let entry = catalog.get(&name)?.clone();
                Ok((name, entry))
            })
            .collect()
    }
}

/// One dataset in the catalogue
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetEntry {
    pub image_dir: Option<PathBuf>,
    pub json_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub json_type: Option<String>,
}

impl DatasetEntry {
    /// Output (shard) directory, required by both write and recovery
    pub fn output_dir(&self) -> Result<&Path> {
        self.output_dir
            .as_deref()
            .ok_or_else(|| ShardError::Config("missing output_dir".to_string()))
    }

    /// Resolve the write-side inputs: (content dir, label dir, output dir, schema)
    ///
    /// Checks that both input directories exist before anything is written.
    pub fn write_inputs(&self) -> Result<(&Path, &Path, &Path, LabelSchema)> {
        let (Some(image_dir), Some(json_dir), Some(output_dir)) = (
            self.image_dir.as_deref(),
            self.json_dir.as_deref(),
            self.output_dir.as_deref(),
        ) else {
            return Err(ShardError::Config(
                "missing required parameters (image_dir, json_dir, output_dir)".to_string(),
            ));
        };

        if !image_dir.exists() {
            return Err(ShardError::PathNotFound(image_dir.to_path_buf()));
        }
        if !json_dir.exists() {
            return Err(ShardError::PathNotFound(json_dir.to_path_buf()));
        }

        let schema = self.json_type.as_deref().unwrap_or_default().parse()?;
        Ok((image_dir, json_dir, output_dir, schema))
    }
}

/// Dataset catalogue, loaded from JSON: name -> entry
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct DatasetCatalog {
    entries: BTreeMap<String, DatasetEntry>,
}

impl DatasetCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ShardError::PathNotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)?;
        let catalog: Self = serde_json::from_str(&contents)?;
        Ok(catalog)
    }

    pub fn get(&self, name: &str) -> Result<&DatasetEntry> {
        self.entries.get(name).ok_or_else(|| {
            ShardError::Config(format!("dataset name not found in catalogue: {}", name))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
