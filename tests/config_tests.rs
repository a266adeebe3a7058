//! Tests for configuration
//!
//! These tests verify:
//! - Builder defaults and clamping
//! - Shard options implied by a pipeline configuration
//! - YAML run files and the JSON dataset catalogue

use std::fs;
use std::path::Path;
use std::time::Duration;

use shardpack::adapter::LabelSchema;
use shardpack::config::{DatasetCatalog, RunConfig, DEFAULT_MAX_SIZE};
use shardpack::{PipelineConfig, ShardError, ShardOptions, SyncStrategy};
use tempfile::TempDir;

// =============================================================================
// Builder Tests
// =============================================================================

#[test]
fn test_pipeline_defaults() {
    let config = PipelineConfig::default();

    assert_eq!(config.batch_size, 1000);
    assert!(config.worker_count >= 1);
    assert!(!config.resume);
    assert_eq!(config.poll_interval, Duration::from_millis(100));
    assert_eq!(config.task_queue_capacity, config.worker_count * 4);
    assert_eq!(config.max_size, DEFAULT_MAX_SIZE);
}

#[test]
fn test_builder_clamps_zero_values() {
    let config = PipelineConfig::builder()
        .batch_size(0)
        .worker_count(0)
        .progress_interval(0)
        .build();

    assert_eq!(config.batch_size, 1);
    assert_eq!(config.worker_count, 1);
    assert_eq!(config.progress_interval, 1);
    assert_eq!(config.task_queue_capacity, 4);
}

#[test]
fn test_explicit_queue_capacity_wins() {
    let config = PipelineConfig::builder()
        .task_queue_capacity(3)
        .worker_count(8)
        .build();

    assert_eq!(config.task_queue_capacity, 3);
}

#[test]
fn test_shard_options_follow_resume() {
    let fresh = PipelineConfig::builder().resume(false).max_size(4096).build();
    let options = fresh.shard_options();
    assert!(options.create);
    assert!(options.clear_existing);
    assert!(!options.read_only);
    assert_eq!(options.max_size, 4096);

    let resumed = PipelineConfig::builder()
        .resume(true)
        .sync_strategy(SyncStrategy::EveryNCommits { count: 8 })
        .build();
    let options = resumed.shard_options();
    assert!(!options.clear_existing);
    assert_eq!(options.sync_strategy, SyncStrategy::EveryNCommits { count: 8 });
}

#[test]
fn test_read_only_options() {
    let options = ShardOptions::read_only();

    assert!(options.read_only);
    assert!(!options.create);
    assert!(!options.clear_existing);
}

// =============================================================================
// Run File Tests
// =============================================================================

fn write_catalog(root: &Path) -> std::path::PathBuf {
    let images = root.join("images");
    let labels = root.join("labels");
    fs::create_dir_all(&images).unwrap();
    fs::create_dir_all(&labels).unwrap();

    let catalog = serde_json::json!({
        "receipts": {
            "image_dir": images,
            "json_dir": labels,
            "output_dir": root.join("receipts_lmdb"),
            "json_type": "aws_textract"
        },
        "signs": {
            "image_dir": root.join("missing_images"),
            "json_dir": labels,
            "output_dir": root.join("signs_lmdb"),
            "json_type": "scene_text"
        },
        "partial": {
            "output_dir": root.join("partial_lmdb")
        }
    });
    let path = root.join("dataset_info.json");
    fs::write(&path, serde_json::to_string_pretty(&catalog).unwrap()).unwrap();
    path
}

#[test]
fn test_run_config_from_yaml() {
    let temp = TempDir::new().unwrap();
    let catalog = write_catalog(temp.path());
    let yaml = format!(
        "dataset: \" receipts , signs,\"\ndataset_info: {}\nbatch_size: 50\nnum_workers: 3\nresume: true\n",
        catalog.display()
    );
    let path = temp.path().join("run.yaml");
    fs::write(&path, yaml).unwrap();

    let config = RunConfig::load(&path).unwrap();
    assert_eq!(config.dataset_names(), vec!["receipts", "signs"]);

    let pipeline = config.pipeline_config();
    assert_eq!(pipeline.batch_size, 50);
    assert_eq!(pipeline.worker_count, 3);
    assert_eq!(pipeline.task_queue_capacity, 12);
    assert!(pipeline.resume);

    let datasets = config.resolve_datasets().unwrap();
    assert_eq!(datasets.len(), 2);
    assert_eq!(datasets[0].0, "receipts");
}

#[test]
fn test_missing_run_file() {
    let temp = TempDir::new().unwrap();
    let result = RunConfig::load(&temp.path().join("run.yaml"));
    assert!(matches!(result, Err(ShardError::PathNotFound(_))));
}

#[test]
fn test_unknown_dataset_name() {
    let temp = TempDir::new().unwrap();
    let catalog = write_catalog(temp.path());
    let yaml = format!("dataset: receipts,invoices\ndataset_info: {}\n", catalog.display());
    let path = temp.path().join("run.yaml");
    fs::write(&path, yaml).unwrap();

    let result = RunConfig::load(&path).unwrap().resolve_datasets();
    assert!(matches!(result, Err(ShardError::Config(_))));
}

#[test]
fn test_malformed_yaml() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("run.yaml");
    fs::write(&path, "dataset: [unclosed\n").unwrap();

    assert!(matches!(RunConfig::load(&path), Err(ShardError::Yaml(_))));
}

// =============================================================================
// Catalogue Tests
// =============================================================================

#[test]
fn test_catalog_write_inputs() {
    let temp = TempDir::new().unwrap();
    let catalog = DatasetCatalog::load(&write_catalog(temp.path())).unwrap();
    assert_eq!(catalog.len(), 3);

    let (image_dir, json_dir, output_dir, schema) =
        catalog.get("receipts").unwrap().write_inputs().unwrap();
    assert_eq!(image_dir, temp.path().join("images"));
    assert_eq!(json_dir, temp.path().join("labels"));
    assert_eq!(output_dir, temp.path().join("receipts_lmdb"));
    assert_eq!(schema, LabelSchema::AwsTextract);
}

#[test]
fn test_catalog_missing_input_dir() {
    let temp = TempDir::new().unwrap();
    let catalog = DatasetCatalog::load(&write_catalog(temp.path())).unwrap();

    let result = catalog.get("signs").unwrap().write_inputs();
    assert!(matches!(result, Err(ShardError::PathNotFound(_))));
}

#[test]
fn test_catalog_missing_parameters() {
    let temp = TempDir::new().unwrap();
    let catalog = DatasetCatalog::load(&write_catalog(temp.path())).unwrap();
    let entry = catalog.get("partial").unwrap();

    // Enough for recovery, not for writing
    assert_eq!(entry.output_dir().unwrap(), temp.path().join("partial_lmdb"));
    assert!(matches!(entry.write_inputs(), Err(ShardError::Config(_))));
}
