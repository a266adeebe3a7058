//! Tests for dataset adapters
//!
//! These tests verify:
//! - Directory scanning (sorted, images only, non-recursive)
//! - Label file lookup and text extraction per schema
//! - Archive-specific label names for DOCILE, RVL_CDIP and PubLayNet
//! - Strict vs. lenient handling of missing labels
//! - An adapter driving the write pipeline end to end

use std::fs;
use std::path::Path;

use shardpack::adapter::{ImageDirAdapter, LabelSchema};
use shardpack::{DatasetReader, ShardError, TaskSource, WritePipeline};
use tempfile::TempDir;

mod common;

// =============================================================================
// Helper Functions
// =============================================================================

fn write_label(dir: &Path, name: &str, json: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), json).unwrap();
}

fn write_image(dir: &Path, name: &str, seed: u32) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), common::sample_jpeg(seed)).unwrap();
}

// =============================================================================
// Scanning Tests
// =============================================================================

#[test]
fn test_scan_is_sorted_and_filters_non_images() {
    let temp = TempDir::new().unwrap();
    let images = temp.path().join("images");
    let labels = temp.path().join("labels");
    write_image(&images, "b.JPG", 0);
    write_image(&images, "a.png", 1);
    write_image(&images, "c.webp", 2);
    fs::write(images.join("readme.txt"), "not content").unwrap();
    write_image(&images.join("nested"), "deep.jpg", 3);
    fs::create_dir_all(&labels).unwrap();

    let adapter = ImageDirAdapter::open(&images, &labels, LabelSchema::LayoutLlm).unwrap();

    assert_eq!(adapter.len(), 3);
    let names: Vec<String> = (0..adapter.len())
        .map(|i| adapter.item_at(i).unwrap().original_filename())
        .collect();
    assert_eq!(names, vec!["a.png", "b.JPG", "c.webp"]);
}

#[test]
fn test_missing_directories_fail() {
    let temp = TempDir::new().unwrap();
    let images = temp.path().join("images");
    fs::create_dir_all(&images).unwrap();

    let result = ImageDirAdapter::open(&images, &temp.path().join("nope"), LabelSchema::SceneText);
    assert!(matches!(result, Err(ShardError::PathNotFound(_))));

    let result = ImageDirAdapter::open(&temp.path().join("nope"), &images, LabelSchema::SceneText);
    assert!(matches!(result, Err(ShardError::PathNotFound(_))));
}

// =============================================================================
// Schema Tests
// =============================================================================

#[test]
fn test_scene_text_labels() {
    let temp = TempDir::new().unwrap();
    let images = temp.path().join("images");
    let labels = temp.path().join("labels");
    write_image(&images, "street.jpg", 0);
    write_label(&labels, "street.json", r#"[{"text": "EXIT"}, {"text": "Main St"}]"#);

    let adapter = ImageDirAdapter::open(&images, &labels, LabelSchema::SceneText).unwrap();
    let item = adapter.item_at(0).unwrap();

    assert_eq!(item.label, "EXIT Main St");
    assert_eq!(item.content_path, images.join("street.jpg"));
}

#[test]
fn test_layoutllm_uses_full_filename() {
    let temp = TempDir::new().unwrap();
    let images = temp.path().join("images");
    let labels = temp.path().join("labels");
    write_image(&images, "form.jpg", 0);
    write_label(&labels, "form.jpg.json", r#"[{"text": "Name:"}, {"text": "Jane"}]"#);

    let adapter = ImageDirAdapter::open(&images, &labels, LabelSchema::LayoutLlm).unwrap();

    assert_eq!(adapter.label_path(0), Some(labels.join("form.jpg.json").as_path()));
    assert_eq!(adapter.item_at(0).unwrap().label, "Name: Jane");
}

#[test]
fn test_docile_labels_use_archive_prefix() {
    let temp = TempDir::new().unwrap();
    let images = temp.path().join("images");
    let labels = temp.path().join("DOCILE");
    write_image(&images, "invoice_7.png", 0);
    write_label(&labels, "IE-docile-images-invoice_7.png.json", r#"[{"text": "Total"}]"#);

    let adapter = ImageDirAdapter::open(&images, &labels, LabelSchema::LayoutLlm).unwrap();

    assert_eq!(
        adapter.label_path(0),
        Some(labels.join("IE-docile-images-invoice_7.png.json").as_path())
    );
    assert_eq!(adapter.item_at(0).unwrap().label, "Total");
}

#[test]
fn test_rvl_cdip_labels_use_archive_prefix() {
    let temp = TempDir::new().unwrap();
    let images = temp.path().join("images");
    let labels = temp.path().join("RVL_CDIP");
    write_image(&images, "memo.tif", 0);
    write_label(
        &labels,
        "classification-RVL_CDIP-archive-specification-img-memo.tif.json",
        r#"[{"text": "MEMO"}]"#,
    );

    let adapter = ImageDirAdapter::open(&images, &labels, LabelSchema::LayoutLlm).unwrap();

    assert_eq!(adapter.item_at(0).unwrap().label, "MEMO");
}

#[test]
fn test_archive_rules_only_apply_to_layoutllm() {
    let temp = TempDir::new().unwrap();
    let images = temp.path().join("images");
    let labels = temp.path().join("DOCILE");
    write_image(&images, "sign.jpg", 0);
    write_label(&labels, "sign.json", r#"[{"text": "STOP"}]"#);

    let adapter = ImageDirAdapter::open(&images, &labels, LabelSchema::SceneText).unwrap();

    assert_eq!(adapter.label_path(0), Some(labels.join("sign.json").as_path()));
    assert_eq!(adapter.item_at(0).unwrap().label, "STOP");
}

#[test]
fn test_publaynet_pairs_by_identifier() {
    let temp = TempDir::new().unwrap();
    let images = temp.path().join("images");
    let labels = temp.path().join("PubLayNet");
    write_image(&images, "train_PMC100_00001.jpg", 0);
    write_image(&images, "train_PMC200_00003.jpg", 1);
    write_image(&images, "val_PMC999_00009.jpg", 2);
    write_image(&images, "noidentifier.jpg", 3);
    write_label(&labels, "b_PMC200_00003.jpg.json", r#"[{"text": "second"}]"#);
    write_label(&labels, "a_PMC100_00001.jpg.json", r#"[{"text": "first"}]"#);
    write_label(&labels, "z_PMC100_00001.jpg.json", r#"[{"text": "shadowed"}]"#);

    let adapter = ImageDirAdapter::open(&images, &labels, LabelSchema::LayoutLlm).unwrap();

    // Images without an identifier or a matching label are left out
    assert_eq!(adapter.len(), 2);
    let first = adapter.item_at(0).unwrap();
    assert_eq!(first.original_filename(), "train_PMC100_00001.jpg");
    assert_eq!(first.label, "first");
    assert_eq!(
        adapter.label_path(1),
        Some(labels.join("b_PMC200_00003.jpg.json").as_path())
    );
    assert_eq!(adapter.item_at(1).unwrap().label, "second");
}

#[test]
fn test_aws_textract_lines() {
    let temp = TempDir::new().unwrap();
    let images = temp.path().join("images");
    let labels = temp.path().join("labels");
    write_image(&images, "invoice.jpg", 0);
    write_label(
        &labels,
        "invoice.json",
        r#"{"LINE": [{"Text": "Invoice #42"}, {"Text": "Total 10.00"}]}"#,
    );

    let adapter = ImageDirAdapter::open(&images, &labels, LabelSchema::AwsTextract).unwrap();

    assert_eq!(adapter.item_at(0).unwrap().label, "Invoice #42 Total 10.00");
}

#[test]
fn test_empty_documents_give_empty_labels() {
    for (schema, doc) in [
        (LabelSchema::SceneText, "[]"),
        (LabelSchema::AwsTextract, "{}"),
        (LabelSchema::AzureRead, "null"),
    ] {
        assert_eq!(schema.extract(serde_json::from_str(doc).unwrap()).unwrap(), "");
    }
}

#[test]
fn test_schema_names() {
    assert_eq!("scene_text".parse::<LabelSchema>().unwrap(), LabelSchema::SceneText);
    assert_eq!("LayoutLLM".parse::<LabelSchema>().unwrap(), LabelSchema::LayoutLlm);
    assert_eq!("aws".parse::<LabelSchema>().unwrap(), LabelSchema::AwsTextract);
    assert_eq!("azure_read".parse::<LabelSchema>().unwrap(), LabelSchema::AzureRead);
    assert!(matches!(
        "pdf_miner".parse::<LabelSchema>(),
        Err(ShardError::UnsupportedSchema(_))
    ));
}

// =============================================================================
// Missing Label Tests
// =============================================================================

#[test]
fn test_strict_schema_fails_item_without_label() {
    let temp = TempDir::new().unwrap();
    let images = temp.path().join("images");
    let labels = temp.path().join("labels");
    write_image(&images, "lonely.jpg", 0);
    fs::create_dir_all(&labels).unwrap();

    let adapter = ImageDirAdapter::open(&images, &labels, LabelSchema::SceneText).unwrap();

    assert!(matches!(
        adapter.item_at(0),
        Err(ShardError::ItemProcessing { .. })
    ));
}

#[test]
fn test_lenient_schema_uses_empty_label() {
    let temp = TempDir::new().unwrap();
    let images = temp.path().join("images");
    let labels = temp.path().join("labels");
    write_image(&images, "lonely.jpg", 0);
    write_image(&images, "garbled.jpg", 1);
    write_label(&labels, "garbled.json", "{ not json");

    let adapter = ImageDirAdapter::open(&images, &labels, LabelSchema::AzureRead).unwrap();

    assert_eq!(adapter.item_at(0).unwrap().label, "");
    assert_eq!(adapter.item_at(1).unwrap().label, "");
}

// =============================================================================
// Pipeline Integration
// =============================================================================

#[test]
fn test_adapter_feeds_pipeline() {
    let temp = TempDir::new().unwrap();
    let images = temp.path().join("images");
    let labels = temp.path().join("labels");
    write_image(&images, "a.jpg", 0);
    write_image(&images, "b.jpg", 1);
    write_image(&images, "c.jpg", 2);
    write_label(&labels, "a.json", r#"[{"text": "alpha"}]"#);
    write_label(&labels, "c.json", r#"[{"text": "gamma"}]"#);

    let adapter = ImageDirAdapter::open(&images, &labels, LabelSchema::SceneText).unwrap();
    let shard = temp.path().join("shard");
    let report = WritePipeline::new(common::pipeline_config(1, 10, false))
        .run(&adapter, &shard)
        .unwrap();

    // b.jpg has no label under a strict schema
    assert_eq!(report.submitted, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.final_counter, 2);

    let reader = DatasetReader::open_single(&shard).unwrap();
    let labels: Vec<String> = reader.iter().map(|r| r.unwrap().label).collect();
    assert_eq!(labels, vec!["alpha", "gamma"]);
}
