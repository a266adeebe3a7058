//! Shared helpers for integration tests

#![allow(dead_code)]

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::{DynamicImage, Rgb, RgbImage};
use shardpack::{PipelineConfig, PipelineReport, TaskItem, WritePipeline};

fn sample_pixels(seed: u32) -> DynamicImage {
    let pixels = RgbImage::from_fn(16, 16, |x, y| {
        Rgb([
            (x * 16) as u8 ^ seed as u8,
            (y * 16) as u8,
            (seed.wrapping_mul(37) % 256) as u8,
        ])
    });
    DynamicImage::ImageRgb8(pixels)
}

fn encode_sample(seed: u32, format: image::ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    sample_pixels(seed)
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

/// A small decodable JPEG, distinct per seed
pub fn sample_jpeg(seed: u32) -> Vec<u8> {
    encode_sample(seed, image::ImageFormat::Jpeg)
}

/// A small decodable PNG, distinct per seed
pub fn sample_png(seed: u32) -> Vec<u8> {
    encode_sample(seed, image::ImageFormat::Png)
}

/// JPEG signature followed by bytes that are not image data
pub fn broken_jpeg() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF];
    bytes.extend_from_slice(b"this is not image data at all");
    bytes
}

/// Write one image file per (name, label) and return matching task items
pub fn write_images(dir: &Path, entries: &[(&str, &str)]) -> Vec<TaskItem> {
    fs::create_dir_all(dir).unwrap();
    entries
        .iter()
        .enumerate()
        .map(|(i, (name, label))| {
            let path = dir.join(name);
            fs::write(&path, sample_jpeg(i as u32)).unwrap();
            TaskItem::new(path, *label)
        })
        .collect()
}

/// `count` images named `img_00000.jpg`.. labelled `label-<n>`
pub fn numbered_items(dir: &Path, count: usize) -> Vec<TaskItem> {
    let names: Vec<(String, String)> = (0..count)
        .map(|i| (format!("img_{:05}.jpg", i), format!("label-{}", i)))
        .collect();
    let refs: Vec<(&str, &str)> = names.iter().map(|(n, l)| (n.as_str(), l.as_str())).collect();
    write_images(dir, &refs)
}

pub fn pipeline_config(workers: usize, batch_size: usize, resume: bool) -> PipelineConfig {
    PipelineConfig::builder()
        .worker_count(workers)
        .batch_size(batch_size)
        .resume(resume)
        .poll_interval(Duration::from_millis(10))
        .build()
}

/// Run the pipeline over `items` into `shard`
pub fn write_shard(
    shard: &Path,
    items: &Vec<TaskItem>,
    workers: usize,
    batch_size: usize,
    resume: bool,
) -> PipelineReport {
    WritePipeline::new(pipeline_config(workers, batch_size, resume))
        .run(items, shard)
        .unwrap()
}

pub fn shard_path(root: &Path, name: &str) -> PathBuf {
    root.join(name)
}
