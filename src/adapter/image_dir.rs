//! Image directory adapter
//!
//! Pairs every image in a content directory with its label file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, ShardError};
use crate::pipeline::{TaskItem, TaskSource};

use super::LabelSchema;

/// File suffixes treated as content (compared case-insensitively)
pub const IMAGE_SUFFIXES: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "tif", "tiff", "webp"];

// Label directory names with their own layoutllm naming rules
const DOCILE_DIR: &str = "DOCILE";
const RVL_CDIP_DIR: &str = "RVL_CDIP";
const PUBLAYNET_DIR: &str = "PubLayNet";

const DOCILE_PREFIX: &str = "IE-docile-images-";
const RVL_CDIP_PREFIX: &str = "classification-RVL_CDIP-archive-specification-img-";

/// Dataset adapter over a directory of images and a directory of label files
#[derive(Debug, Clone)]
pub struct ImageDirAdapter {
    schema: LabelSchema,

    /// (content file, label file) pairs, sorted by content filename
    pairs: Vec<(PathBuf, PathBuf)>,
}

impl ImageDirAdapter {
    /// Scan `content_dir` (non-recursively) for images and pair each with its label
    pub fn open(content_dir: &Path, label_dir: &Path, schema: LabelSchema) -> Result<Self> {
        if !content_dir.is_dir() {
            return Err(ShardError::PathNotFound(content_dir.to_path_buf()));
        }
        if !label_dir.is_dir() {
            return Err(ShardError::PathNotFound(label_dir.to_path_buf()));
        }

        let mut content_paths = Vec::new();
        for entry in fs::read_dir(content_dir)? {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                content_paths.push(path);
            }
        }
        content_paths.sort();
        let scanned = content_paths.len();

        let pairs = pair_labels(content_paths, label_dir, schema)?;

        tracing::info!(
            content_dir = %content_dir.display(),
            schema = %schema,
            scanned,
            items = pairs.len(),
            "Scanned dataset directory"
        );

        Ok(Self { schema, pairs })
    }

    /// Label file paired with the item at `index`
    pub fn label_path(&self, index: usize) -> Option<&Path> {
        self.pairs.get(index).map(|(_, label)| label.as_path())
    }

    fn read_label(&self, label_path: &Path) -> Result<String> {
        let contents = fs::read_to_string(label_path)?;
        let document = serde_json::from_str(&contents)?;
        self.schema.extract(document)
    }
}

/// Resolve the label file of every content file
///
/// Layoutllm datasets stored under `DOCILE`, `RVL_CDIP` or `PubLayNet` name
/// their label files after the source archive rather than the image.
fn pair_labels(
    content_paths: Vec<PathBuf>,
    label_dir: &Path,
    schema: LabelSchema,
) -> Result<Vec<(PathBuf, PathBuf)>> {
    let dir_name = label_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let prefix = match (schema, dir_name.as_str()) {
        (LabelSchema::LayoutLlm, DOCILE_DIR) => Some(DOCILE_PREFIX),
        (LabelSchema::LayoutLlm, RVL_CDIP_DIR) => Some(RVL_CDIP_PREFIX),
        (LabelSchema::LayoutLlm, PUBLAYNET_DIR) => {
            return pair_publaynet(content_paths, label_dir);
        }
        _ => None,
    };

    Ok(content_paths
        .into_iter()
        .map(|content| {
            let filename = file_name_of(&content);
            let label = match prefix {
                Some(prefix) => format!("{}{}.json", prefix, filename),
                None => schema.label_filename(&filename),
            };
            (content, label_dir.join(label))
        })
        .collect())
}

/// Pair images with the first label file containing their identifier
///
/// The identifier is everything after the first `_` of the image filename,
/// e.g. `PMC6093876_00001.jpg` for `train_PMC6093876_00001.jpg`. Images with
/// no identifier or no matching label file are left out of the dataset.
fn pair_publaynet(content_paths: Vec<PathBuf>, label_dir: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut label_files = Vec::new();
    for entry in fs::read_dir(label_dir)? {
        let path = entry?.path();
        let name = file_name_of(&path);
        if path.is_file() && name.ends_with(".json") {
            label_files.push(name);
        }
    }
    label_files.sort();

    let mut pairs = Vec::with_capacity(content_paths.len());
    for content in content_paths {
        let filename = file_name_of(&content);
        let matched = filename
            .split_once('_')
            .map(|(_, id)| id)
            .filter(|id| !id.is_empty())
            .and_then(|id| label_files.iter().find(|name| name.contains(id)));

        match matched {
            Some(label) => pairs.push((content, label_dir.join(label))),
            None => tracing::warn!(image = %filename, "No PubLayNet label file matches image, skipping"),
        }
    }
    Ok(pairs)
}

impl TaskSource for ImageDirAdapter {
    fn len(&self) -> usize {
        self.pairs.len()
    }

    fn item_at(&self, index: usize) -> Result<TaskItem> {
        let (content_path, label_path) = self.pairs.get(index).ok_or(ShardError::IndexOutOfRange {
            index: index as i64,
            length: self.pairs.len() as u64,
        })?;

        let label = match self.read_label(label_path) {
            Ok(label) => label,
            Err(e) if self.schema.is_strict() => {
                return Err(ShardError::item(label_path, e));
            }
            Err(e) => {
                tracing::error!(label = %label_path.display(), error = %e, "Unreadable label, using empty text");
                String::new()
            }
        };

        Ok(TaskItem::new(content_path.clone(), label))
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| IMAGE_SUFFIXES.contains(&ext.as_str()))
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
