//! Adapter Module
//!
//! Turns dataset directories into task sources for the write pipeline.
//!
//! ## Responsibilities
//! - Discover content files and pair them with label files
//! - Extract label text according to a closed set of schemas
//!
//! The pipeline only sees the `TaskSource` interface, so it stays agnostic of
//! which schema produced the labels.

mod image_dir;
mod schema;

pub use image_dir::{ImageDirAdapter, IMAGE_SUFFIXES};
pub use schema::LabelSchema;
