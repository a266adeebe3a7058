//! Shard manifest
//!
//! Append-only list of original filenames, one line per record index.
//!
//! Lines are staged while records are staged and only written once the commit
//! that makes those records durable has succeeded. The manifest can therefore
//! lag the counter after a crash, but never run ahead of it.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Manifest filename inside a shard directory
pub const MANIFEST_FILENAME: &str = "shard.lst";

/// Path of the manifest for a shard directory
pub fn manifest_path(shard_dir: &Path) -> PathBuf {
    shard_dir.join(MANIFEST_FILENAME)
}

/// Load the ordered filename list of a shard
///
/// A missing manifest is an empty list.
pub fn load(shard_dir: &Path) -> Result<Vec<String>> {
    let path = manifest_path(shard_dir);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(&path)?;
    Ok(contents.lines().map(str::to_string).collect())
}

/// Appends filenames to a shard manifest
pub struct ManifestWriter {
    file: BufWriter<File>,

    /// Lines staged for the next commit
    pending: Vec<String>,
}

impl ManifestWriter {
    /// Start a fresh manifest, truncating any existing one
    pub fn create(shard_dir: &Path) -> Result<Self> {
        let file = File::create(manifest_path(shard_dir))?;
        Ok(Self {
            file: BufWriter::new(file),
            pending: Vec::new(),
        })
    }

    /// Reopen a manifest for appending after `counter` committed records
    ///
    /// Lines past `counter` name records that never became durable and are
    /// dropped. A manifest shorter than `counter` is padded with empty lines so
    /// that line `i` keeps naming record `i`.
    pub fn resume(shard_dir: &Path, counter: u64) -> Result<Self> {
        let path = manifest_path(shard_dir);
        let mut lines = load(shard_dir)?;
        let existing = lines.len() as u64;

        if existing != counter {
            tracing::warn!(
                manifest = existing,
                counter,
                "Manifest length differs from counter, reconciling"
            );
            lines.resize(counter as usize, String::new());
            let mut contents = lines.join("\n");
            if !lines.is_empty() {
                contents.push('\n');
            }
            fs::write(&path, contents)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            file: BufWriter::new(file),
            pending: Vec::new(),
        })
    }

    /// Stage a filename for the next commit
    pub fn stage(&mut self, filename: &str) {
        let line = if filename.contains(['\n', '\r']) {
            tracing::warn!(filename, "Filename contains a line break, escaping");
            filename.replace(['\n', '\r'], "_")
        } else {
            filename.to_string()
        };
        self.pending.push(line);
    }

    /// Write every staged line and flush
    pub fn commit(&mut self) -> Result<()> {
        for line in self.pending.drain(..) {
            self.file.write_all(line.as_bytes())?;
            self.file.write_all(b"\n")?;
        }
        self.file.flush()?;
        Ok(())
    }

    /// Drop staged lines whose records were never committed
    pub fn discard_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}
