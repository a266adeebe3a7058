//! Recovery
//!
//! Rebuilds the original files of one shard from its stored blobs.
//!
//! The manifest names each record; the counter bounds which indices are
//! valid. Iteration covers `min(manifest length, counter)` records, so a
//! manifest that lags the counter after an unclean shutdown is tolerated.

use std::fs;
use std::path::{Path, PathBuf};

use crate::codec::{self, Namespace};
use crate::config::ShardOptions;
use crate::error::Result;
use crate::store::{manifest, ShardStore};

/// Outcome of a recovery run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Durable record count of the shard
    pub counter: u64,

    /// Number of lines in the manifest
    pub manifest_len: u64,

    /// Indices visited
    pub attempted: u64,

    /// Files written
    pub recovered: u64,

    /// Indices with no stored image
    pub missing: u64,

    /// Indices skipped for an empty manifest line or undecodable content
    pub skipped: u64,
}

impl RecoveryReport {
    /// Whether the manifest and counter disagree (tolerated, not an error)
    pub fn manifest_mismatch(&self) -> bool {
        self.manifest_len != self.counter
    }
}

/// Default output directory for a shard: `foo_lmdb` → `foo_recovered`, `foo` → `foo_recovered`
pub fn default_output_dir(shard_path: &Path) -> PathBuf {
    let name = shard_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "shard".to_string());
    let recovered = match name.strip_suffix("_lmdb") {
        Some(stem) => format!("{}_recovered", stem),
        None => format!("{}_recovered", name),
    };
    shard_path.with_file_name(recovered)
}

/// Write every recoverable record of the shard at `shard_path` into `output_dir`
pub fn recover(shard_path: &Path, output_dir: &Path) -> Result<RecoveryReport> {
    let mut shard = ShardStore::open(shard_path, ShardOptions::read_only())?;
    let filenames = manifest::load(shard_path)?;
    fs::create_dir_all(output_dir)?;

    let mut report = RecoveryReport {
        counter: shard.counter(),
        manifest_len: filenames.len() as u64,
        ..RecoveryReport::default()
    };

    if report.manifest_mismatch() {
        tracing::warn!(
            manifest = report.manifest_len,
            counter = report.counter,
            "Manifest length differs from counter, recovering the shorter range"
        );
    }

    let bound = report.manifest_len.min(report.counter);
    tracing::info!(
        shard = %shard_path.display(),
        output = %output_dir.display(),
        records = bound,
        "Recovering shard"
    );

    for (index, filename) in filenames.iter().take(bound as usize).enumerate() {
        let index = index as u64;
        report.attempted += 1;

        let Some(target) = safe_target(output_dir, filename) else {
            tracing::warn!(index, "No usable filename in manifest, skipping");
            report.skipped += 1;
            continue;
        };

        let Some(stored) = shard.get(Namespace::Image, index)? else {
            tracing::error!(index, "Image not found for index");
            report.missing += 1;
            continue;
        };

        let payload = match codec::decode_content(stored) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(index, error = %e, "Undecodable image, skipping");
                report.skipped += 1;
                continue;
            }
        };

        fs::write(&target, &payload.bytes)?;
        report.recovered += 1;
        tracing::debug!(index, counter = report.counter, file = %filename, "Recovered image");
    }

    shard.close()?;
    tracing::info!(
        attempted = report.attempted,
        recovered = report.recovered,
        missing = report.missing,
        skipped = report.skipped,
        "Recovery finished"
    );
    Ok(report)
}

/// Output path for a manifest filename, confined to `output_dir`
fn safe_target(output_dir: &Path, filename: &str) -> Option<PathBuf> {
    let name = Path::new(filename).file_name()?;
    Some(output_dir.join(name))
}
