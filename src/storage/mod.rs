//! Persistence layer.
//!
//! Each cycle's newly detected opportunities are handed to an
//! `OpportunityArchive`. The default archive appends them to a JSON array
//! on disk. The scan loop logs archive failures and carries on.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::types::ArbitrageOpportunity;

/// Default archive file path.
pub const DEFAULT_ARCHIVE_FILE: &str = "found_arbitrage.json";

/// Durable sink for finalized opportunity batches.
pub trait OpportunityArchive: Send + Sync {
    fn archive(&self, batch: &[ArbitrageOpportunity]) -> Result<()>;
}

/// Appends batches to a pretty-printed JSON array file.
pub struct JsonFileArchive {
    path: PathBuf,
}

impl JsonFileArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for JsonFileArchive {
    fn default() -> Self {
        Self::new(DEFAULT_ARCHIVE_FILE)
    }
}

impl OpportunityArchive for JsonFileArchive {
    fn archive(&self, batch: &[ArbitrageOpportunity]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut all = load_archive(&self.path).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Overwriting unreadable archive");
            Vec::new()
        });
        all.extend_from_slice(batch);

        let json = serde_json::to_string_pretty(&all)
            .context("Failed to serialise opportunities")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write archive to {}", self.path.display()))?;

        info!(
            path = %self.path.display(),
            added = batch.len(),
            total = all.len(),
            "Opportunities archived"
        );
        Ok(())
    }
}

/// Load archived opportunities. A missing file is an empty archive.
pub fn load_archive(path: &Path) -> Result<Vec<ArbitrageOpportunity>> {
    if !path.exists() {
        debug!(path = %path.display(), "No archive yet");
        return Ok(Vec::new());
    }

    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read archive {}", path.display()))?;

    serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse archive {}", path.display()))
}

/// Delete the archive file (for testing or reset).
pub fn delete_archive(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to delete archive {}", path.display()))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
