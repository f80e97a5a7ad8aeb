use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::analysis::cache::PowerCache;

/// Analysis parameters alongside the finalized cache, for offline inspection.
#[derive(Debug, Serialize)]
pub struct CacheReport<'a> {
    pub source: String,
    pub bpm: f64,
    pub window_size: usize,
    pub mode: &'static str,
    pub offset: i64,
    pub cache: &'a PowerCache,
}

pub fn write_report(report: &CacheReport<'_>, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize power cache")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    log::info!("Wrote {} windows to {}", report.cache.len(), path.display());
    Ok(())
}
