//! Iteration-trace CSV export
//!
//! The grid supply CFE trace is the audit trail of a hourly-matching run:
//! column `iteration_k` holds the per-snapshot CFE vector the k-th LP was
//! constrained with, rows are snapshots.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use cfe_opt::GridCfeTrace;

/// Canonical trace file name for a target score, e.g. `cfe90.csv` for 0.9.
pub fn trace_file_name(cfe_score: f64) -> String {
    format!("cfe{}.csv", (cfe_score * 100.0).round() as i64)
}

/// Write the trace as CSV: a `snapshot` index column followed by one
/// `iteration_k` column per recorded iteration.
pub fn write_trace_csv(path: &Path, trace: &GridCfeTrace) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory '{}'", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating trace file '{}'", path.display()))?;

    let mut header = vec!["snapshot".to_string()];
    header.extend((1..=trace.len()).map(|k| format!("iteration_{}", k)));
    writer.write_record(&header).context("writing trace header")?;

    for t in 0..trace.num_snapshots() {
        let mut row = vec![t.to_string()];
        row.extend(
            trace
                .iterations()
                .iter()
                .map(|vector| vector.get(t).copied().unwrap_or(0.0).to_string()),
        );
        writer.write_record(&row).context("writing trace row")?;
    }
    writer.flush().context("flushing trace file")?;
    Ok(())
}
