//! CSV artifact writers.
//!
//! Both tables carry a leading `day`/`point` index column so downstream
//! readers that treat the first column as an index keep working.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Writes a table of equal-length day series, one named column each, with a
/// leading `day` index column.
pub fn write_curve_table(path: &Path, columns: &[(String, Vec<f64>)]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let days = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
    debug!(path = %path.display(), columns = columns.len(), days, "writing curve table");

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    let mut header = vec!["day".to_string()];
    header.extend(columns.iter().map(|(name, _)| name.clone()));
    writer.write_record(&header)?;

    for day in 0..days {
        let mut row = vec![day.to_string()];
        row.extend(columns.iter().map(|(_, curve)| curve[day].to_string()));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes serde-serializable rows with a header, one record per row.
pub fn write_rows<S: Serialize>(path: &Path, rows: &[S]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    debug!(path = %path.display(), rows = rows.len(), "writing row table");

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
