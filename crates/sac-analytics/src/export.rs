//! Plain-text export of filtered call rows.
//!
//! The dump is tab-separated with a fixed header, so it opens in a
//! spreadsheet and can be read back with [`parse_export`]. Fields holding
//! tabs, quotes or line breaks are quoted, so every record survives intact.

use crate::aggregations::FilterSelection;
use chrono::Local;
use csv::{ReaderBuilder, WriterBuilder};
use sac_core::error::{Result, SacError};
use sac_core::types::CallRecord;
use std::path::{Path, PathBuf};

/// Column order of the dump; matches the field order of [`CallRecord`].
pub const EXPORT_COLUMNS: [&str; 4] = ["attendant", "sentiment", "duration", "transcript"];

/// Render records as a tab-separated text dump, one record per row.
pub fn export_text<'a>(records: impl IntoIterator<Item = &'a CallRecord>) -> Result<String> {
    // The header is written by hand so an empty export still carries it.
    let mut wtr = WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(EXPORT_COLUMNS)?;
    for record in records {
        wtr.serialize(record)?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| SacError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| SacError::Export(e.to_string()))
}

/// Read back a dump produced by [`export_text`].
pub fn parse_export(text: &str) -> Result<Vec<CallRecord>> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(text.as_bytes());

    if !rdr.headers()?.iter().eq(EXPORT_COLUMNS) {
        return Err(SacError::Export("missing export header".into()));
    }

    rdr.deserialize::<CallRecord>()
        .map(|row| row.map_err(SacError::from))
        .collect()
}

/// Write the dump as a side file under `dir` and return its path.
pub fn write_export(
    dir: &Path,
    selection: &FilterSelection,
    records: &[&CallRecord],
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(selection));
    std::fs::write(&path, export_text(records.iter().copied())?)?;
    tracing::info!("Exported {} rows to {}", records.len(), path.display());
    Ok(path)
}

/// `sac_export_<attendant>_<timestamp>.txt`
pub fn export_file_name(selection: &FilterSelection) -> String {
    format!(
        "sac_export_{}_{}.txt",
        slug(&selection.attendant),
        Local::now().format("%Y%m%d-%H%M%S")
    )
}

fn slug(value: &str) -> String {
    let slug: String = value
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "all".to_string()
    } else {
        slug
    }
}
