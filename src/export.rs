// CSV export of a project's file listing. The columns are the fields of
// the first record (minus the nested `metadata` map), in the order the
// platform sent them; later records missing a column get an empty cell.

use crate::api::PlatformClient;
use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

const METADATA_FIELD: &str = "metadata";

/// Header row for a listing.
pub fn columns(rows: &[Map<String, Value>]) -> Vec<String> {
    rows.first()
        .map(|first| {
            first
                .keys()
                .filter(|k| k.as_str() != METADATA_FIELD)
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Write `rows` as CSV. Returns the number of data rows written.
pub fn write_csv<W: Write>(rows: &[Map<String, Value>], out: W) -> Result<usize> {
    let columns = columns(rows);
    let mut writer = csv::Writer::from_writer(out);
    let to_err = |e: csv::Error| Error::Transfer(format!("writing CSV: {}", e));

    if !columns.is_empty() {
        writer.write_record(&columns).map_err(to_err)?;
        for row in rows {
            writer
                .write_record(columns.iter().map(|c| cell(row.get(c))))
                .map_err(to_err)?;
        }
    }
    writer
        .flush()
        .map_err(|e| Error::Transfer(format!("writing CSV: {}", e)))?;
    Ok(if columns.is_empty() { 0 } else { rows.len() })
}

/// Fetch a project's listing and write it to `path`, creating parent
/// directories as needed.
pub fn export_project(client: &PlatformClient, project_id: i64, path: &Path) -> Result<usize> {
    let rows = client.list_file_rows(project_id)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Transfer(format!("creating {}: {}", parent.display(), e)))?;
        }
    }
    let file = File::create(path)
        .map_err(|e| Error::Transfer(format!("creating {}: {}", path.display(), e)))?;
    let written = write_csv(&rows, file)?;
    tracing::info!(project_id, rows = written, path = %path.display(), "Exported metadata");
    Ok(written)
}
