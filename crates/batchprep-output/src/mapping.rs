//! Encoding mapping table files.

use std::path::Path;

use batchprep_transform::{MappingEntry, MappingTable};

use crate::error::{OutputError, Result};
use crate::writer::ensure_parent_dir;

/// Header row of a mapping table file.
pub const MAPPING_HEADER: [&str; 3] = ["Column", "Original_Value", "Encoded_Value"];

/// Writes `table` as CSV. The header is written even for an empty table.
pub fn write_mapping_table(path: &Path, table: &MappingTable) -> Result<()> {
    ensure_parent_dir(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| OutputError::csv(path, &e))?;
    writer
        .write_record(MAPPING_HEADER)
        .map_err(|e| OutputError::csv(path, &e))?;
    for entry in table.entries() {
        writer
            .serialize(entry)
            .map_err(|e| OutputError::csv(path, &e))?;
    }
    writer.flush().map_err(|e| OutputError::io(path, e))?;
    tracing::info!(path = %path.display(), entries = table.len(), "Wrote encoding mapping table");
    Ok(())
}

/// Reads a mapping table written by [`write_mapping_table`] and checks that
/// every column's codes are contiguous and unique.
pub fn read_mapping_table(path: &Path) -> Result<MappingTable> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| OutputError::csv(path, &e))?;
    let header = reader.headers().map_err(|e| OutputError::csv(path, &e))?;
    if header.iter().ne(MAPPING_HEADER) {
        return Err(OutputError::InvalidMapping {
            path: path.to_path_buf(),
            reason: format!("unexpected header: {}", header.iter().collect::<Vec<_>>().join(",")),
        });
    }

    let mut entries = Vec::new();
    for record in reader.deserialize::<MappingEntry>() {
        let entry = record.map_err(|e| OutputError::InvalidMapping {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        entries.push(entry);
    }

    let table = MappingTable::from_entries(entries);
    table.to_maps().map_err(|e| OutputError::InvalidMapping {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(table)
}
