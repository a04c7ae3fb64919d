//! CSV header parsing and normalization.

use std::fs::File;
use std::path::Path;

use crate::error::{IngestError, Result};

/// Normalizes a header value by trimming whitespace.
pub fn normalize_header(value: &str) -> String {
    value.trim().to_string()
}

/// Decodes a header record as written, stripping only a leading UTF-8 BOM.
pub(crate) fn decode_header_record(record: &csv::ByteRecord) -> Vec<String> {
    record
        .iter()
        .enumerate()
        .map(|(position, field)| {
            let text = String::from_utf8_lossy(field);
            if position == 0 {
                text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
            } else {
                text.into_owned()
            }
        })
        .collect()
}

/// Decodes and normalizes a header record, stripping a leading UTF-8 BOM.
pub(crate) fn normalize_header_record(record: &csv::ByteRecord) -> Vec<String> {
    decode_header_record(record)
        .iter()
        .map(String::as_str)
        .map(normalize_header)
        .collect()
}

/// Reads only the header row of a CSV file.
pub fn read_csv_header(path: &Path) -> Result<Vec<String>> {
    Ok(read_raw_csv_header(path)?
        .iter()
        .map(String::as_str)
        .map(normalize_header)
        .collect())
}

/// Reads the header row without trimming names.
pub(crate) fn read_raw_csv_header(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|e| IngestError::from_open(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);
    let header = reader
        .byte_headers()
        .map_err(|e| IngestError::from_csv(path, e))?;
    let columns = decode_header_record(header);
    if columns.iter().all(|c| c.trim().is_empty()) {
        return Err(IngestError::MissingHeader {
            path: path.to_path_buf(),
        });
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("  hello  "), "hello");
        assert_eq!(normalize_header("hello"), "hello");
    }

    #[test]
    fn test_read_csv_header_strips_bom_and_whitespace() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "\u{feff}disasterNumber , declarationType\n1,DR\n").unwrap();
        let columns = read_csv_header(file.path()).unwrap();
        assert_eq!(columns, vec!["disasterNumber", "declarationType"]);
    }

    #[test]
    fn test_read_raw_csv_header_keeps_whitespace() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "\u{feff}k, v\n1,a\n").unwrap();
        let columns = read_raw_csv_header(file.path()).unwrap();
        assert_eq!(columns, vec!["k", " v"]);
    }

    #[test]
    fn test_read_csv_header_quoted() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "\"a, b\",c\n").unwrap();
        let columns = read_csv_header(file.path()).unwrap();
        assert_eq!(columns, vec!["a, b", "c"]);
    }

    #[test]
    fn test_read_csv_header_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let result = read_csv_header(file.path());
        assert!(matches!(result, Err(IngestError::MissingHeader { .. })));
    }
}
