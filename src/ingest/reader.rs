//! Delimited file reading with single-byte decoding
//!
//! Fields are read as raw bytes and decoded afterwards, so a file with
//! invalid UTF-8 still loads: every byte maps to some character.

use std::fs::File;
use std::path::Path;
use encoding_rs::Encoding;
use crate::{Error, Result};

/// A fully decoded delimited file
#[derive(Debug, Clone, Default)]
pub struct DecodedCsv {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

pub fn read_file(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<DecodedCsv> {
    let file = File::open(path).map_err(|e| Error::NotFound(format!("{}: {}", path.display(), e)))?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(file);

    let header_record = reader.byte_headers()?.clone();
    if header_record.is_empty() {
        return Err(Error::EmptyInput(path.display().to_string()));
    }
    let headers = header_record
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            if idx == 0 {
                // A leading BOM overrides the configured encoding for the header.
                encoding.decode(field).0.into_owned()
            } else {
                decode(field, encoding)
            }
        })
        .collect();

    let mut records = Vec::new();
    let mut record = csv::ByteRecord::new();
    while reader.read_byte_record(&mut record)? {
        records.push(record.iter().map(|field| decode(field, encoding)).collect());
    }

    tracing::debug!("Read {} records from {}", records.len(), path.display());
    Ok(DecodedCsv { headers, records })
}

fn decode(bytes: &[u8], encoding: &'static Encoding) -> String {
    encoding.decode_without_bom_handling(bytes).0.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{UTF_8, WINDOWS_1252};

    #[test]
    fn test_read_with_quotes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "name,note\n\"Smith, J\",\"said \"\"hi\"\"\"\n").unwrap();

        let csv = read_file(&path, b',', UTF_8).unwrap();
        assert_eq!(csv.headers, vec!["name", "note"]);
        assert_eq!(csv.records, vec![vec!["Smith, J".to_string(), "said \"hi\"".to_string()]]);
    }

    #[test]
    fn test_invalid_utf8_is_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        std::fs::write(&path, b"city\nM\xfcnchen\n\xff\xfe\n").unwrap();

        let csv = read_file(&path, b',', WINDOWS_1252).unwrap();
        assert_eq!(csv.records[0][0], "München");
        assert_eq!(csv.records[1][0], "ÿþ");
    }

    #[test]
    fn test_missing_file() {
        let result = read_file(Path::new("/definitely/not/here.csv"), b',', UTF_8);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(read_file(&path, b',', UTF_8), Err(Error::EmptyInput(_))));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragged.csv");
        std::fs::write(&path, "a,b\n1,2\n3\n").unwrap();
        assert!(matches!(read_file(&path, b',', UTF_8), Err(Error::Csv(_))));
    }

    #[test]
    fn test_semicolon_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("semi.csv");
        std::fs::write(&path, "a;b\n1;2\n").unwrap();
        let csv = read_file(&path, b';', UTF_8).unwrap();
        assert_eq!(csv.headers, vec!["a", "b"]);
    }
}
