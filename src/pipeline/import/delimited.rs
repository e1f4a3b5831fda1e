//! Shared reader for delimited text, used by the CSV and LastPass parsers and
//! by column inference.

use super::source::RawFile;
use super::ImportError;

/// Tab when the header line has more tabs than commas, comma otherwise.
pub fn sniff_delimiter(first_line: &str) -> u8 {
    let tabs = first_line.matches('\t').count();
    let commas = first_line.matches(',').count();
    if tabs > commas {
        b'\t'
    } else {
        b','
    }
}

/// Read up to `limit` non-blank records. Quoted fields may contain the
/// delimiter, newlines and doubled quotes; rows may be ragged. Bytes that are
/// not UTF-8 are replaced, never rejected.
pub fn read_records(file: &RawFile, limit: Option<usize>) -> Result<Vec<Vec<String>>, ImportError> {
    let text = file.text_lossy();
    let first_line = text.lines().next().unwrap_or_default();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(sniff_delimiter(first_line))
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        if limit.is_some_and(|l| rows.len() >= l) {
            break;
        }
        let record = record
            .map_err(|e| ImportError::MalformedInput(format!("row {}: {e}", index + 1)))?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Cell at `index`, or `""` for ragged rows.
pub fn cell(row: &[String], index: Option<usize>) -> &str {
    index
        .and_then(|i| row.get(i))
        .map(String::as_str)
        .unwrap_or_default()
}
