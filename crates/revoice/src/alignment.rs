//! Reader for the forced aligner's word-level output table.
//!
//! The aligner emits a CSV with a header row followed by
//! `begin,end,label,type[,...]` rows. Rows are kept in file order, which the
//! aligner guarantees to be chronological; nothing here re-sorts.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::Error;
use crate::Result;

/// One row of the aligner's output. `label` is a transcript word or a
/// silence marker (possibly empty); `kind` is the aligner's row type
/// (typically `words` or `phones`).
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentEntry {
    pub begin: f64,
    pub end: f64,
    pub label: String,
    pub kind: String,
}

/// Read an alignment table from disk.
pub fn read_alignment(path: impl AsRef<Path>) -> Result<Vec<AlignmentEntry>> {
    let file = File::open(path.as_ref()).map_err(|e| Error::io("open alignment file", e))?;
    parse_alignment(file)
}

/// Parse an alignment table from any reader. Extra trailing columns are
/// tolerated; fewer than four columns is an error.
pub fn parse_alignment(reader: impl Read) -> Result<Vec<AlignmentEntry>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut entries = Vec::new();
    for (idx, record) in csv_reader.records().enumerate() {
        // Header is row 0; data rows are 1-based after it.
        let line = idx + 2;
        let record = record.map_err(|e| Error::csv("read alignment row", e))?;
        if record.len() < 4 {
            return Err(Error::InvalidAlignment {
                line,
                message: format!("expected at least 4 columns, got {}", record.len()),
            });
        }
        let begin = parse_seconds(&record[0], line)?;
        let end = parse_seconds(&record[1], line)?;
        entries.push(AlignmentEntry {
            begin,
            end,
            label: record[2].to_string(),
            kind: record[3].to_string(),
        });
    }
    Ok(entries)
}

fn parse_seconds(field: &str, line: usize) -> Result<f64> {
    field.trim().parse::<f64>().map_err(|_| Error::InvalidAlignment {
        line,
        message: format!("not a timestamp: {field:?}"),
    })
}
