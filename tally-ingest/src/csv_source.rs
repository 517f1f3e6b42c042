//! Bank CSV exports as a stream of [`RawRow`]s.
//!
//! Headers come from the first record. Short records are padded with empty
//! cells, extra cells are dropped, and records that are entirely blank are
//! skipped.

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::mapping::ColumnMapping;
use crate::types::RawRow;

pub const UNREADABLE_CSV: &str = "Unable to read this CSV. Please check the format.";

pub struct CsvSource<R: Read> {
    reader: csv::Reader<R>,
    headers: Vec<String>,
}

impl CsvSource<File> {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("reading {}", path.display()))
    }
}

impl<R: Read> CsvSource<R> {
    pub fn from_reader(rdr: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(rdr);

        let record = reader.headers().context(UNREADABLE_CSV)?;
        if record.iter().all(|h| h.trim().is_empty()) {
            bail!(UNREADABLE_CSV);
        }
        let headers = record
            .iter()
            .enumerate()
            .map(|(i, h)| {
                if h.is_empty() {
                    format!("Column {}", i + 1)
                } else {
                    h.to_string()
                }
            })
            .collect();

        Ok(Self { reader, headers })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn guess_mapping(&self) -> ColumnMapping {
        ColumnMapping::guess(&self.headers)
    }

    /// All data rows; a file without any is unreadable.
    pub fn read_rows(self) -> Result<Vec<RawRow>> {
        let rows: Vec<RawRow> = self.into_rows().collect();
        if rows.is_empty() {
            bail!(UNREADABLE_CSV);
        }
        Ok(rows)
    }

    /// Lazily yield data rows keyed by header.
    pub fn into_rows(self) -> impl Iterator<Item = RawRow> {
        let Self { reader, headers } = self;
        reader
            .into_records()
            .enumerate()
            .filter_map(move |(i, result)| {
                let record = match result {
                    Ok(r) => r,
                    Err(err) => {
                        tracing::debug!(line = i + 2, error = %err, "skipping unreadable csv record");
                        return None;
                    }
                };
                if record.iter().all(str::is_empty) {
                    return None;
                }
                Some(
                    headers
                        .iter()
                        .enumerate()
                        .map(|(col, h)| (h.clone(), record.get(col).unwrap_or("").to_string()))
                        .collect(),
                )
            })
    }
}
