//! tally-ingest: bank CSV, OCR and voice input normalized into one row shape.

pub mod csv_source;
pub mod fields;
pub mod mapping;
pub mod normalize;
pub mod types;
pub mod voice;

pub use csv_source::CsvSource;
pub use fields::{extract_receipt, extract_statement_rows, ReceiptFields};
pub use mapping::ColumnMapping;
pub use normalize::{normalize_row, normalize_rows, parse_amount, parse_date, ImportBatch, NormalizedRows};
pub use types::{ImportError, NormalizedRow, RawRow, RowError};
pub use voice::{parse_voice_text, VoiceDraft};
