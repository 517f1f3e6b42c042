use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use tally_core::{ErrorKind, PeriodKey};

/// One source row keyed by column header (CSV) or canonical field name (OCR).
pub type RawRow = HashMap<String, String>;

/// Normalized output of every import source (bank-agnostic).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRow {
    pub date: NaiveDate,
    /// Always positive; statements disagree on sign conventions.
    pub amount: f64,
    pub merchant: String,
    /// Category column of the source, if it had one.
    pub category: Option<String>,
}

impl NormalizedRow {
    pub fn period_key(&self) -> PeriodKey {
        PeriodKey::from_date(self.date)
    }
}

/// Why a single row was dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("missing {0}")]
    Missing(&'static str),

    #[error("could not parse date '{0}'")]
    BadDate(String),

    #[error("could not parse amount '{0}'")]
    BadAmount(String),
}

impl RowError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Parse
    }
}

/// Batch-level import failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("Please map the date, amount and merchant columns.")]
    UnmappedColumns,

    #[error("No valid rows found. Check your column mapping.")]
    NoValidRows,
}

impl ImportError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
