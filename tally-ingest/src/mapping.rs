//! Which source column feeds which field.

use serde::{Deserialize, Serialize};

use crate::types::ImportError;

/// Canonical headers used for OCR output and receipt rows.
pub const DATE: &str = "Date";
pub const AMOUNT: &str = "Amount";
pub const MERCHANT: &str = "Merchant";
pub const CATEGORY: &str = "Category";

/// Header name per logical field. `None` means not mapped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub date: Option<String>,
    pub amount: Option<String>,
    pub merchant: Option<String>,
    pub category: Option<String>,
}

impl ColumnMapping {
    /// Mapping for rows built from [`DATE`], [`AMOUNT`], [`MERCHANT`], [`CATEGORY`].
    pub fn canonical() -> Self {
        Self {
            date: Some(DATE.to_string()),
            amount: Some(AMOUNT.to_string()),
            merchant: Some(MERCHANT.to_string()),
            category: Some(CATEGORY.to_string()),
        }
    }

    /// Guess the mapping from header names; first matching header wins per field.
    pub fn guess(headers: &[String]) -> Self {
        Self {
            date: guess_column(headers, &["date", "posted", "transaction"]),
            amount: guess_column(headers, &["amount", "debit", "credit", "value"]),
            merchant: guess_column(headers, &["merchant", "description", "payee", "name"]),
            category: guess_column(headers, &["category", "type"]),
        }
    }

    pub fn with_date(mut self, header: impl Into<String>) -> Self {
        self.date = Some(header.into());
        self
    }

    pub fn with_amount(mut self, header: impl Into<String>) -> Self {
        self.amount = Some(header.into());
        self
    }

    pub fn with_merchant(mut self, header: impl Into<String>) -> Self {
        self.merchant = Some(header.into());
        self
    }

    pub fn with_category(mut self, header: impl Into<String>) -> Self {
        self.category = Some(header.into());
        self
    }

    pub fn validate(&self) -> Result<(), ImportError> {
        if self.date.is_none() || self.amount.is_none() || self.merchant.is_none() {
            return Err(ImportError::UnmappedColumns);
        }
        Ok(())
    }
}

fn guess_column(headers: &[String], needles: &[&str]) -> Option<String> {
    headers
        .iter()
        .find(|h| {
            let h = h.to_lowercase();
            needles.iter().any(|n| h.contains(n))
        })
        .cloned()
}
