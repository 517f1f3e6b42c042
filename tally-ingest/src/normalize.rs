//! Turn raw rows into [`NormalizedRow`]s.
//!
//! Bad rows are skipped, never fatal: a batch only fails when nothing in it
//! could be read.

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

use crate::mapping::ColumnMapping;
use crate::types::{ImportError, NormalizedRow, RawRow, RowError};

const ISO_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
const TEXT_FORMATS: [&str; 4] = ["%b %d, %Y", "%B %d, %Y", "%d %b %Y", "%d %B %Y"];

/// Parse a statement date.
///
/// ISO dates (optionally with a time part) are tried first, then spelled-out
/// months, then numeric `a/b/c` or `a-b-c`: when `a > 12` it is the day,
/// otherwise the month. Two-digit years land in 2000-2099.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if starts_with_year(s) {
        for fmt in ISO_FORMATS {
            if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
                return Some(d);
            }
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.date_naive());
        }
        if let Some((day, _time)) = s.split_once('T') {
            if let Ok(d) = NaiveDate::parse_from_str(day, "%Y-%m-%d") {
                return Some(d);
            }
        }
    }
    for fmt in TEXT_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    let parts: Vec<&str> = s.split(['/', '-']).map(str::trim).collect();
    if parts.len() != 3 {
        return None;
    }
    let a: u32 = parts[0].parse().ok()?;
    let b: u32 = parts[1].parse().ok()?;
    let c: i32 = parts[2].parse().ok()?;
    let year = if c < 100 { 2000 + c } else { c };
    let (month, day) = if a > 12 { (b, a) } else { (a, b) };
    NaiveDate::from_ymd_opt(year, month, day)
}

// `YYYY-` or `YYYY/`; keeps `3-4-26` away from the ISO formats.
fn starts_with_year(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 5 && b[..4].iter().all(u8::is_ascii_digit) && matches!(b[4], b'-' | b'/')
}

fn leading_number() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?(\d+\.?\d*|\.\d+)").expect("amount regex"))
}

/// Parse an amount: drop everything but digits, `.` and `-`, read the
/// leading number, return its absolute value.
///
/// `"$1,234.50"`, `"-45.00"` and `"(12.00)"` all parse; `"n/a"` does not.
pub fn parse_amount(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    let m = leading_number().find(&cleaned)?;
    let value: f64 = m.as_str().parse().ok()?;
    value.is_finite().then_some(value.abs())
}

fn field<'a>(raw: &'a RawRow, column: Option<&String>) -> Option<&'a str> {
    column
        .and_then(|c| raw.get(c))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Normalize one row. Pure: the same input always yields the same output.
pub fn normalize_row(raw: &RawRow, mapping: &ColumnMapping) -> Result<NormalizedRow, RowError> {
    let date_str = field(raw, mapping.date.as_ref()).ok_or(RowError::Missing("date"))?;
    let date = parse_date(date_str).ok_or_else(|| RowError::BadDate(date_str.to_string()))?;

    let amount_str = field(raw, mapping.amount.as_ref()).ok_or(RowError::Missing("amount"))?;
    let amount = parse_amount(amount_str)
        .filter(|a| *a > 0.0)
        .ok_or_else(|| RowError::BadAmount(amount_str.to_string()))?;

    let merchant = field(raw, mapping.merchant.as_ref()).ok_or(RowError::Missing("merchant"))?;
    let category = field(raw, mapping.category.as_ref()).map(str::to_string);

    Ok(NormalizedRow {
        date,
        amount,
        merchant: merchant.to_string(),
        category,
    })
}

/// Lazy, single-pass normalization over a row source.
///
/// Unreadable rows are logged and counted, then skipped.
pub struct NormalizedRows<I> {
    rows: I,
    mapping: ColumnMapping,
    seen: usize,
    skipped: usize,
}

impl<I> NormalizedRows<I>
where
    I: Iterator<Item = RawRow>,
{
    pub fn new(rows: I, mapping: ColumnMapping) -> Self {
        Self {
            rows,
            mapping,
            seen: 0,
            skipped: 0,
        }
    }

    /// Rows dropped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Drain the source. Succeeds if at least one row was usable.
    pub fn collect_batch(mut self) -> Result<ImportBatch, ImportError> {
        self.mapping.validate()?;
        let rows: Vec<NormalizedRow> = self.by_ref().collect();
        if rows.is_empty() {
            return Err(ImportError::NoValidRows);
        }
        Ok(ImportBatch {
            rows,
            skipped: self.skipped,
        })
    }
}

impl<I> Iterator for NormalizedRows<I>
where
    I: Iterator<Item = RawRow>,
{
    type Item = NormalizedRow;

    fn next(&mut self) -> Option<NormalizedRow> {
        for raw in self.rows.by_ref() {
            self.seen += 1;
            match normalize_row(&raw, &self.mapping) {
                Ok(row) => return Some(row),
                Err(err) => {
                    self.skipped += 1;
                    tracing::debug!(row = self.seen, error = %err, "skipping import row");
                }
            }
        }
        None
    }
}

/// Rows that made it through, plus how many did not.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportBatch {
    pub rows: Vec<NormalizedRow>,
    pub skipped: usize,
}

/// Normalize a row source with `mapping`.
pub fn normalize_rows<I>(rows: I, mapping: ColumnMapping) -> NormalizedRows<I::IntoIter>
where
    I: IntoIterator<Item = RawRow>,
{
    NormalizedRows::new(rows.into_iter(), mapping)
}
