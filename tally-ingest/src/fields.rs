//! Field extraction from OCR inference results (receipts and statements).
//!
//! The OCR service returns a loosely typed JSON tree. A field can be a bare
//! scalar or an object carrying `value` and/or `raw`; both forms are read.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::mapping;
use crate::normalize::parse_amount;
use crate::types::RawRow;

const RECEIPT_MERCHANT_KEYS: [&str; 6] = [
    "merchant_name",
    "supplier_name",
    "supplier",
    "company",
    "store",
    "name",
];
const RECEIPT_AMOUNT_KEYS: [&str; 5] = [
    "total_amount",
    "total",
    "total_amount_incl",
    "total_amount_excl",
    "amount",
];
const RECEIPT_DATE_KEYS: [&str; 3] = ["date", "receipt_date", "invoice_date"];

const ROW_DATE_KEYS: [&str; 3] = ["date", "transaction_date", "posting_date"];
const ROW_MERCHANT_KEYS: [&str; 5] = ["description", "label", "payee", "merchant", "name"];
const ROW_AMOUNT_KEYS: [&str; 4] = ["amount", "debit", "credit", "value"];
const ROW_CATEGORY_KEYS: [&str; 3] = ["category", "transaction_type", "type"];

const LIST_KEYS: [&str; 4] = ["transactions", "line_items", "operations", "statement_lines"];

/// Fallback merchant for receipts that carry none.
pub const RECEIPT_MERCHANT: &str = "Receipt purchase";

/// Locate the field map inside an inference document.
pub fn prediction(doc: &Value) -> Option<&Map<String, Value>> {
    doc.pointer("/document/inference/prediction")
        .or_else(|| doc.pointer("/inference/result/fields"))
        .and_then(Value::as_object)
}

/// Read one field as text: scalar, else `value`, else `raw`.
pub fn read_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    let field = fields.get(key)?;
    let text = match field {
        Value::Object(obj) => obj
            .get("value")
            .and_then(scalar)
            .or_else(|| obj.get("raw").and_then(scalar)),
        other => scalar(other),
    }?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn scalar(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn first_field(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| read_field(fields, k))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiptFields {
    pub merchant: Option<String>,
    pub amount: Option<String>,
    pub date: Option<String>,
}

impl ReceiptFields {
    /// True when neither a merchant nor a total was recognized.
    pub fn is_empty(&self) -> bool {
        self.merchant.is_none() && self.amount.is_none()
    }

    /// Canonical row for the import pipeline, filling gaps with
    /// [`RECEIPT_MERCHANT`] and `fallback_date`.
    pub fn into_raw_row(self, fallback_date: NaiveDate) -> RawRow {
        let mut row = RawRow::new();
        row.insert(
            mapping::DATE.to_string(),
            self.date
                .unwrap_or_else(|| fallback_date.format("%Y-%m-%d").to_string()),
        );
        row.insert(mapping::AMOUNT.to_string(), self.amount.unwrap_or_default());
        row.insert(
            mapping::MERCHANT.to_string(),
            self.merchant.unwrap_or_else(|| RECEIPT_MERCHANT.to_string()),
        );
        row
    }
}

pub fn extract_receipt(doc: &Value) -> ReceiptFields {
    let Some(fields) = prediction(doc) else {
        return ReceiptFields::default();
    };
    ReceiptFields {
        merchant: first_field(fields, &RECEIPT_MERCHANT_KEYS),
        amount: RECEIPT_AMOUNT_KEYS
            .iter()
            .find_map(|k| read_field(fields, k).filter(|v| parse_amount(v).is_some())),
        date: first_field(fields, &RECEIPT_DATE_KEYS),
    }
}

fn statement_items(fields: &Map<String, Value>) -> Vec<&Map<String, Value>> {
    let list = fields
        .get("list_of_transactions")
        .and_then(|v| v.get("items"))
        .and_then(Value::as_array)
        .or_else(|| {
            LIST_KEYS
                .iter()
                .find_map(|k| fields.get(*k).and_then(Value::as_array))
        });

    list.map(|items| {
        items
            .iter()
            .filter_map(|item| item.get("fields").unwrap_or(item).as_object())
            .collect()
    })
    .unwrap_or_default()
}

/// Statement transactions as canonical rows; rows with no date, amount or
/// merchant at all are dropped here, the rest go to the normalizer.
pub fn extract_statement_rows(doc: &Value) -> Vec<RawRow> {
    let Some(fields) = prediction(doc) else {
        return Vec::new();
    };

    statement_items(fields)
        .into_iter()
        .filter_map(|item| {
            let date = first_field(item, &ROW_DATE_KEYS);
            let amount = first_field(item, &ROW_AMOUNT_KEYS);
            let merchant = first_field(item, &ROW_MERCHANT_KEYS);
            if date.is_none() && amount.is_none() && merchant.is_none() {
                return None;
            }
            let mut row = RawRow::new();
            row.insert(mapping::DATE.to_string(), date.unwrap_or_default());
            row.insert(mapping::AMOUNT.to_string(), amount.unwrap_or_default());
            row.insert(mapping::MERCHANT.to_string(), merchant.unwrap_or_default());
            if let Some(category) = first_field(item, &ROW_CATEGORY_KEYS) {
                row.insert(mapping::CATEGORY.to_string(), category);
            }
            Some(row)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::ColumnMapping;
    use crate::normalize::normalize_rows;
    use serde_json::json;

    #[test]
    fn test_read_field_shapes() {
        let doc = json!({
            "inference": { "result": { "fields": {
                "plain": "Kroger",
                "number": 12.5,
                "wrapped": { "value": "2026-01-02" },
                "raw_only": { "value": null, "raw": "  $3.10 " },
                "blank": { "value": "   " },
            }}}
        });
        let f = prediction(&doc).unwrap();
        assert_eq!(read_field(f, "plain").as_deref(), Some("Kroger"));
        assert_eq!(read_field(f, "number").as_deref(), Some("12.5"));
        assert_eq!(read_field(f, "wrapped").as_deref(), Some("2026-01-02"));
        assert_eq!(read_field(f, "raw_only").as_deref(), Some("$3.10"));
        assert_eq!(read_field(f, "blank"), None);
        assert_eq!(read_field(f, "missing"), None);
    }

    #[test]
    fn test_extract_receipt_with_fallbacks() {
        let doc = json!({
            "document": { "inference": { "prediction": {
                "supplier_name": { "value": "Whole Foods Market" },
                "total_amount": { "value": "n/a" },
                "total": { "value": 58.2 },
            }}}
        });
        let receipt = extract_receipt(&doc);
        assert!(!receipt.is_empty());
        assert_eq!(receipt.merchant.as_deref(), Some("Whole Foods Market"));

        let today = NaiveDate::from_ymd_opt(2026, 4, 9).unwrap();
        let row = receipt.into_raw_row(today);
        assert_eq!(row[mapping::DATE], "2026-04-09");
        assert_eq!(row[mapping::AMOUNT], "58.2");
    }

    #[test]
    fn test_extract_receipt_nothing_detected() {
        let doc = json!({ "inference": { "result": { "fields": { "date": "2026-01-01" }}}});
        assert!(extract_receipt(&doc).is_empty());
        assert!(extract_receipt(&json!({})).is_empty());

        let row = ReceiptFields {
            amount: Some("9".into()),
            ..Default::default()
        }
        .into_raw_row(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(row[mapping::MERCHANT], RECEIPT_MERCHANT);
    }

    #[test]
    fn test_statement_rows_from_list_of_transactions() {
        let doc = json!({
            "inference": { "result": { "fields": {
                "list_of_transactions": { "items": [
                    { "fields": {
                        "transaction_date": { "value": "2026-02-01" },
                        "description": { "value": "SAFEWAY 1234" },
                        "debit": { "value": 31.07 },
                        "transaction_type": { "value": "Groceries" },
                    }},
                    { "fields": { "date": "02/03/2026", "payee": "Lyft", "amount": "-12.00" }},
                    { "fields": {} },
                ]}
            }}}
        });
        let rows = extract_statement_rows(&doc);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][mapping::CATEGORY], "Groceries");
        assert!(!rows[1].contains_key(mapping::CATEGORY));

        let batch = normalize_rows(rows, ColumnMapping::canonical())
            .collect_batch()
            .unwrap();
        assert_eq!(batch.rows[1].amount, 12.0);
        assert_eq!(batch.rows[1].merchant, "Lyft");
    }

    #[test]
    fn test_statement_rows_from_alternate_list_keys() {
        let doc = json!({
            "document": { "inference": { "prediction": {
                "line_items": [
                    { "date": "2026-03-04", "label": "CVS", "value": 7.99 },
                ]
            }}}
        });
        let rows = extract_statement_rows(&doc);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][mapping::MERCHANT], "CVS");
        assert_eq!(rows[0][mapping::AMOUNT], "7.99");
    }
}
