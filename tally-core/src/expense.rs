//! Committed expenses.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::member::MemberId;
use crate::period::PeriodKey;
use crate::split::ParticipantShare;

/// Who picked the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategorySource {
    /// A remembered merchant rule matched.
    Rule,
    /// Typed, overridden, or accepted by the user.
    User,
}

/// A confirmed expense and its shares. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    /// Draft this expense was promoted from.
    #[serde(default)]
    pub draft_id: Option<String>,
    pub group_id: String,
    pub amount: f64,
    #[serde(default)]
    pub merchant: Option<String>,
    pub date: NaiveDate,
    pub period_key: PeriodKey,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub category_source: Option<CategorySource>,
    /// Counts against the monthly budget (false = split-only).
    #[serde(default)]
    pub budget_impact: bool,
    pub shares: Vec<ParticipantShare>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Expense {
    pub fn paid_total(&self) -> f64 {
        self.shares.iter().map(|s| s.paid_amount).sum()
    }

    pub fn owed_total(&self) -> f64 {
        self.shares.iter().map(|s| s.owed_amount).sum()
    }

    pub fn share_for(&self, member: &MemberId) -> Option<&ParticipantShare> {
        self.shares.iter().find(|s| &s.member_id == member)
    }

    /// Merchant for display.
    pub fn title(&self) -> &str {
        self.merchant
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or("Untitled expense")
    }

    /// Category for reporting.
    pub fn category_or_default(&self) -> &str {
        self.category
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or("Uncategorized")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expense() -> Expense {
        Expense {
            id: "e-1".into(),
            draft_id: None,
            group_id: "g-1".into(),
            amount: 30.0,
            merchant: None,
            date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            period_key: PeriodKey::new(2026, 1).unwrap(),
            category: Some(" ".into()),
            category_source: None,
            budget_impact: true,
            shares: vec![
                ParticipantShare::new("a", 30.0, 15.0),
                ParticipantShare::new("b", 0.0, 15.0),
            ],
            notes: None,
        }
    }

    #[test]
    fn test_totals_and_lookup() {
        let e = expense();
        assert_eq!(e.paid_total(), 30.0);
        assert_eq!(e.owed_total(), 30.0);
        assert_eq!(e.share_for(&"b".into()).unwrap().owed_amount, 15.0);
        assert!(e.share_for(&"c".into()).is_none());
    }

    #[test]
    fn test_display_defaults() {
        let e = expense();
        assert_eq!(e.title(), "Untitled expense");
        assert_eq!(e.category_or_default(), "Uncategorized");
    }

    #[test]
    fn test_share_rows_accept_user_id_key() {
        let json = r#"{"user_id":"u-9","paid_amount":12.5,"owed_amount":0}"#;
        let share: ParticipantShare = serde_json::from_str(json).unwrap();
        assert_eq!(share.member_id.as_str(), "u-9");
        assert_eq!(share.paid_amount, 12.5);
    }
}
