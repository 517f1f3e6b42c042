//! Expense drafts and their lifecycle.
//!
//! ```text
//! draft ──confirm──▶ confirmed   (creates an Expense)
//!   │
//!   └───cancel────▶ cancelled
//! ```
//!
//! Both end states are terminal. Only a draft in `draft` state can be edited.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::DraftError;
use crate::expense::{CategorySource, Expense};
use crate::member::MemberId;
use crate::money::approx_eq;
use crate::period::PeriodKey;
use crate::split::ParticipantShare;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
    Draft,
    Confirmed,
    Cancelled,
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DraftStatus::Draft => "draft",
            DraftStatus::Confirmed => "confirmed",
            DraftStatus::Cancelled => "cancelled",
        })
    }
}

/// Where a draft came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftSource {
    Manual,
    Voice,
    Import,
    Receipt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: String,
    pub group_id: String,
    pub created_by: MemberId,
    pub amount: f64,
    #[serde(default)]
    pub merchant: Option<String>,
    pub date: NaiveDate,
    pub period_key: PeriodKey,
    #[serde(default)]
    pub budget_impact: bool,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub category_source: Option<CategorySource>,
    pub participants: Vec<ParticipantShare>,
    pub source: DraftSource,
    pub status: DraftStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub receipt_url: Option<String>,
}

/// Check that a share list is a valid split of `amount`.
///
/// Members must be unique, amounts non-negative, and both the paid and the
/// owed column must add up to `amount` within the epsilon.
pub fn validate_shares(amount: f64, shares: &[ParticipantShare]) -> Result<(), DraftError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(DraftError::Invalid("Please enter a valid amount"));
    }
    if shares.is_empty() {
        return Err(DraftError::Invalid("Add at least one participant"));
    }

    let mut seen = HashSet::new();
    for s in shares {
        if !seen.insert(&s.member_id) {
            return Err(DraftError::DuplicateParticipant(s.member_id.clone()));
        }
        let finite = s.paid_amount.is_finite() && s.owed_amount.is_finite();
        if !finite || s.paid_amount < 0.0 || s.owed_amount < 0.0 {
            return Err(DraftError::NegativeAmount {
                member: s.member_id.clone(),
            });
        }
    }

    let paid: f64 = shares.iter().map(|s| s.paid_amount).sum();
    if !approx_eq(paid, amount) {
        return Err(DraftError::Invalid("Paid total must equal the expense amount."));
    }
    let owed: f64 = shares.iter().map(|s| s.owed_amount).sum();
    if !approx_eq(owed, amount) {
        return Err(DraftError::Invalid("Owed total must equal the expense amount."));
    }
    Ok(())
}

impl Draft {
    /// Create a draft after validating the split.
    pub fn new(
        id: impl Into<String>,
        group_id: impl Into<String>,
        created_by: impl Into<MemberId>,
        amount: f64,
        date: NaiveDate,
        participants: Vec<ParticipantShare>,
    ) -> Result<Self, DraftError> {
        validate_shares(amount, &participants)?;
        Ok(Self {
            id: id.into(),
            group_id: group_id.into(),
            created_by: created_by.into(),
            amount,
            merchant: None,
            date,
            period_key: PeriodKey::from_date(date),
            budget_impact: false,
            category: None,
            category_source: None,
            participants,
            source: DraftSource::Manual,
            status: DraftStatus::Draft,
            notes: None,
            receipt_url: None,
        })
    }

    pub fn with_merchant(mut self, merchant: impl Into<String>) -> Self {
        let merchant = merchant.into();
        self.merchant = if merchant.trim().is_empty() {
            None
        } else {
            Some(merchant)
        };
        self
    }

    pub fn with_category(mut self, category: impl Into<String>, source: CategorySource) -> Self {
        self.category = Some(category.into());
        self.category_source = Some(source);
        self
    }

    pub fn with_budget_impact(mut self, budget_impact: bool) -> Self {
        self.budget_impact = budget_impact;
        self
    }

    pub fn with_source(mut self, source: DraftSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_receipt_url(mut self, url: impl Into<String>) -> Self {
        self.receipt_url = Some(url.into());
        self
    }

    pub fn is_open(&self) -> bool {
        self.status == DraftStatus::Draft
    }

    fn ensure_editable(&self) -> Result<(), DraftError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(DraftError::NotEditable {
                id: self.id.clone(),
                status: self.status,
            })
        }
    }

    /// Manual category edit; the source becomes `user`.
    pub fn set_category(&mut self, category: Option<String>) -> Result<(), DraftError> {
        self.ensure_editable()?;
        self.category_source = category.as_ref().map(|_| CategorySource::User);
        self.category = category;
        Ok(())
    }

    pub fn set_notes(&mut self, notes: Option<String>) -> Result<(), DraftError> {
        self.ensure_editable()?;
        self.notes = notes;
        Ok(())
    }

    /// Change the amount together with a fresh split. Nothing changes on error.
    pub fn resplit(
        &mut self,
        amount: f64,
        participants: Vec<ParticipantShare>,
    ) -> Result<(), DraftError> {
        self.ensure_editable()?;
        validate_shares(amount, &participants)?;
        self.amount = amount;
        self.participants = participants;
        Ok(())
    }

    fn transition(&mut self, to: DraftStatus) -> Result<(), DraftError> {
        match (self.status, to) {
            (DraftStatus::Draft, DraftStatus::Confirmed | DraftStatus::Cancelled) => {
                self.status = to;
                Ok(())
            }
            (from, to) => Err(DraftError::InvalidTransition {
                id: self.id.clone(),
                from,
                to,
            }),
        }
    }

    /// Promote to a committed expense. The split is re-validated first, so a
    /// failed confirm leaves the draft open.
    pub fn confirm(&mut self) -> Result<Expense, DraftError> {
        if self.is_open() {
            validate_shares(self.amount, &self.participants)?;
        }
        self.transition(DraftStatus::Confirmed)?;
        Ok(Expense {
            id: format!("exp-{}", self.id),
            draft_id: Some(self.id.clone()),
            group_id: self.group_id.clone(),
            amount: self.amount,
            merchant: self.merchant.clone(),
            date: self.date,
            period_key: self.period_key,
            category: self.category.clone(),
            category_source: self.category_source,
            budget_impact: self.budget_impact,
            shares: self.participants.clone(),
            notes: self.notes.clone(),
        })
    }

    pub fn cancel(&mut self) -> Result<(), DraftError> {
        self.transition(DraftStatus::Cancelled)
    }
}

/// Result of [`confirm_all`].
#[derive(Debug, Clone, PartialEq)]
pub struct BulkConfirmOutcome {
    pub confirmed: Vec<Expense>,
    /// First failing draft and why; drafts after it were not attempted.
    pub failure: Option<(String, DraftError)>,
    pub untouched: usize,
}

impl BulkConfirmOutcome {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Confirm open drafts one by one, stopping at the first failure.
///
/// There is no rollback: drafts confirmed before the failure stay confirmed.
/// Drafts that are not open are skipped.
pub fn confirm_all(drafts: &mut [Draft]) -> BulkConfirmOutcome {
    let mut confirmed = Vec::new();
    let open: Vec<usize> = (0..drafts.len()).filter(|&i| drafts[i].is_open()).collect();

    for (n, &i) in open.iter().enumerate() {
        match drafts[i].confirm() {
            Ok(expense) => confirmed.push(expense),
            Err(err) => {
                tracing::warn!(draft = %drafts[i].id, error = %err, "bulk confirm stopped");
                return BulkConfirmOutcome {
                    confirmed,
                    failure: Some((drafts[i].id.clone(), err)),
                    untouched: open.len() - n - 1,
                };
            }
        }
    }

    BulkConfirmOutcome {
        confirmed,
        failure: None,
        untouched: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 14).unwrap()
    }

    fn split_draft(id: &str) -> Draft {
        Draft::new(
            id,
            "g-1",
            "a",
            60.0,
            date(),
            vec![
                ParticipantShare::new("a", 60.0, 30.0),
                ParticipantShare::new("b", 0.0, 30.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_new_derives_period_key() {
        let d = split_draft("d-1");
        assert_eq!(d.period_key.to_string(), "2026-02");
        assert_eq!(d.status, DraftStatus::Draft);
        assert_eq!(d.source, DraftSource::Manual);
    }

    #[test]
    fn test_new_rejects_unbalanced_split() {
        let err = Draft::new(
            "d-1",
            "g-1",
            "a",
            60.0,
            date(),
            vec![ParticipantShare::new("a", 50.0, 60.0)],
        )
        .unwrap_err();
        assert_eq!(err, DraftError::Invalid("Paid total must equal the expense amount."));

        let err = Draft::new(
            "d-1",
            "g-1",
            "a",
            60.0,
            date(),
            vec![ParticipantShare::new("a", 60.0, 59.0)],
        )
        .unwrap_err();
        assert_eq!(err, DraftError::Invalid("Owed total must equal the expense amount."));
    }

    #[test]
    fn test_duplicate_participant_rejected() {
        let err = validate_shares(
            10.0,
            &[
                ParticipantShare::new("a", 10.0, 5.0),
                ParticipantShare::new("a", 0.0, 5.0),
            ],
        )
        .unwrap_err();
        assert_eq!(err, DraftError::DuplicateParticipant("a".into()));
    }

    #[test]
    fn test_confirm_creates_expense() {
        let mut d = split_draft("d-1")
            .with_merchant("Trader Joe's")
            .with_category("Groceries", CategorySource::Rule)
            .with_budget_impact(true);
        let expense = d.confirm().unwrap();

        assert_eq!(d.status, DraftStatus::Confirmed);
        assert_eq!(expense.draft_id.as_deref(), Some("d-1"));
        assert_eq!(expense.shares, d.participants);
        assert_eq!(expense.category_source, Some(CategorySource::Rule));
        assert!(expense.budget_impact);
    }

    #[test]
    fn test_cancelled_draft_cannot_confirm() {
        let mut d = split_draft("d-1");
        d.cancel().unwrap();
        let err = d.confirm().unwrap_err();
        assert_eq!(
            err,
            DraftError::InvalidTransition {
                id: "d-1".into(),
                from: DraftStatus::Cancelled,
                to: DraftStatus::Confirmed,
            }
        );
        assert_eq!(d.status, DraftStatus::Cancelled);
    }

    #[test]
    fn test_confirmed_draft_cannot_cancel() {
        let mut d = split_draft("d-1");
        d.confirm().unwrap();
        assert!(d.cancel().unwrap_err().is_transition());
        assert!(d.confirm().is_err(), "confirming twice must fail");
        assert_eq!(d.status, DraftStatus::Confirmed);
    }

    #[test]
    fn test_edits_only_while_open() {
        let mut d = split_draft("d-1");
        d.set_category(Some("Dining".into())).unwrap();
        assert_eq!(d.category_source, Some(CategorySource::User));
        d.set_notes(Some("team lunch".into())).unwrap();
        d.resplit(
            80.0,
            vec![
                ParticipantShare::new("a", 80.0, 40.0),
                ParticipantShare::new("b", 0.0, 40.0),
            ],
        )
        .unwrap();
        assert_eq!(d.amount, 80.0);

        d.confirm().unwrap();
        let err = d.set_notes(None).unwrap_err();
        assert!(matches!(err, DraftError::NotEditable { status: DraftStatus::Confirmed, .. }));
    }

    #[test]
    fn test_failed_resplit_leaves_draft_unchanged() {
        let mut d = split_draft("d-1");
        let before = d.clone();
        assert!(d.resplit(80.0, vec![ParticipantShare::new("a", 80.0, 10.0)]).is_err());
        assert_eq!(d, before);
    }

    #[test]
    fn test_confirm_all_stops_at_first_failure() {
        let mut bad = split_draft("d-2");
        // Corrupted after creation, e.g. edited in storage.
        bad.participants[1].owed_amount = 1.0;

        let mut drafts = vec![split_draft("d-1"), bad, split_draft("d-3")];
        let outcome = confirm_all(&mut drafts);

        assert_eq!(outcome.confirmed.len(), 1);
        assert_eq!(outcome.failure.as_ref().map(|(id, _)| id.as_str()), Some("d-2"));
        assert_eq!(outcome.untouched, 1);
        assert_eq!(drafts[0].status, DraftStatus::Confirmed);
        assert_eq!(drafts[1].status, DraftStatus::Draft);
        assert_eq!(drafts[2].status, DraftStatus::Draft);
    }

    #[test]
    fn test_confirm_all_skips_closed_drafts() {
        let mut cancelled = split_draft("d-1");
        cancelled.cancel().unwrap();
        let mut drafts = vec![cancelled, split_draft("d-2")];

        let outcome = confirm_all(&mut drafts);
        assert!(outcome.is_complete());
        assert_eq!(outcome.confirmed.len(), 1);
        assert_eq!(drafts[0].status, DraftStatus::Cancelled);
    }
}
