//! Split calculator: divide an expense total into per-member shares.
//!
//! One member (the payer) fronts the whole amount; the selected members owe
//! their part according to the [`SplitMode`]. The calculator is a pure
//! function: it either returns a complete, balanced share list or an error.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::SplitError;
use crate::member::MemberId;
use crate::money::{approx_eq, EPSILON};

/// How the total is divided among the selected members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SplitMode {
    /// `total / |members|` each.
    Equal,
    /// Caller gives an amount per member; amounts must sum to the total.
    ExactAmount,
    /// Caller gives a percentage per member; percentages must sum to 100.
    Percent,
    /// Caller gives share counts; each member owes `total * s / Σs`.
    Shares,
    /// Equal base plus a signed delta per member; deltas must sum to zero.
    Adjustment,
}

impl SplitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitMode::Equal => "equal",
            SplitMode::ExactAmount => "exact-amount",
            SplitMode::Percent => "percent",
            SplitMode::Shares => "shares",
            SplitMode::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for SplitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SplitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "equal" | "equally" => Ok(SplitMode::Equal),
            "exact" | "exact-amount" | "amount" => Ok(SplitMode::ExactAmount),
            "percent" | "percentage" | "%" => Ok(SplitMode::Percent),
            "shares" | "share" => Ok(SplitMode::Shares),
            "adjustment" | "adjust" => Ok(SplitMode::Adjustment),
            other => Err(format!("unknown split mode: {other}")),
        }
    }
}

/// One member's side of an expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantShare {
    #[serde(alias = "user_id")]
    pub member_id: MemberId,
    #[serde(default)]
    pub paid_amount: f64,
    #[serde(default)]
    pub owed_amount: f64,
}

impl ParticipantShare {
    pub fn new(member_id: impl Into<MemberId>, paid_amount: f64, owed_amount: f64) -> Self {
        Self {
            member_id: member_id.into(),
            paid_amount,
            owed_amount,
        }
    }

    /// A member who both paid and owes the full amount (solo expense).
    pub fn solo(member_id: impl Into<MemberId>, amount: f64) -> Self {
        Self::new(member_id, amount, amount)
    }
}

/// Per-member mode inputs (amounts, percentages, share counts or deltas).
/// Members without an entry contribute zero.
pub type ModeInputs = BTreeMap<MemberId, f64>;

/// Everything the calculator needs for one expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSpec {
    pub total: f64,
    pub payer: MemberId,
    pub members: BTreeSet<MemberId>,
    pub mode: SplitMode,
    #[serde(default)]
    pub inputs: ModeInputs,
}

impl SplitSpec {
    pub fn equal(
        total: f64,
        payer: impl Into<MemberId>,
        members: impl IntoIterator<Item = MemberId>,
    ) -> Self {
        Self {
            total,
            payer: payer.into(),
            members: members.into_iter().collect(),
            mode: SplitMode::Equal,
            inputs: ModeInputs::new(),
        }
    }

    pub fn with_mode(mut self, mode: SplitMode, inputs: ModeInputs) -> Self {
        self.mode = mode;
        self.inputs = inputs;
        self
    }

    pub fn compute(&self) -> Result<Vec<ParticipantShare>, SplitError> {
        compute_shares(self.total, &self.payer, &self.members, self.mode, &self.inputs)
    }
}

/// Compute every selected member's share of `total`.
///
/// Shares come back in member-id order. The payer's `paid_amount` is the
/// full total; everyone else paid nothing.
pub fn compute_shares(
    total: f64,
    payer: &MemberId,
    members: &BTreeSet<MemberId>,
    mode: SplitMode,
    inputs: &ModeInputs,
) -> Result<Vec<ParticipantShare>, SplitError> {
    if !total.is_finite() || total <= 0.0 {
        return Err(SplitError::NonPositiveTotal(total));
    }
    if members.is_empty() {
        return Err(SplitError::EmptySelection);
    }
    if !members.contains(payer) {
        return Err(SplitError::PayerNotSelected(payer.clone()));
    }
    if let Some(stray) = inputs.keys().find(|m| !members.contains(*m)) {
        return Err(SplitError::UnselectedInput(stray.clone()));
    }
    for (member, value) in inputs {
        let negative_allowed = mode == SplitMode::Adjustment;
        if !value.is_finite() || (!negative_allowed && *value < 0.0) {
            return Err(SplitError::InvalidInput {
                member: member.clone(),
                value: *value,
            });
        }
    }

    let input = |m: &MemberId| inputs.get(m).copied().unwrap_or(0.0);
    let count = members.len() as f64;

    let owed: Vec<(&MemberId, f64)> = match mode {
        SplitMode::Equal => {
            let each = total / count;
            members.iter().map(|m| (m, each)).collect()
        }
        SplitMode::ExactAmount => {
            let sum: f64 = members.iter().map(input).sum();
            if !approx_eq(sum, total) {
                return Err(SplitError::SplitMismatch(
                    "Exact amounts must add up to the total",
                ));
            }
            members.iter().map(|m| (m, input(m))).collect()
        }
        SplitMode::Percent => {
            let sum: f64 = members.iter().map(input).sum();
            if !approx_eq(sum, 100.0) {
                return Err(SplitError::SplitMismatch("Percentages must add up to 100%"));
            }
            // Scale by the actual sum so owed amounts add up to the total
            // even when the percentages are only within tolerance of 100.
            members
                .iter()
                .map(|m| (m, total * input(m) / sum))
                .collect()
        }
        SplitMode::Shares => {
            let sum: f64 = members.iter().map(input).sum();
            if sum <= 0.0 {
                return Err(SplitError::SplitMismatch("Add at least one share"));
            }
            members
                .iter()
                .map(|m| (m, total * input(m) / sum))
                .collect()
        }
        SplitMode::Adjustment => {
            let sum: f64 = members.iter().map(input).sum();
            if !approx_eq(sum, 0.0) {
                return Err(SplitError::SplitMismatch("Adjustments must balance to $0.00"));
            }
            let base = total / count;
            let mut out = Vec::with_capacity(members.len());
            for m in members {
                let owed = base + input(m);
                if owed < -EPSILON {
                    return Err(SplitError::NegativeOwed {
                        member: m.clone(),
                        owed,
                    });
                }
                out.push((m, owed.max(0.0)));
            }
            out
        }
    };

    Ok(owed
        .into_iter()
        .map(|(m, owed_amount)| ParticipantShare {
            member_id: m.clone(),
            paid_amount: if m == payer { total } else { 0.0 },
            owed_amount,
        })
        .collect())
}
