//! Per-member balances for a period.
//!
//! `net = paid - owed`. Positive means the group owes the member money,
//! negative means the member owes the group. Because every expense's shares
//! balance on their own, the nets of a group always sum to zero.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::draft::Draft;
use crate::expense::Expense;
use crate::member::{Member, MemberId};
use crate::money::is_settled;
use crate::split::ParticipantShare;

/// Running totals for one member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub paid_total: f64,
    pub owed_total: f64,
}

impl Balance {
    pub fn net_balance(&self) -> f64 {
        self.paid_total - self.owed_total
    }

    pub fn is_settled(&self) -> bool {
        is_settled(self.net_balance())
    }
}

/// Streams shares into per-member totals.
#[derive(Debug, Clone, Default)]
pub struct BalanceAggregator {
    totals: BTreeMap<MemberId, Balance>,
    known_only: bool,
}

impl BalanceAggregator {
    /// Every known member starts at zero so inactive members still show up.
    pub fn new<'a>(members: impl IntoIterator<Item = &'a MemberId>) -> Self {
        Self {
            totals: members
                .into_iter()
                .map(|m| (m.clone(), Balance::default()))
                .collect(),
            known_only: false,
        }
    }

    /// Drop shares of members that were not passed to [`BalanceAggregator::new`].
    pub fn known_members_only(mut self) -> Self {
        self.known_only = true;
        self
    }

    pub fn add_share(&mut self, share: &ParticipantShare) {
        let entry = if self.known_only {
            match self.totals.get_mut(&share.member_id) {
                Some(entry) => entry,
                None => {
                    tracing::debug!(member = %share.member_id, "ignoring share of non-member");
                    return;
                }
            }
        } else {
            self.totals.entry(share.member_id.clone()).or_default()
        };
        entry.paid_total += share.paid_amount;
        entry.owed_total += share.owed_amount;
    }

    pub fn add_expense(&mut self, expense: &Expense) {
        for share in &expense.shares {
            self.add_share(share);
        }
    }

    pub fn finish(self) -> BTreeMap<MemberId, Balance> {
        self.totals
    }
}

/// Aggregate `shares` into balances for `members` (plus any other member
/// that shows up in the shares).
pub fn compute_balances<'a>(
    shares: impl IntoIterator<Item = &'a ParticipantShare>,
    members: &BTreeSet<MemberId>,
) -> BTreeMap<MemberId, Balance> {
    let mut agg = BalanceAggregator::new(members);
    for share in shares {
        agg.add_share(share);
    }
    agg.finish()
}

/// A balance row as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberBalance {
    #[serde(alias = "user_id")]
    pub member_id: MemberId,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub paid_total: f64,
    #[serde(default)]
    pub owed_total: f64,
    pub net_balance: f64,
}

/// Attach display names to aggregated balances, in membership order first.
pub fn member_balances(
    balances: &BTreeMap<MemberId, Balance>,
    members: &[Member],
) -> Vec<MemberBalance> {
    let mut rows = Vec::with_capacity(balances.len());
    let mut listed = HashSet::new();

    for m in members {
        let b = balances.get(&m.member_id).copied().unwrap_or_default();
        listed.insert(&m.member_id);
        rows.push(MemberBalance {
            member_id: m.member_id.clone(),
            display_name: m.display_name.clone(),
            paid_total: b.paid_total,
            owed_total: b.owed_total,
            net_balance: b.net_balance(),
        });
    }
    for (id, b) in balances {
        if !listed.contains(id) {
            rows.push(MemberBalance {
                member_id: id.clone(),
                display_name: None,
                paid_total: b.paid_total,
                owed_total: b.owed_total,
                net_balance: b.net_balance(),
            });
        }
    }
    rows
}

/// Balances straight from a set of committed expenses.
pub fn expense_balances(expenses: &[Expense], members: &[Member]) -> Vec<MemberBalance> {
    let ids: BTreeSet<MemberId> = members.iter().map(|m| m.member_id.clone()).collect();
    let mut agg = BalanceAggregator::new(&ids);
    for e in expenses {
        agg.add_expense(e);
    }
    member_balances(&agg.finish(), members)
}

/// Balances rebuilt from the participants of the drafts that produced
/// `expenses`. Only group members are counted.
pub fn fallback_balances(
    expenses: &[Expense],
    drafts: &[Draft],
    members: &[Member],
) -> Vec<MemberBalance> {
    let draft_ids: HashSet<&str> = expenses
        .iter()
        .filter_map(|e| e.draft_id.as_deref())
        .collect();
    if draft_ids.is_empty() || members.is_empty() {
        return Vec::new();
    }

    let ids: BTreeSet<MemberId> = members.iter().map(|m| m.member_id.clone()).collect();
    let mut agg = BalanceAggregator::new(&ids).known_members_only();
    for draft in drafts.iter().filter(|d| draft_ids.contains(d.id.as_str())) {
        for share in &draft.participants {
            agg.add_share(share);
        }
    }
    member_balances(&agg.finish(), members)
}

/// Which source the reconciled balances came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceSource {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub balances: Vec<MemberBalance>,
    pub source: BalanceSource,
}

/// True when every row is settled. An empty slice is not "all zero".
pub fn all_settled(rows: &[MemberBalance]) -> bool {
    !rows.is_empty() && rows.iter().all(|r| is_settled(r.net_balance))
}

/// Guard against a stale primary read.
///
/// When the period has expenses but the primary source returns nothing, or
/// only settled balances, the balances are recomputed with `fallback`. The
/// fallback result is used only if it has rows.
pub fn reconcile<F>(primary: Vec<MemberBalance>, expense_count: usize, fallback: F) -> Reconciled
where
    F: FnOnce() -> Vec<MemberBalance>,
{
    let suspicious = primary.is_empty() || all_settled(&primary);
    if expense_count == 0 || !suspicious {
        return Reconciled {
            balances: primary,
            source: BalanceSource::Primary,
        };
    }

    let rebuilt = fallback();
    if rebuilt.is_empty() {
        return Reconciled {
            balances: primary,
            source: BalanceSource::Primary,
        };
    }

    tracing::info!(
        expense_count,
        rows = rebuilt.len(),
        "primary balances looked empty, using per-draft participants"
    );
    Reconciled {
        balances: rebuilt,
        source: BalanceSource::Fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::approx_eq;
    use crate::split::{compute_shares, ModeInputs, SplitMode};
    use chrono::NaiveDate;

    fn members() -> Vec<Member> {
        vec![
            Member::new("a", Some("Ana")),
            Member::new("b", Some("Ben")),
            Member::new("c", None),
        ]
    }

    fn ids() -> BTreeSet<MemberId> {
        members().into_iter().map(|m| m.member_id).collect()
    }

    fn draft(id: &str, payer: &str, amount: f64) -> Draft {
        let shares =
            compute_shares(amount, &payer.into(), &ids(), SplitMode::Equal, &ModeInputs::new())
                .unwrap();
        Draft::new(
            id,
            "g-1",
            payer,
            amount,
            NaiveDate::from_ymd_opt(2026, 2, 3).unwrap(),
            shares,
        )
        .unwrap()
    }

    #[test]
    fn test_inactive_members_appear_with_zero() {
        let shares = vec![ParticipantShare::solo("a", 12.0)];
        let balances = compute_balances(&shares, &ids());
        assert_eq!(balances.len(), 3);
        assert_eq!(balances[&MemberId::from("c")], Balance::default());
        assert!(balances[&MemberId::from("a")].is_settled());
    }

    #[test]
    fn test_balance_conservation() {
        let mut drafts = vec![draft("d1", "a", 90.0), draft("d2", "b", 45.5), draft("d3", "c", 10.0)];
        let expenses: Vec<Expense> = drafts.iter_mut().map(|d| d.confirm().unwrap()).collect();

        let rows = expense_balances(&expenses, &members());
        let total: f64 = rows.iter().map(|r| r.net_balance).sum();
        assert!(approx_eq(total, 0.0), "nets should sum to zero, got {total}");

        let ana = rows.iter().find(|r| r.member_id.as_str() == "a").unwrap();
        // Ana paid 90 and owes a third of 145.5.
        assert!(approx_eq(ana.net_balance, 90.0 - 145.5 / 3.0));
        assert_eq!(ana.display_name.as_deref(), Some("Ana"));
    }

    #[test]
    fn test_unknown_member_still_counted_by_default() {
        let shares = vec![
            ParticipantShare::new("a", 20.0, 10.0),
            ParticipantShare::new("z", 0.0, 10.0),
        ];
        let balances = compute_balances(&shares, &ids());
        assert_eq!(balances[&MemberId::from("z")].net_balance(), -10.0);

        let rows = member_balances(&balances, &members());
        assert_eq!(rows.len(), 4);
        assert_eq!(rows.last().unwrap().member_id.as_str(), "z");
    }

    #[test]
    fn test_known_only_drops_strangers() {
        let mut agg = BalanceAggregator::new(&ids()).known_members_only();
        agg.add_share(&ParticipantShare::new("z", 5.0, 0.0));
        assert!(!agg.finish().contains_key(&MemberId::from("z")));
    }

    #[test]
    fn test_reconcile_uses_fallback_when_primary_all_zero() {
        let mut drafts = vec![draft("d1", "a", 30.0)];
        let expenses: Vec<Expense> = drafts.iter_mut().map(|d| d.confirm().unwrap()).collect();

        let stale: Vec<MemberBalance> = members()
            .into_iter()
            .map(|m| MemberBalance {
                member_id: m.member_id,
                display_name: m.display_name,
                paid_total: 0.0,
                owed_total: 0.0,
                net_balance: 0.0,
            })
            .collect();

        let out = reconcile(stale, expenses.len(), || {
            fallback_balances(&expenses, &drafts, &members())
        });
        assert_eq!(out.source, BalanceSource::Fallback);
        let ana = out.balances.iter().find(|r| r.member_id.as_str() == "a").unwrap();
        assert!(approx_eq(ana.net_balance, 20.0));
    }

    #[test]
    fn test_reconcile_keeps_primary_when_nonzero_or_no_expenses() {
        let primary = vec![MemberBalance {
            member_id: "a".into(),
            display_name: None,
            paid_total: 10.0,
            owed_total: 5.0,
            net_balance: 5.0,
        }];
        let out = reconcile(primary.clone(), 3, || panic!("fallback must not run"));
        assert_eq!(out.source, BalanceSource::Primary);
        assert_eq!(out.balances, primary);

        let out = reconcile(Vec::new(), 0, || panic!("fallback must not run"));
        assert_eq!(out.source, BalanceSource::Primary);
    }

    #[test]
    fn test_reconcile_keeps_primary_when_fallback_empty() {
        let out = reconcile(Vec::new(), 2, Vec::new);
        assert_eq!(out.source, BalanceSource::Primary);
        assert!(out.balances.is_empty());
    }

    #[test]
    fn test_fallback_ignores_unrelated_drafts() {
        let mut drafts = vec![draft("d1", "a", 30.0), draft("d2", "b", 300.0)];
        let expenses = vec![drafts[0].confirm().unwrap()];
        let rows = fallback_balances(&expenses, &drafts, &members());
        let ben = rows.iter().find(|r| r.member_id.as_str() == "b").unwrap();
        assert!(approx_eq(ben.net_balance, -10.0));
    }

    #[test]
    fn test_all_settled() {
        assert!(!all_settled(&[]));
        let rows = vec![MemberBalance {
            member_id: "a".into(),
            display_name: None,
            paid_total: 1.0,
            owed_total: 0.995,
            net_balance: 0.005,
        }];
        assert!(all_settled(&rows));
    }
}
