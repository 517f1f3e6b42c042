//! Dashboard figures for one period: budget wallet, top categories and the
//! budget-impact breakdown.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::expense::Expense;
use crate::period::PeriodKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BudgetStatus {
    OnTrack,
    OverBudget,
}

impl BudgetStatus {
    pub fn label(&self) -> &'static str {
        match self {
            BudgetStatus::OnTrack => "On Track",
            BudgetStatus::OverBudget => "Over Budget",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSummary {
    pub period_key: PeriodKey,
    pub budget: f64,
    pub spent: f64,
    pub remaining: f64,
    pub status: BudgetStatus,
    /// 0-100, capped.
    pub percent_used: f64,
}

impl BudgetSummary {
    /// Only budget-impact expenses of `period` count as spent.
    pub fn compute(period: PeriodKey, budget: f64, expenses: &[Expense]) -> Self {
        let spent: f64 = expenses
            .iter()
            .filter(|e| e.period_key == period && e.budget_impact)
            .map(|e| e.amount)
            .sum();
        let percent_used = if budget > 0.0 {
            (spent / budget * 100.0).min(100.0)
        } else {
            0.0
        };
        Self {
            period_key: period,
            budget,
            spent,
            remaining: budget - spent,
            status: if spent > budget {
                BudgetStatus::OverBudget
            } else {
                BudgetStatus::OnTrack
            },
            percent_used,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub name: String,
    pub spent: f64,
}

/// Spend per category, largest first, at most `limit` rows.
pub fn category_totals(expenses: &[Expense], limit: usize) -> Vec<CategoryTotal> {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for e in expenses {
        *totals.entry(e.category_or_default()).or_insert(0.0) += e.amount;
    }

    let mut rows: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(name, spent)| CategoryTotal {
            name: name.to_string(),
            spent,
        })
        .collect();
    rows.sort_by(|a, b| b.spent.total_cmp(&a.spent).then_with(|| a.name.cmp(&b.name)));
    rows.truncate(limit);
    rows
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpactBreakdown {
    pub budget_impact: f64,
    pub split_only: f64,
}

pub fn impact_breakdown(expenses: &[Expense]) -> ImpactBreakdown {
    expenses.iter().fold(ImpactBreakdown::default(), |mut acc, e| {
        if e.budget_impact {
            acc.budget_impact += e.amount;
        } else {
            acc.split_only += e.amount;
        }
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::ParticipantShare;
    use chrono::NaiveDate;

    fn expense(id: &str, day: (i32, u32, u32), amount: f64, category: Option<&str>, impact: bool) -> Expense {
        let date = NaiveDate::from_ymd_opt(day.0, day.1, day.2).unwrap();
        Expense {
            id: id.into(),
            draft_id: None,
            group_id: "g".into(),
            amount,
            merchant: None,
            date,
            period_key: PeriodKey::from_date(date),
            category: category.map(str::to_string),
            category_source: None,
            budget_impact: impact,
            shares: vec![ParticipantShare::solo("a", amount)],
            notes: None,
        }
    }

    #[test]
    fn test_budget_summary_counts_only_impacting_expenses_in_period() {
        let expenses = vec![
            expense("1", (2026, 3, 1), 400.0, Some("Groceries"), true),
            expense("2", (2026, 3, 9), 250.0, Some("Bills"), false),
            expense("3", (2026, 2, 27), 999.0, Some("Bills"), true),
        ];
        let s = BudgetSummary::compute(PeriodKey::new(2026, 3).unwrap(), 500.0, &expenses);
        assert_eq!(s.spent, 400.0);
        assert_eq!(s.remaining, 100.0);
        assert_eq!(s.status, BudgetStatus::OnTrack);
        assert_eq!(s.percent_used, 80.0);
    }

    #[test]
    fn test_over_budget_caps_percent() {
        let expenses = vec![expense("1", (2026, 3, 1), 800.0, None, true)];
        let s = BudgetSummary::compute(PeriodKey::new(2026, 3).unwrap(), 500.0, &expenses);
        assert_eq!(s.status, BudgetStatus::OverBudget);
        assert_eq!(s.status.label(), "Over Budget");
        assert_eq!(s.percent_used, 100.0);
        assert_eq!(s.remaining, -300.0);

        let zero = BudgetSummary::compute(PeriodKey::new(2026, 3).unwrap(), 0.0, &expenses);
        assert_eq!(zero.percent_used, 0.0);
    }

    #[test]
    fn test_category_totals_sorted_and_limited() {
        let expenses = vec![
            expense("1", (2026, 3, 1), 10.0, Some("Dining"), true),
            expense("2", (2026, 3, 2), 50.0, Some("Groceries"), true),
            expense("3", (2026, 3, 3), 15.0, Some("Dining"), true),
            expense("4", (2026, 3, 4), 5.0, None, true),
        ];
        let rows = category_totals(&expenses, 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Groceries");
        assert_eq!(rows[1], CategoryTotal { name: "Dining".into(), spent: 25.0 });

        let all = category_totals(&expenses, 5);
        assert_eq!(all.last().unwrap().name, "Uncategorized");
    }

    #[test]
    fn test_impact_breakdown() {
        let expenses = vec![
            expense("1", (2026, 3, 1), 10.0, None, true),
            expense("2", (2026, 3, 2), 7.5, None, false),
        ];
        let b = impact_breakdown(&expenses);
        assert_eq!(b.budget_impact, 10.0);
        assert_eq!(b.split_only, 7.5);
    }
}
