//! Import review: normalized rows → categorized, editable preview → drafts.
//!
//! Category precedence per row is override > source column > user rule >
//! keyword table. Every draft is paid and owed in full by the importing
//! member; splitting happens later, on the draft.

use serde::Serialize;

use tally_core::{CategorySource, Draft, DraftError, DraftSource, MemberId, ParticipantShare};
use tally_ingest::NormalizedRow;

use crate::category_rules::{CompiledRules, MatchSource, RuleBook};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewRow {
    pub row: NormalizedRow,
    pub category: String,
    pub category_source: CategorySource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_category: Option<String>,
    pub remember: bool,
}

impl ReviewRow {
    fn new(row: NormalizedRow, rules: &CompiledRules<'_>) -> Self {
        let (category, category_source) = match &row.category {
            Some(c) => (c.clone(), CategorySource::User),
            None => {
                let res = rules.categorize(&row.merchant);
                let source = match res.source {
                    MatchSource::Rule => CategorySource::Rule,
                    MatchSource::Heuristic | MatchSource::None => CategorySource::User,
                };
                (res.category, source)
            }
        };
        Self {
            row,
            category,
            category_source,
            override_category: None,
            remember: false,
        }
    }

    /// Category after applying a manual override.
    pub fn effective_category(&self) -> &str {
        self.override_category.as_deref().unwrap_or(&self.category)
    }

    pub fn effective_source(&self) -> CategorySource {
        if self.override_category.is_some() {
            CategorySource::User
        } else {
            self.category_source
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReview {
    pub group_id: String,
    pub importer: MemberId,
    pub budget_impact: bool,
    pub rows: Vec<ReviewRow>,
}

impl ImportReview {
    pub fn new(
        group_id: impl Into<String>,
        importer: impl Into<MemberId>,
        rows: impl IntoIterator<Item = NormalizedRow>,
        rules: &RuleBook,
    ) -> Self {
        let compiled = rules.compiled();
        Self {
            group_id: group_id.into(),
            importer: importer.into(),
            budget_impact: true,
            rows: rows.into_iter().map(|r| ReviewRow::new(r, &compiled)).collect(),
        }
    }

    pub fn with_budget_impact(mut self, budget_impact: bool) -> Self {
        self.budget_impact = budget_impact;
        self
    }

    /// Set a manual category for row `index`. Returns false if out of range.
    pub fn override_category(&mut self, index: usize, category: impl Into<String>) -> bool {
        match self.rows.get_mut(index) {
            Some(r) => {
                r.override_category = Some(category.into());
                true
            }
            None => false,
        }
    }

    /// Mark row `index` so its merchant → category choice becomes a rule.
    pub fn remember(&mut self, index: usize) -> bool {
        match self.rows.get_mut(index) {
            Some(r) => {
                r.remember = true;
                true
            }
            None => false,
        }
    }

    pub fn remember_all(&mut self) {
        for r in &mut self.rows {
            r.remember = true;
        }
    }

    /// Write remembered choices into `book`. Returns how many rules were
    /// added or replaced.
    pub fn save_rules(&self, book: &mut RuleBook) -> usize {
        self.rows
            .iter()
            .filter(|r| r.remember)
            .filter(|r| book.remember(&r.row.merchant, r.effective_category()))
            .count()
    }

    /// Build one solo draft per row; ids are `{prefix}-0001`, `{prefix}-0002`, ...
    pub fn into_drafts(self, prefix: &str) -> Result<Vec<Draft>, DraftError> {
        let Self {
            group_id,
            importer,
            budget_impact,
            rows,
        } = self;

        rows.into_iter()
            .enumerate()
            .map(|(i, r)| {
                let amount = r.row.amount;
                let category = r.effective_category().to_string();
                let source = r.effective_source();
                let draft = Draft::new(
                    format!("{prefix}-{:04}", i + 1),
                    group_id.clone(),
                    importer.clone(),
                    amount,
                    r.row.date,
                    vec![ParticipantShare::solo(importer.clone(), amount)],
                )?;
                Ok(draft
                    .with_merchant(r.row.merchant)
                    .with_category(category, source)
                    .with_budget_impact(budget_impact)
                    .with_source(DraftSource::Import))
            })
            .collect()
    }
}
