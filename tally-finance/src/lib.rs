//! tally-finance: merchant categorization, per-user rule books, and the
//! import review that turns statement rows into expense drafts.

pub mod category_rules;
pub mod review;

pub use category_rules::{
    apply_merchant_rules, categorize, categorize_merchant, normalize_merchant_key, CategoryResult,
    CompiledRules, MatchSource, MerchantRule, RuleBook, UNCATEGORIZED,
};
pub use review::{ImportReview, ReviewRow};
