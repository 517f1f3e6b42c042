//! tally-core: split calculator, drafts, balances and budget summaries for
//! shared group expenses.

pub mod balance;
pub mod draft;
pub mod error;
pub mod expense;
pub mod member;
pub mod money;
pub mod period;
pub mod split;
pub mod summary;

pub use balance::{
    all_settled, compute_balances, expense_balances, fallback_balances, member_balances,
    reconcile, Balance, BalanceAggregator, BalanceSource, MemberBalance, Reconciled,
};
pub use draft::{confirm_all, validate_shares, BulkConfirmOutcome, Draft, DraftSource, DraftStatus};
pub use error::{DraftError, ErrorKind, PeriodKeyError, ServiceError, SplitError};
pub use expense::{CategorySource, Expense};
pub use member::{Member, MemberId};
pub use money::EPSILON;
pub use period::PeriodKey;
pub use split::{compute_shares, ModeInputs, ParticipantShare, SplitMode, SplitSpec};
pub use summary::{category_totals, impact_breakdown, BudgetStatus, BudgetSummary, CategoryTotal, ImpactBreakdown};
