//! Amount helpers.
//!
//! Amounts are plain `f64` in the group's currency (no currency code is
//! tracked). Every equality check on split or balance totals goes through
//! [`EPSILON`] so the rounding policy lives in one place.

/// Tolerance for split validation, share sums and balance checks.
pub const EPSILON: f64 = 0.01;

/// Absorbs binary noise so a difference of exactly one cent still counts
/// as within [`EPSILON`] (`100.0 - 99.99` is `0.010000000000005`).
const FLOAT_SLACK: f64 = 1e-9;

/// True when `a` and `b` differ by at most [`EPSILON`], boundary included.
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON + FLOAT_SLACK
}

/// A balance strictly inside the epsilon band is settled.
pub fn is_settled(amount: f64) -> bool {
    amount.abs() < EPSILON
}

/// Round to whole cents (half away from zero).
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Display form used by the CLI and summaries: `$12.30`, `-$5.00`.
pub fn format_amount(amount: f64) -> String {
    let rounded = round_cents(amount);
    if rounded < 0.0 {
        format!("-${:.2}", rounded.abs())
    } else {
        format!("${:.2}", rounded.abs())
    }
}
