//! Money rounding for tax amounts.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round a monetary amount to 2 decimal places, midpoint away from zero.
///
/// This is the single rounding rule for tax math: per-item accumulated tax is
/// rounded once, and the breakdown total is rounded once more after summation.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
