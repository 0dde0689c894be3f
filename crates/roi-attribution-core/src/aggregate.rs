use rust_decimal::Decimal;

use crate::record::{LoanRecord, Money, Rate};

/// Weighted-average yield of a record subset: Σ(weight·rate) / Σweight.
///
/// Returns zero for an empty subset or when the subset's total weight is
/// zero. Pure and infallible; every caller in the engine relies on the
/// zero-defaulting rather than handling a division error.
pub fn weighted_rate(records: &[&LoanRecord]) -> Rate {
    let total = total_weight(records);
    if total == Decimal::ZERO {
        return Decimal::ZERO;
    }
    let weighted_sum: Decimal = records.iter().map(|r| r.weight * r.rate).sum();
    weighted_sum / total
}

/// Σweight over the subset, zero for empty input.
pub fn total_weight(records: &[&LoanRecord]) -> Money {
    records.iter().map(|r| r.weight).sum()
}
