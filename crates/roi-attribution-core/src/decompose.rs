use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::{total_weight, weighted_rate};
use crate::record::{LoanRecord, Rate};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Two-factor decomposition of a segment's contribution to the
/// period-over-period change in portfolio yield.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactBreakdown {
    pub previous_rate: Rate,
    pub current_rate: Rate,
    pub previous_weight_share: Decimal,
    pub current_weight_share: Decimal,
    pub yield_impact: Decimal,
    pub distribution_impact: Decimal,
    pub total_impact: Decimal,
}

// ---------------------------------------------------------------------------
// Decomposition
// ---------------------------------------------------------------------------

fn weight_share(subset: &[&LoanRecord], total: &[&LoanRecord]) -> Decimal {
    let total_w = total_weight(total);
    if total_w == Decimal::ZERO {
        return Decimal::ZERO;
    }
    total_weight(subset) / total_w
}

/// Decompose a segment's impact on the portfolio yield change into a yield
/// component and a distribution component.
///
/// The yield term holds the segment's weight share fixed at the previous
/// period's value; the distribution term holds the segment's rate fixed at
/// the previous period's value. Both reference the previous period, so the
/// decomposition is asymmetric and first-order; the total is defined as the
/// sum of the two components.
///
/// `prev_total` / `curr_total` must be the FULL portfolio sets for the whole
/// recursion, never a node's filtered subset. Every weight share in the tree
/// is anchored against root-level weight so that sibling impacts are
/// comparable across depths.
///
/// When the subset equals the totals both shares are exactly one, the
/// distribution term vanishes, and the total impact equals the raw weighted
/// rate delta. That is the root-node special case.
pub fn decompose(
    prev_subset: &[&LoanRecord],
    curr_subset: &[&LoanRecord],
    prev_total: &[&LoanRecord],
    curr_total: &[&LoanRecord],
) -> ImpactBreakdown {
    let previous_rate = weighted_rate(prev_subset);
    let current_rate = weighted_rate(curr_subset);
    let previous_weight_share = weight_share(prev_subset, prev_total);
    let current_weight_share = weight_share(curr_subset, curr_total);

    let yield_impact = (current_rate - previous_rate) * previous_weight_share;
    let distribution_impact = previous_rate * (current_weight_share - previous_weight_share);

    ImpactBreakdown {
        previous_rate,
        current_rate,
        previous_weight_share,
        current_weight_share,
        yield_impact,
        distribution_impact,
        total_impact: yield_impact + distribution_impact,
    }
}
