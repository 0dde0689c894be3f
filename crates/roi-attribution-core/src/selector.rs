use rust_decimal::Decimal;

use crate::decompose::decompose;
use crate::record::{restrict, LoanRecord};

/// Distinct values of a factor across both period subsets, in discovery
/// order: previous-period records first, then current-period records.
pub fn distinct_values(
    factor: &str,
    previous: &[&LoanRecord],
    current: &[&LoanRecord],
) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for record in previous.iter().chain(current.iter()) {
        if let Some(v) = record.factor_value(factor) {
            if !values.iter().any(|seen| seen == v) {
                values.push(v.to_string());
            }
        }
    }
    values
}

/// Population variance of per-value total impacts for one candidate factor.
///
/// Each value's sub-segment is decomposed against the FULL portfolio totals,
/// matching how every weight share in the tree is anchored.
pub fn impact_variance(
    factor: &str,
    prev_subset: &[&LoanRecord],
    curr_subset: &[&LoanRecord],
    prev_total: &[&LoanRecord],
    curr_total: &[&LoanRecord],
) -> Decimal {
    let values = distinct_values(factor, prev_subset, curr_subset);
    if values.is_empty() {
        return Decimal::ZERO;
    }

    let impacts: Vec<Decimal> = values
        .iter()
        .map(|value| {
            let prev_sub = restrict(prev_subset, factor, value);
            let curr_sub = restrict(curr_subset, factor, value);
            decompose(&prev_sub, &curr_sub, prev_total, curr_total).total_impact
        })
        .collect();

    let n = Decimal::from(impacts.len());
    let mean: Decimal = impacts.iter().copied().sum::<Decimal>() / n;
    impacts
        .iter()
        .map(|x| {
            let diff = *x - mean;
            diff * diff
        })
        .sum::<Decimal>()
        / n
}

/// Greedy split search: the candidate whose per-value impacts diverge the
/// most (strictly greatest variance) wins. Ties keep the first candidate in
/// order. Returns None when every variance is zero or there are no
/// candidates, which signals "stop splitting" — a normal leaf, not an error.
pub fn select_best_factor(
    prev_subset: &[&LoanRecord],
    curr_subset: &[&LoanRecord],
    prev_total: &[&LoanRecord],
    curr_total: &[&LoanRecord],
    candidates: &[String],
) -> Option<String> {
    let mut best: Option<String> = None;
    let mut best_variance = Decimal::ZERO;

    for candidate in candidates {
        let variance = impact_variance(candidate, prev_subset, curr_subset, prev_total, curr_total);
        if variance > best_variance {
            best_variance = variance;
            best = Some(candidate.clone());
        }
    }

    best
}
