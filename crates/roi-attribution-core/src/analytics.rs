use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::record::{Bps, LoanRecord, Money, Rate};
use crate::selector::impact_variance;
use crate::tree::TreeNode;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Yield/distribution/total accumulators for one factor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactorImpact {
    pub yield_impact: Decimal,
    pub distribution_impact: Decimal,
    pub total_impact: Decimal,
}

/// Additive roll-up of impacts across every non-root node.
///
/// Nodes at every depth are summed, so hierarchically nested contributions
/// are counted once per level they appear in (a parent's impact is already
/// decomposed into its children). That is the documented behavior of this
/// summary, not an aggregation to interpret as a partition of the total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactSummary {
    pub total_yield_impact: Decimal,
    pub total_distribution_impact: Decimal,
    pub total_impact: Decimal,
    pub per_factor: BTreeMap<String, FactorImpact>,
}

/// One flat row per tree node for spreadsheet/CSV export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRow {
    pub path: String,
    pub factor: String,
    pub value: String,
    pub depth: usize,
    pub previous_rate: Rate,
    pub current_rate: Rate,
    pub rate_change_bps: Bps,
    pub previous_weight: Money,
    pub current_weight: Money,
    pub previous_count: usize,
    pub current_count: usize,
    pub yield_impact_bps: Bps,
    pub distribution_impact_bps: Bps,
    pub total_impact_bps: Bps,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pct_of_parent_impact: Option<Decimal>,
    pub pct_of_root_impact: Decimal,
}

// ---------------------------------------------------------------------------
// Structure measures
// ---------------------------------------------------------------------------

/// Total node count across all levels, root inclusive.
pub fn count_nodes(node: &TreeNode) -> usize {
    1 + node.children.iter().map(count_nodes).sum::<usize>()
}

/// Number of splitting levels below this node: zero for a leaf, each level
/// of children adds one.
pub fn max_depth(node: &TreeNode) -> usize {
    node.children
        .iter()
        .map(max_depth)
        .max()
        .map_or(0, |d| d + 1)
}

// ---------------------------------------------------------------------------
// Feature importance
// ---------------------------------------------------------------------------

/// Per-factor impact variance over the full root-level dataset, normalized
/// to sum to one. Falls back to a uniform distribution when every factor's
/// variance is zero; an empty candidate list yields an empty map.
///
/// Importance is evaluated once against root-level data even though
/// auto-mode splits are chosen conditionally on filtered subsets, so scores
/// summarize the portfolio rather than any particular path in the tree.
pub fn feature_importance(
    previous: &[LoanRecord],
    current: &[LoanRecord],
    candidates: &[String],
) -> BTreeMap<String, Decimal> {
    if candidates.is_empty() {
        return BTreeMap::new();
    }

    let prev_total: Vec<&LoanRecord> = previous.iter().collect();
    let curr_total: Vec<&LoanRecord> = current.iter().collect();

    let variances: Vec<(String, Decimal)> = candidates
        .iter()
        .map(|factor| {
            let v = impact_variance(factor, &prev_total, &curr_total, &prev_total, &curr_total);
            (factor.clone(), v)
        })
        .collect();

    let total: Decimal = variances.iter().map(|(_, v)| *v).sum();
    if total == Decimal::ZERO {
        let uniform = Decimal::ONE / Decimal::from(candidates.len());
        return variances.into_iter().map(|(f, _)| (f, uniform)).collect();
    }

    variances
        .into_iter()
        .map(|(f, v)| (f, v / total))
        .collect()
}

// ---------------------------------------------------------------------------
// Impact roll-up
// ---------------------------------------------------------------------------

/// Sum yield/distribution/total impact across every non-root node, overall
/// and grouped by splitting factor.
pub fn impact_summary(root: &TreeNode) -> ImpactSummary {
    let mut summary = ImpactSummary {
        total_yield_impact: Decimal::ZERO,
        total_distribution_impact: Decimal::ZERO,
        total_impact: Decimal::ZERO,
        per_factor: BTreeMap::new(),
    };
    for child in &root.children {
        accumulate(child, &mut summary);
    }
    summary
}

fn accumulate(node: &TreeNode, summary: &mut ImpactSummary) {
    summary.total_yield_impact += node.metrics.yield_impact;
    summary.total_distribution_impact += node.metrics.distribution_impact;
    summary.total_impact += node.metrics.total_impact;

    let entry = summary.per_factor.entry(node.factor.clone()).or_default();
    entry.yield_impact += node.metrics.yield_impact;
    entry.distribution_impact += node.metrics.distribution_impact;
    entry.total_impact += node.metrics.total_impact;

    for child in &node.children {
        accumulate(child, summary);
    }
}

// ---------------------------------------------------------------------------
// Table export
// ---------------------------------------------------------------------------

/// Flatten the tree into one row per node, depth-first, children in their
/// sorted order. The root row's path is the root's factor label; every
/// other path appends "factor=value" segments joined by " / ".
pub fn export_to_table(root: &TreeNode) -> Vec<TableRow> {
    let mut rows = Vec::new();
    flatten(root, root.factor.as_str(), 0, &mut rows);
    rows
}

fn flatten(node: &TreeNode, path: &str, depth: usize, rows: &mut Vec<TableRow>) {
    rows.push(TableRow {
        path: path.to_string(),
        factor: node.factor.clone(),
        value: node.value.clone(),
        depth,
        previous_rate: node.metrics.previous_rate,
        current_rate: node.metrics.current_rate,
        rate_change_bps: node.metrics.rate_change_bps,
        previous_weight: node.metrics.previous_weight,
        current_weight: node.metrics.current_weight,
        previous_count: node.metrics.previous_count,
        current_count: node.metrics.current_count,
        yield_impact_bps: node.metrics.yield_impact_bps,
        distribution_impact_bps: node.metrics.distribution_impact_bps,
        total_impact_bps: node.metrics.total_impact_bps,
        pct_of_parent_impact: node.metrics.pct_of_parent_impact,
        pct_of_root_impact: node.metrics.pct_of_root_impact,
    });
    for child in &node.children {
        let child_path = format!("{} / {}={}", path, child.factor, child.value);
        flatten(child, &child_path, depth + 1, rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{analyze_priority, analyze_auto};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn rec(weight: Decimal, rate: Decimal, tier: &str) -> LoanRecord {
        LoanRecord::new(weight, rate).with_factor("tier", tier)
    }

    fn shifted_portfolio() -> (Vec<LoanRecord>, Vec<LoanRecord>) {
        let prev = vec![
            rec(dec!(50), dec!(0.10), "a"),
            rec(dec!(50), dec!(0.10), "b"),
        ];
        let curr = vec![
            rec(dec!(80), dec!(0.10), "a"),
            rec(dec!(20), dec!(0.10), "b"),
        ];
        (prev, curr)
    }

    #[test]
    fn test_count_and_depth() {
        let (prev, curr) = shifted_portfolio();
        let out = analyze_priority(&prev, &curr, &["tier".to_string()]).unwrap();
        let root = &out.tree[0];
        assert_eq!(count_nodes(root), 3);
        assert_eq!(max_depth(root), 1);
    }

    #[test]
    fn test_depth_of_leaf_root_is_zero() {
        let prev = vec![LoanRecord::new(dec!(100), dec!(0.10))];
        let curr = vec![LoanRecord::new(dec!(100), dec!(0.10))];
        let out = analyze_priority(&prev, &curr, &[]).unwrap();
        assert_eq!(max_depth(&out.tree[0]), 0);
        assert_eq!(count_nodes(&out.tree[0]), 1);
    }

    #[test]
    fn test_feature_importance_normalizes_to_one() {
        let mk = |r: Decimal, tier: &str, channel: &str| {
            LoanRecord::new(dec!(100), r)
                .with_factor("tier", tier)
                .with_factor("channel", channel)
        };
        let prev = vec![
            mk(dec!(0.10), "a", "x"),
            mk(dec!(0.10), "b", "x"),
            mk(dec!(0.10), "a", "y"),
            mk(dec!(0.10), "b", "y"),
        ];
        let curr = vec![
            mk(dec!(0.20), "a", "x"),
            mk(dec!(0.10), "b", "x"),
            mk(dec!(0.18), "a", "y"),
            mk(dec!(0.12), "b", "y"),
        ];
        let candidates = vec!["tier".to_string(), "channel".to_string()];
        let importance = feature_importance(&prev, &curr, &candidates);
        let sum: Decimal = importance.values().copied().sum();
        assert!((sum - Decimal::ONE).abs() < dec!(0.000000001));
        assert!(importance["tier"] > importance["channel"]);
    }

    #[test]
    fn test_feature_importance_uniform_fallback() {
        let prev = vec![
            LoanRecord::new(dec!(100), dec!(0.10))
                .with_factor("tier", "a")
                .with_factor("channel", "x"),
        ];
        let curr = prev.clone();
        let candidates = vec!["tier".to_string(), "channel".to_string()];
        let importance = feature_importance(&prev, &curr, &candidates);
        assert_eq!(importance["tier"], dec!(0.5));
        assert_eq!(importance["channel"], dec!(0.5));
    }

    #[test]
    fn test_feature_importance_empty_candidates() {
        let prev = vec![LoanRecord::new(dec!(100), dec!(0.10))];
        let curr = prev.clone();
        assert!(feature_importance(&prev, &curr, &[]).is_empty());
    }

    #[test]
    fn test_impact_summary_totals_and_grouping() {
        let (prev, curr) = shifted_portfolio();
        let out = analyze_priority(&prev, &curr, &["tier".to_string()]).unwrap();
        let summary = impact_summary(&out.tree[0]);

        // +0.03 and -0.03 distribution impacts cancel.
        assert_eq!(summary.total_yield_impact, Decimal::ZERO);
        assert_eq!(summary.total_distribution_impact, Decimal::ZERO);
        assert_eq!(summary.total_impact, Decimal::ZERO);

        let tier = &summary.per_factor["tier"];
        assert_eq!(tier.total_impact, Decimal::ZERO);
        assert_eq!(summary.per_factor.len(), 1);
    }

    #[test]
    fn test_impact_summary_counts_every_depth() {
        // Two levels where the same move is visible at both depths; the
        // roll-up counts it at each level.
        let mk = |w: Decimal, r: Decimal, tier: &str, grade: &str| {
            LoanRecord::new(w, r)
                .with_factor("tier", tier)
                .with_factor("grade", grade)
        };
        let prev = vec![
            mk(dec!(100), dec!(0.10), "a", "g1"),
            mk(dec!(100), dec!(0.10), "b", "g2"),
        ];
        let curr = vec![
            mk(dec!(100), dec!(0.12), "a", "g1"),
            mk(dec!(100), dec!(0.10), "b", "g2"),
        ];
        let out =
            analyze_priority(&prev, &curr, &["tier".to_string(), "grade".to_string()]).unwrap();
        let summary = impact_summary(&out.tree[0]);

        // tier level: 0.01; grade level repeats the same 0.01.
        assert_eq!(summary.total_impact, dec!(0.02));
        assert_eq!(summary.per_factor["tier"].total_impact, dec!(0.01));
        assert_eq!(summary.per_factor["grade"].total_impact, dec!(0.01));
    }

    #[test]
    fn test_export_rows_preorder_with_paths() {
        let (prev, curr) = shifted_portfolio();
        let out = analyze_priority(&prev, &curr, &["tier".to_string()]).unwrap();
        let rows = export_to_table(&out.tree[0]);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].path, "portfolio");
        assert_eq!(rows[0].depth, 0);
        assert_eq!(rows[0].pct_of_parent_impact, None);
        assert_eq!(rows[1].path, "portfolio / tier=a");
        assert_eq!(rows[1].depth, 1);
        assert_eq!(rows[1].total_impact_bps, dec!(300));
        assert_eq!(rows[2].path, "portfolio / tier=b");
        assert_eq!(rows[2].total_impact_bps, dec!(-300));
    }

    #[test]
    fn test_export_rows_match_node_count() {
        let mk = |r: Decimal, tier: &str, channel: &str| {
            LoanRecord::new(dec!(100), r)
                .with_factor("tier", tier)
                .with_factor("channel", channel)
        };
        let mut prev = Vec::new();
        let mut curr = Vec::new();
        for channel in ["x", "y"] {
            for _ in 0..3 {
                prev.push(mk(dec!(0.10), "a", channel));
                prev.push(mk(dec!(0.10), "b", channel));
                curr.push(mk(dec!(0.20), "a", channel));
                curr.push(mk(dec!(0.10), "b", channel));
            }
        }
        let out = analyze_auto(&prev, &curr, None).unwrap();
        let rows = export_to_table(&out.tree[0]);
        assert_eq!(rows.len(), out.metadata.total_nodes);
    }
}
