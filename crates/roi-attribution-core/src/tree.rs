use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::analytics::{self, ImpactSummary};
use crate::decompose::decompose;
use crate::error::AttributionError;
use crate::record::{categorical_factors, restrict, Bps, LoanRecord, Money, Rate, SegmentFilter};
use crate::selector::{distinct_values, select_best_factor};
use crate::AttributionResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Maximum number of split levels below the root in auto mode.
pub const MAX_AUTO_DEPTH: usize = 4;

/// Minimum records per period a segment needs before it may be split again.
pub const MIN_SPLIT_RECORDS: usize = 10;

/// Sentinel factor name carried by the root node.
pub const ROOT_FACTOR: &str = "portfolio";

/// Sentinel value label carried by the root node.
pub const ROOT_VALUE: &str = "all";

/// Computed quantities attached to every tree node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub previous_rate: Rate,
    pub current_rate: Rate,
    pub rate_change_bps: Bps,
    pub previous_weight: Money,
    pub current_weight: Money,
    pub previous_count: usize,
    pub current_count: usize,
    pub yield_impact: Decimal,
    pub distribution_impact: Decimal,
    pub total_impact: Decimal,
    pub yield_impact_bps: Bps,
    pub distribution_impact_bps: Bps,
    pub total_impact_bps: Bps,
    /// None at the root; zero when the parent's total impact is exactly zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pct_of_parent_impact: Option<Decimal>,
    pub pct_of_root_impact: Decimal,
}

/// One segment of the attribution tree. Immutable once returned; the whole
/// tree is rebuilt from scratch on every analysis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub factor: String,
    pub value: String,
    /// Full conjunction of constraints from root to this node.
    pub filter: SegmentFilter,
    pub metrics: NodeMetrics,
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub total_nodes: usize,
    pub max_depth: usize,
    pub total_impact_bps: Bps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Single-element list holding the root node.
    pub tree: Vec<TreeNode>,
    pub metadata: AnalysisMetadata,
    /// Auto mode only: per-factor importance over root-level data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_importance: Option<BTreeMap<String, Decimal>>,
    pub impact_summary: ImpactSummary,
    pub methodology: String,
    pub assumptions: HashMap<String, String>,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Node construction
// ---------------------------------------------------------------------------

fn to_bps(x: Decimal) -> Bps {
    x * dec!(10000)
}

fn pct_of(impact: Decimal, anchor: Decimal) -> Decimal {
    if anchor == Decimal::ZERO {
        Decimal::ZERO
    } else {
        impact / anchor * dec!(100)
    }
}

/// Metrics for one segment. `anchors` is None only at the root, where the
/// parent percentage is undefined and the root percentage is 100 by
/// definition.
fn build_metrics(
    prev_subset: &[&LoanRecord],
    curr_subset: &[&LoanRecord],
    prev_total: &[&LoanRecord],
    curr_total: &[&LoanRecord],
    anchors: Option<(Decimal, Decimal)>,
) -> NodeMetrics {
    let breakdown = decompose(prev_subset, curr_subset, prev_total, curr_total);
    let (pct_of_parent_impact, pct_of_root_impact) = match anchors {
        Some((parent_impact, root_impact)) => (
            Some(pct_of(breakdown.total_impact, parent_impact)),
            pct_of(breakdown.total_impact, root_impact),
        ),
        None => (None, dec!(100)),
    };

    NodeMetrics {
        previous_rate: breakdown.previous_rate,
        current_rate: breakdown.current_rate,
        rate_change_bps: to_bps(breakdown.current_rate - breakdown.previous_rate),
        previous_weight: prev_subset.iter().map(|r| r.weight).sum(),
        current_weight: curr_subset.iter().map(|r| r.weight).sum(),
        previous_count: prev_subset.len(),
        current_count: curr_subset.len(),
        yield_impact: breakdown.yield_impact,
        distribution_impact: breakdown.distribution_impact,
        total_impact: breakdown.total_impact,
        yield_impact_bps: to_bps(breakdown.yield_impact),
        distribution_impact_bps: to_bps(breakdown.distribution_impact),
        total_impact_bps: to_bps(breakdown.total_impact),
        pct_of_parent_impact,
        pct_of_root_impact,
    }
}

/// Descending by |total impact bps|; stable, so ties keep discovery order.
fn sort_by_impact(children: &mut [TreeNode]) {
    children.sort_by(|a, b| {
        b.metrics
            .total_impact_bps
            .abs()
            .cmp(&a.metrics.total_impact_bps.abs())
    });
}

/// Split one level on `factor`, then hand each child to `recurse` to build
/// its own children. A value becomes a child only when at least one record
/// in either period matches it; empty segments are skipped, never emitted
/// as zero-nodes.
#[allow(clippy::too_many_arguments)]
fn split_on_factor<F>(
    factor: &str,
    previous: &[&LoanRecord],
    current: &[&LoanRecord],
    prev_total: &[&LoanRecord],
    curr_total: &[&LoanRecord],
    filter: &SegmentFilter,
    parent_impact: Decimal,
    root_impact: Decimal,
    mut recurse: F,
) -> Vec<TreeNode>
where
    F: FnMut(&[&LoanRecord], &[&LoanRecord], &SegmentFilter, Decimal) -> Vec<TreeNode>,
{
    let mut children = Vec::new();
    for value in distinct_values(factor, previous, current) {
        let prev_sub = restrict(previous, factor, &value);
        let curr_sub = restrict(current, factor, &value);
        if prev_sub.is_empty() && curr_sub.is_empty() {
            continue;
        }
        let metrics = build_metrics(
            &prev_sub,
            &curr_sub,
            prev_total,
            curr_total,
            Some((parent_impact, root_impact)),
        );
        let mut child_filter = filter.clone();
        child_filter.insert(factor.to_string(), value.clone());
        let grandchildren = recurse(&prev_sub, &curr_sub, &child_filter, metrics.total_impact);
        children.push(TreeNode {
            factor: factor.to_string(),
            value,
            filter: child_filter,
            metrics,
            children: grandchildren,
        });
    }
    sort_by_impact(&mut children);
    children
}

#[allow(clippy::too_many_arguments)]
fn build_children_priority(
    previous: &[&LoanRecord],
    current: &[&LoanRecord],
    prev_total: &[&LoanRecord],
    curr_total: &[&LoanRecord],
    sequence: &[String],
    depth: usize,
    filter: &SegmentFilter,
    parent_impact: Decimal,
    root_impact: Decimal,
) -> Vec<TreeNode> {
    let Some(factor) = sequence.get(depth) else {
        return Vec::new();
    };
    split_on_factor(
        factor,
        previous,
        current,
        prev_total,
        curr_total,
        filter,
        parent_impact,
        root_impact,
        |prev_sub, curr_sub, child_filter, child_impact| {
            build_children_priority(
                prev_sub,
                curr_sub,
                prev_total,
                curr_total,
                sequence,
                depth + 1,
                child_filter,
                child_impact,
                root_impact,
            )
        },
    )
}

#[allow(clippy::too_many_arguments)]
fn build_children_auto(
    previous: &[&LoanRecord],
    current: &[&LoanRecord],
    prev_total: &[&LoanRecord],
    curr_total: &[&LoanRecord],
    candidates: &[String],
    depth: usize,
    filter: &SegmentFilter,
    parent_impact: Decimal,
    root_impact: Decimal,
) -> Vec<TreeNode> {
    if depth >= MAX_AUTO_DEPTH {
        return Vec::new();
    }
    if previous.len() < MIN_SPLIT_RECORDS || current.len() < MIN_SPLIT_RECORDS {
        return Vec::new();
    }
    let Some(factor) = select_best_factor(previous, current, prev_total, curr_total, candidates)
    else {
        return Vec::new();
    };
    // Within a child segment every record shares the chosen factor's value,
    // so re-splitting on it would yield a single child with zero variance.
    let remaining: Vec<String> = candidates
        .iter()
        .filter(|c| **c != factor)
        .cloned()
        .collect();
    split_on_factor(
        &factor,
        previous,
        current,
        prev_total,
        curr_total,
        filter,
        parent_impact,
        root_impact,
        |prev_sub, curr_sub, child_filter, child_impact| {
            build_children_auto(
                prev_sub,
                curr_sub,
                prev_total,
                curr_total,
                &remaining,
                depth + 1,
                child_filter,
                child_impact,
                root_impact,
            )
        },
    )
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

fn validate_periods(previous: &[LoanRecord], current: &[LoanRecord]) -> AttributionResult<()> {
    if previous.is_empty() {
        return Err(AttributionError::InvalidInput {
            field: "previous_period".into(),
            reason: "At least one previous-period record is required".into(),
        });
    }
    if current.is_empty() {
        return Err(AttributionError::InvalidInput {
            field: "current_period".into(),
            reason: "At least one current-period record is required".into(),
        });
    }
    Ok(())
}

fn collect_warnings(previous: &[LoanRecord], current: &[LoanRecord]) -> Vec<String> {
    let mut warnings = Vec::new();
    for (name, records) in [("previous", previous), ("current", current)] {
        let negatives = records.iter().filter(|r| r.weight < Decimal::ZERO).count();
        if negatives > 0 {
            warnings.push(format!(
                "{} record(s) with negative weight in {} period",
                negatives, name
            ));
        }
        let total: Decimal = records.iter().map(|r| r.weight).sum();
        if total == Decimal::ZERO {
            warnings.push(format!(
                "Total weight of the {} period is zero; its shares default to 0",
                name
            ));
        }
    }
    warnings
}

fn base_assumptions() -> HashMap<String, String> {
    let mut assumptions = HashMap::new();
    assumptions.insert("model".into(), "two-factor yield/volume attribution".into());
    assumptions.insert("reference_period".into(), "previous".into());
    assumptions.insert("impact_units".into(), "basis_points".into());
    assumptions
}

fn finish_result(
    root: TreeNode,
    feature_importance: Option<BTreeMap<String, Decimal>>,
    methodology: &str,
    assumptions: HashMap<String, String>,
    warnings: Vec<String>,
) -> AnalysisResult {
    let metadata = AnalysisMetadata {
        total_nodes: analytics::count_nodes(&root),
        max_depth: analytics::max_depth(&root),
        total_impact_bps: root.metrics.total_impact_bps,
    };
    let impact_summary = analytics::impact_summary(&root);
    AnalysisResult {
        tree: vec![root],
        metadata,
        feature_importance,
        impact_summary,
        methodology: methodology.into(),
        assumptions,
        warnings,
    }
}

/// Build the attribution tree along a caller-supplied factor sequence:
/// depth *d* splits every segment on `factor_sequence[d]`, stopping when
/// the sequence is exhausted.
///
/// Factor names are assumed valid; the calling layer rejects unknown
/// factors before invoking the engine.
pub fn analyze_priority(
    previous: &[LoanRecord],
    current: &[LoanRecord],
    factor_sequence: &[String],
) -> AttributionResult<AnalysisResult> {
    validate_periods(previous, current)?;
    let warnings = collect_warnings(previous, current);

    let prev_total: Vec<&LoanRecord> = previous.iter().collect();
    let curr_total: Vec<&LoanRecord> = current.iter().collect();

    let root_metrics = build_metrics(&prev_total, &curr_total, &prev_total, &curr_total, None);
    let root_impact = root_metrics.total_impact;
    let children = build_children_priority(
        &prev_total,
        &curr_total,
        &prev_total,
        &curr_total,
        factor_sequence,
        0,
        &SegmentFilter::new(),
        root_impact,
        root_impact,
    );
    let root = TreeNode {
        factor: ROOT_FACTOR.into(),
        value: ROOT_VALUE.into(),
        filter: SegmentFilter::new(),
        metrics: root_metrics,
        children,
    };

    let mut assumptions = base_assumptions();
    assumptions.insert("split_mode".into(), "priority".into());
    assumptions.insert("factor_sequence".into(), factor_sequence.join(","));

    Ok(finish_result(
        root,
        None,
        "Fixed-sequence segment split with previous-period-referenced impact decomposition",
        assumptions,
        warnings,
    ))
}

/// Build the attribution tree by greedy variance-maximizing factor search
/// at every node. Splitting stops at a depth of 4, below 10 records in
/// either period's segment, or when no candidate factor shows impact
/// variance.
///
/// Candidates default to every categorical factor present in either
/// period. Feature importance is computed once over root-level data even
/// though deeper splits are chosen conditionally; importance scores are a
/// portfolio-level summary, not a per-node account.
pub fn analyze_auto(
    previous: &[LoanRecord],
    current: &[LoanRecord],
    candidate_factors: Option<Vec<String>>,
) -> AttributionResult<AnalysisResult> {
    validate_periods(previous, current)?;
    let warnings = collect_warnings(previous, current);

    let candidates =
        candidate_factors.unwrap_or_else(|| categorical_factors(previous, current));

    let prev_total: Vec<&LoanRecord> = previous.iter().collect();
    let curr_total: Vec<&LoanRecord> = current.iter().collect();

    let root_metrics = build_metrics(&prev_total, &curr_total, &prev_total, &curr_total, None);
    let root_impact = root_metrics.total_impact;
    let children = build_children_auto(
        &prev_total,
        &curr_total,
        &prev_total,
        &curr_total,
        &candidates,
        0,
        &SegmentFilter::new(),
        root_impact,
        root_impact,
    );
    let root = TreeNode {
        factor: ROOT_FACTOR.into(),
        value: ROOT_VALUE.into(),
        filter: SegmentFilter::new(),
        metrics: root_metrics,
        children,
    };

    let importance = analytics::feature_importance(previous, current, &candidates);

    let mut assumptions = base_assumptions();
    assumptions.insert("split_mode".into(), "auto".into());
    assumptions.insert("max_depth".into(), MAX_AUTO_DEPTH.to_string());
    assumptions.insert("min_split_records".into(), MIN_SPLIT_RECORDS.to_string());

    Ok(finish_result(
        root,
        Some(importance),
        "Greedy variance-maximizing segment split with previous-period-referenced impact decomposition",
        assumptions,
        warnings,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
