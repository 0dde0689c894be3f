use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All monetary amounts. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Yields expressed as decimal fractions (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Rate quantities scaled by 10,000 for display (0.01 = 100 bps).
pub type Bps = Decimal;

/// A segmentation field value. Numeric extras are carried through but are
/// never usable as split dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Numeric(Decimal),
    Text(String),
}

/// One cleaned loan observation: monetary weight, yield as a decimal
/// fraction, and the categorical segmentation fields.
///
/// Records are expected pre-normalized by the calling layer (weight and
/// rate coerced to numbers, categorical values lower-cased and trimmed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRecord {
    pub weight: Money,
    pub rate: Rate,
    #[serde(default)]
    pub factors: BTreeMap<String, FieldValue>,
}

impl LoanRecord {
    pub fn new(weight: Money, rate: Rate) -> Self {
        LoanRecord {
            weight,
            rate,
            factors: BTreeMap::new(),
        }
    }

    pub fn with_factor(mut self, name: &str, value: &str) -> Self {
        self.factors
            .insert(name.to_string(), FieldValue::Text(value.to_string()));
        self
    }

    /// Categorical value of a factor. Numeric fields return None and are
    /// thereby excluded from splitting.
    pub fn factor_value(&self, name: &str) -> Option<&str> {
        match self.factors.get(name) {
            Some(FieldValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Conjunction of factor=value constraints defining a segment. The root
/// segment carries the empty filter.
pub type SegmentFilter = BTreeMap<String, String>;

/// Whether a record satisfies every constraint in the filter.
pub fn matches_filter(record: &LoanRecord, filter: &SegmentFilter) -> bool {
    filter
        .iter()
        .all(|(factor, value)| record.factor_value(factor) == Some(value.as_str()))
}

/// Narrow a record view to those matching one factor=value constraint.
pub fn restrict<'a>(records: &[&'a LoanRecord], factor: &str, value: &str) -> Vec<&'a LoanRecord> {
    records
        .iter()
        .filter(|r| r.factor_value(factor) == Some(value))
        .copied()
        .collect()
}

/// All categorical factor names present in either period, sorted.
pub fn categorical_factors(previous: &[LoanRecord], current: &[LoanRecord]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for record in previous.iter().chain(current.iter()) {
        for (name, value) in &record.factors {
            if matches!(value, FieldValue::Text(_)) && !names.iter().any(|n| n == name) {
                names.push(name.clone());
            }
        }
    }
    names.sort();
    names
}
