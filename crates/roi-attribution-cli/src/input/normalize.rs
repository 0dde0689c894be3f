//! Column-name and value normalization for raw tabular records.
//!
//! The analysis engine takes typed `LoanRecord`s; this module is the thin
//! glue that turns arbitrary field→value maps (as parsed from JSON) into
//! them: weight/rate column aliasing, numeric coercion, percent-to-fraction
//! scaling, and lower-casing of categorical values. Records without a
//! usable weight and rate are dropped here, never inside the engine.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

use roi_attribution_core::record::{FieldValue, LoanRecord};

/// Accepted column names for the loan-amount field, first match wins.
const WEIGHT_ALIASES: &[&str] = &["weight", "loan_amount", "amount", "balance", "principal"];

/// Accepted column names for the yield field, first match wins.
const RATE_ALIASES: &[&str] = &["rate", "roi", "yield", "interest_rate", "apr"];

pub type RawRecord = BTreeMap<String, Value>;

/// Convert raw records to typed `LoanRecord`s. Field-name overrides take
/// precedence over alias detection. Records missing either distinguished
/// field are skipped.
pub fn normalize_records(
    raw: &[RawRecord],
    weight_field: Option<&str>,
    rate_field: Option<&str>,
) -> Result<Vec<LoanRecord>, Box<dyn std::error::Error>> {
    let mut records = Vec::with_capacity(raw.len());

    for raw_record in raw {
        // Canonicalize keys once so alias matching is case-insensitive.
        let fields: BTreeMap<String, &Value> = raw_record
            .iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .collect();

        let weight_key = match resolve_field(&fields, weight_field, WEIGHT_ALIASES) {
            Some(k) => k,
            None => continue,
        };
        let rate_key = match resolve_field(&fields, rate_field, RATE_ALIASES) {
            Some(k) => k,
            None => continue,
        };

        let weight = match fields.get(&weight_key).and_then(|v| coerce_decimal(v)) {
            Some(w) => w,
            None => continue,
        };
        let rate = match fields.get(&rate_key).and_then(|v| coerce_decimal(v)) {
            Some(r) => as_fraction(r),
            None => continue,
        };

        let mut record = LoanRecord::new(weight, rate);
        for (key, value) in &fields {
            if *key == weight_key || *key == rate_key {
                continue;
            }
            match value {
                Value::String(s) => {
                    record.factors.insert(
                        key.clone(),
                        FieldValue::Text(s.trim().to_lowercase()),
                    );
                }
                Value::Number(_) => {
                    if let Some(n) = coerce_decimal(value) {
                        record.factors.insert(key.clone(), FieldValue::Numeric(n));
                    }
                }
                Value::Bool(b) => {
                    record
                        .factors
                        .insert(key.clone(), FieldValue::Text(b.to_string()));
                }
                _ => {}
            }
        }
        records.push(record);
    }

    if records.is_empty() && !raw.is_empty() {
        return Err(format!(
            "no records with a usable weight ({}) and rate ({}) column",
            WEIGHT_ALIASES.join("/"),
            RATE_ALIASES.join("/")
        )
        .into());
    }

    Ok(records)
}

fn resolve_field(
    fields: &BTreeMap<String, &Value>,
    override_name: Option<&str>,
    aliases: &[&str],
) -> Option<String> {
    if let Some(name) = override_name {
        let canonical = name.trim().to_lowercase();
        return fields.contains_key(&canonical).then_some(canonical);
    }
    aliases
        .iter()
        .find(|alias| fields.contains_key(**alias))
        .map(|alias| alias.to_string())
}

fn coerce_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Some(pct) = trimmed.strip_suffix('%') {
                return Decimal::from_str(pct.trim()).ok().map(|d| d / dec!(100));
            }
            Decimal::from_str(trimmed).ok()
        }
        _ => None,
    }
}

/// Rates above 1 in absolute value are taken as percentages (12.5 -> 0.125).
fn as_fraction(rate: Decimal) -> Decimal {
    if rate.abs() > Decimal::ONE {
        rate / dec!(100)
    } else {
        rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_alias_resolution() {
        let records = normalize_records(
            &[raw(json!({"loan_amount": 1000, "roi": 0.12, "tier": "A"}))],
            None,
            None,
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].weight, Decimal::from(1000));
        assert_eq!(records[0].rate, dec!(0.12));
    }

    #[test]
    fn test_field_overrides() {
        let records = normalize_records(
            &[raw(json!({"exposure": 500, "gross_yield": 0.08}))],
            Some("exposure"),
            Some("gross_yield"),
        )
        .unwrap();
        assert_eq!(records[0].weight, Decimal::from(500));
        assert_eq!(records[0].rate, dec!(0.08));
    }

    #[test]
    fn test_categorical_lowercased_and_trimmed() {
        let records = normalize_records(
            &[raw(json!({"weight": 100, "rate": 0.1, "Tier": "  Prime "}))],
            None,
            None,
        )
        .unwrap();
        assert_eq!(records[0].factor_value("tier"), Some("prime"));
    }

    #[test]
    fn test_percent_rate_scaled_to_fraction() {
        let records = normalize_records(
            &[
                raw(json!({"weight": 100, "rate": 12.5})),
                raw(json!({"weight": 100, "rate": "9.75%"})),
            ],
            None,
            None,
        )
        .unwrap();
        assert_eq!(records[0].rate, dec!(0.125));
        assert_eq!(records[1].rate, dec!(0.0975));
    }

    #[test]
    fn test_numeric_string_coercion() {
        let records = normalize_records(
            &[raw(json!({"weight": "2500.50", "rate": "0.11"}))],
            None,
            None,
        )
        .unwrap();
        assert_eq!(records[0].weight, dec!(2500.50));
        assert_eq!(records[0].rate, dec!(0.11));
    }

    #[test]
    fn test_records_missing_fields_skipped() {
        let records = normalize_records(
            &[
                raw(json!({"weight": 100, "rate": 0.1})),
                raw(json!({"weight": 100})),
                raw(json!({"rate": 0.1})),
            ],
            None,
            None,
        )
        .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_all_unusable_is_an_error() {
        let result = normalize_records(&[raw(json!({"foo": "bar"}))], None, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_numeric_extra_fields_kept_as_numeric() {
        let records = normalize_records(
            &[raw(json!({"weight": 100, "rate": 0.1, "fico": 710}))],
            None,
            None,
        )
        .unwrap();
        assert_eq!(
            records[0].factors.get("fico"),
            Some(&FieldValue::Numeric(Decimal::from(710)))
        );
        // Numeric extras never act as categorical factors.
        assert_eq!(records[0].factor_value("fico"), None);
    }
}
