use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use roi_attribution_core::analytics;
use roi_attribution_core::record::{categorical_factors, LoanRecord};
use roi_attribution_core::tree::{analyze_auto, analyze_priority};

use crate::input;
use crate::input::normalize::{normalize_records, RawRecord};

/// Raw request payload: two periods of uncleaned records.
#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    pub previous_period: Vec<RawRecord>,
    pub current_period: Vec<RawRecord>,
}

/// Arguments shared by every analysis command.
#[derive(Args)]
pub struct DataArgs {
    /// Path to JSON input file ({"previous_period": [...], "current_period": [...]})
    #[arg(long)]
    pub input: Option<String>,

    /// Column holding the loan amount (overrides alias detection)
    #[arg(long)]
    pub weight_field: Option<String>,

    /// Column holding the yield/ROI (overrides alias detection)
    #[arg(long)]
    pub rate_field: Option<String>,
}

#[derive(Args)]
pub struct PriorityArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Comma-separated factor sequence, outermost split first
    #[arg(long)]
    pub factors: String,
}

#[derive(Args)]
pub struct AutoArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Comma-separated candidate factors (defaults to every categorical column)
    #[arg(long)]
    pub factors: Option<String>,
}

#[derive(Args)]
pub struct ImportanceArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Comma-separated candidate factors (defaults to every categorical column)
    #[arg(long)]
    pub factors: Option<String>,
}

#[derive(Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Comma-separated factor sequence; omitted means auto-split mode
    #[arg(long)]
    pub factors: Option<String>,
}

// ---------------------------------------------------------------------------
// Command runners
// ---------------------------------------------------------------------------

pub fn run_priority(args: PriorityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let (previous, current) = load_periods(&args.data)?;
    let sequence = parse_factor_list(&args.factors);
    validate_factors(&sequence, &previous, &current)?;
    let result = analyze_priority(&previous, &current, &sequence)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_auto(args: AutoArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let (previous, current) = load_periods(&args.data)?;
    let candidates = match args.factors.as_deref() {
        Some(list) => {
            let parsed = parse_factor_list(list);
            validate_factors(&parsed, &previous, &current)?;
            Some(parsed)
        }
        None => None,
    };
    let result = analyze_auto(&previous, &current, candidates)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_importance(args: ImportanceArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let (previous, current) = load_periods(&args.data)?;
    let candidates = match args.factors.as_deref() {
        Some(list) => {
            let parsed = parse_factor_list(list);
            validate_factors(&parsed, &previous, &current)?;
            parsed
        }
        None => categorical_factors(&previous, &current),
    };
    let importance = analytics::feature_importance(&previous, &current, &candidates);
    Ok(serde_json::to_value(importance)?)
}

pub fn run_export(args: ExportArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let (previous, current) = load_periods(&args.data)?;
    let result = match args.factors.as_deref() {
        Some(list) => {
            let sequence = parse_factor_list(list);
            validate_factors(&sequence, &previous, &current)?;
            analyze_priority(&previous, &current, &sequence)?
        }
        None => analyze_auto(&previous, &current, None)?,
    };
    let rows = analytics::export_to_table(&result.tree[0]);
    Ok(serde_json::to_value(rows)?)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_periods(
    data: &DataArgs,
) -> Result<(Vec<LoanRecord>, Vec<LoanRecord>), Box<dyn std::error::Error>> {
    let request: AnalysisRequest = if let Some(ref path) = data.input {
        input::file::read_json(path)?
    } else if let Some(value) = input::stdin::read_piped_json()? {
        serde_json::from_value(value)?
    } else {
        return Err("--input <file.json> or piped stdin required".into());
    };

    let previous = normalize_records(
        &request.previous_period,
        data.weight_field.as_deref(),
        data.rate_field.as_deref(),
    )?;
    let current = normalize_records(
        &request.current_period,
        data.weight_field.as_deref(),
        data.rate_field.as_deref(),
    )?;
    Ok((previous, current))
}

fn parse_factor_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|f| f.trim().to_lowercase())
        .filter(|f| !f.is_empty())
        .collect()
}

/// Unknown factor names are rejected here, before the engine is invoked.
fn validate_factors(
    requested: &[String],
    previous: &[LoanRecord],
    current: &[LoanRecord],
) -> Result<(), Box<dyn std::error::Error>> {
    let known = categorical_factors(previous, current);
    for factor in requested {
        if !known.contains(factor) {
            return Err(format!(
                "unknown factor '{}' — categorical columns present: {}",
                factor,
                if known.is_empty() {
                    "(none)".to_string()
                } else {
                    known.join(", ")
                }
            )
            .into());
        }
    }
    Ok(())
}
