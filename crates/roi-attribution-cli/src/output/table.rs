use serde_json::Value;
use tabled::{builder::Builder, Table};

/// Format output as a table using the tabled crate.
///
/// Analysis envelopes (objects carrying "metadata") render as a metadata
/// table followed by the per-factor impact roll-up, importance scores,
/// warnings, and methodology. Arrays (exported tree rows) render as one
/// table with a column per field.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) if map.contains_key("metadata") => {
            print_analysis_tables(map);
        }
        Value::Object(_) => {
            print_flat_object(value);
        }
        Value::Array(arr) => {
            print_array_table(arr);
        }
        _ => {
            println!("{}", value);
        }
    }
}

fn print_analysis_tables(envelope: &serde_json::Map<String, Value>) {
    if let Some(metadata) = envelope.get("metadata") {
        print_flat_object(metadata);
    }

    if let Some(Value::Object(importance)) = envelope.get("feature_importance") {
        println!("\nFeature importance:");
        let mut builder = Builder::default();
        builder.push_record(["factor", "importance"]);
        for (factor, weight) in importance {
            builder.push_record([factor.as_str(), &format_value(weight)]);
        }
        println!("{}", Table::from(builder));
    }

    if let Some(summary) = envelope.get("impact_summary") {
        if let Some(Value::Object(per_factor)) = summary.get("per_factor") {
            if !per_factor.is_empty() {
                println!("\nImpact by factor:");
                let mut builder = Builder::default();
                builder.push_record(["factor", "yield_impact", "distribution_impact", "total_impact"]);
                for (factor, impacts) in per_factor {
                    builder.push_record([
                        factor.as_str(),
                        &field(impacts, "yield_impact"),
                        &field(impacts, "distribution_impact"),
                        &field(impacts, "total_impact"),
                    ]);
                }
                println!("{}", Table::from(builder));
            }
        }
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(methodology)) = envelope.get("methodology") {
        println!("\nMethodology: {}", methodology);
    }
}

fn print_flat_object(value: &Value) {
    if let Value::Object(map) = value {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (key, val) in map {
            builder.push_record([key.as_str(), &format_value(val)]);
        }
        println!("{}", Table::from(builder));
    }
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    // Collect headers from the first row
    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| {
                        map.get(h.as_str())
                            .map(format_value)
                            .unwrap_or_default()
                    })
                    .collect();
                builder.push_record(row);
            }
        }

        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn field(value: &Value, key: &str) -> String {
    value.get(key).map(format_value).unwrap_or_default()
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
