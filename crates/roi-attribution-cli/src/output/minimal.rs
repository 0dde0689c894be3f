use serde_json::Value;

/// Print just the key answer value from the output.
///
/// For an analysis envelope that is the headline total impact in basis
/// points; otherwise fall back to the first field.
pub fn print_minimal(value: &Value) {
    if let Some(bps) = value.pointer("/metadata/total_impact_bps") {
        println!("{}", format_minimal(bps));
        return;
    }

    if let Value::Object(map) = value {
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(value));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
