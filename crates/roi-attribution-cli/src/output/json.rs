use serde_json::Value;

/// Pretty-print the full analysis payload as JSON. This is the lossless
/// format: the whole tree, nested metrics included, lands on stdout.
pub fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Failed to render result as JSON: {}", e),
    }
}
