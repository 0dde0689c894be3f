use serde_json::Value;
use std::io::{self, Read};

/// Read a piped analysis request from stdin, if one is being piped.
///
/// Returns None when stdin is a TTY or the pipe is empty, so commands can
/// fall back to demanding `--input`. The payload is parsed as generic JSON
/// here; the command layer deserializes it into an `AnalysisRequest`.
pub fn read_piped_json() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    parse_piped(&buffer)
}

fn parse_piped(buffer: &str) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| format!("Failed to parse piped request: {}", e))?;
    Ok(Some(value))
}
