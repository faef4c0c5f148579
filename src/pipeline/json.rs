//! Decoding of JSON-constrained model output.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::{Phase, PipelineError};

/// Parse a phase's raw model output into `T`.
///
/// Empty output is read as `{}` so that field defaults apply. Output that is
/// not a JSON object, or whose fields have the wrong type, is rejected.
pub(crate) fn parse_object<T: DeserializeOwned>(
    phase: Phase,
    raw: &str,
) -> Result<T, PipelineError> {
    let text = extract_json_block(raw);
    let text = if text.is_empty() { "{}" } else { text };

    let value: Value =
        serde_json::from_str(text).map_err(|e| PipelineError::malformed(phase, e))?;
    if !value.is_object() {
        return Err(PipelineError::malformed(
            phase,
            format!("expected a JSON object, got {}", kind_of(&value)),
        ));
    }
    serde_json::from_value(value).map_err(|e| PipelineError::malformed(phase, e))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Extract the JSON payload from output that may be wrapped in a ```json block.
fn extract_json_block(text: &str) -> &str {
    if let Some(start) = text.find("```json") {
        let json_start = start + "```json".len();
        if let Some(end) = text[json_start..].find("```") {
            return text[json_start..json_start + end].trim();
        }
    }
    if let Some(start) = text.find("```") {
        let block_start = start + 3;
        if let Some(end) = text[block_start..].find("```") {
            let candidate = text[block_start..block_start + end].trim();
            // Skip a language tag line other than json
            if let Some(nl) = candidate.find('\n') {
                if !candidate[..nl].trim_start().starts_with('{') {
                    return candidate[nl + 1..].trim();
                }
            }
            return candidate;
        }
    }
    text.trim()
}
