pub mod openai;
pub mod traits;

pub use openai::OpenAiGateway;
pub use traits::{GatewayError, GenerateOptions, ModelGateway};

use regex::Regex;
use std::sync::OnceLock;

/// Longest error text that is logged or returned to a client.
const MAX_API_ERROR_CHARS: usize = 200;

fn secret_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(sk-[A-Za-z0-9_\-]{8,}|Bearer\s+[A-Za-z0-9._\-]{8,})").ok())
        .as_ref()
}

/// Scrub API keys from backend error text and cap its length.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = match secret_pattern() {
        Some(pattern) => pattern.replace_all(input, "[REDACTED]").into_owned(),
        None => input.to_string(),
    };
    let scrubbed = scrubbed.trim();
    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed.to_string();
    }
    let truncated: String = scrubbed.chars().take(MAX_API_ERROR_CHARS).collect();
    format!("{truncated}...")
}
