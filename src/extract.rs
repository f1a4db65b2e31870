use crate::types::{DigestError, Result};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Max characters of raw model output carried in an extraction failure.
const PREVIEW_LEN: usize = 200;

/// Parse an LLM's free-text response into a typed value.
///
/// Models frequently wrap JSON in markdown code fences; one fence is
/// stripped from each side (with or without a language tag) before
/// parsing. On success the returned value satisfies the target schema;
/// on failure the error carries a bounded preview of the raw text and
/// never a partially-filled value.
pub fn extract_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let stripped = strip_code_fences(raw);
    debug!("Extracting structured payload from {} chars", stripped.len());

    serde_json::from_str(stripped).map_err(|e| DigestError::Extraction {
        reason: e.to_string(),
        preview: preview(raw),
    })
}

/// Remove one leading and one trailing triple-backtick fence, if present.
/// Exactly one strip pass per side, not recursive.
fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Drop an optional language tag up to the first newline.
        text = match rest.find('\n') {
            Some(pos) => &rest[pos + 1..],
            None => rest,
        };
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

fn preview(raw: &str) -> String {
    if raw.len() <= PREVIEW_LEN {
        raw.to_string()
    } else {
        let mut end = PREVIEW_LEN;
        while !raw.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &raw[..end])
    }
}
