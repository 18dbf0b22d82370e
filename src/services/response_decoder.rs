// src/services/response_decoder.rs
//! Recovers a JSON value from model text that may be wrapped in a
//! markdown fence or surrounded by prose.
//!
//! Strategies run in order and each is only tried when the previous one
//! failed to parse: the whole text, the interior of the first fenced
//! block, the span from the first `{` to the last `}`, and finally the
//! span from the first `[` to the last `]`.

use crate::errors::StyleSenseError;
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub fn decode_value(raw: &str) -> Result<Value, StyleSenseError> {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    if let Some(inner) = fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(inner) {
            debug!("decoded model output from fenced block");
            return Ok(value);
        }
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let Some(span) = delimited_span(trimmed, open, close) {
            if let Ok(value) = serde_json::from_str::<Value>(span) {
                debug!("decoded model output from {open}..{close} span");
                return Ok(value);
            }
        }
    }

    Err(StyleSenseError::malformed(raw))
}

/// Decodes and then maps into `T`. A value that parses as JSON but does not
/// fit `T` (missing fields, out-of-domain enum labels) is equally malformed.
pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, StyleSenseError> {
    let value = decode_value(raw)?;
    serde_json::from_value(value).map_err(|e| {
        debug!("model output did not match expected shape: {e}");
        StyleSenseError::malformed(raw)
    })
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_ticks = &text[start + 3..];
    let body = after_ticks
        .strip_prefix("json")
        .or_else(|| after_ticks.strip_prefix("JSON"))
        .unwrap_or(after_ticks);
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn delimited_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}
