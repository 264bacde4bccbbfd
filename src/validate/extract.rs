//! Locating and strictly deserializing the JSON document in a response.

use std::ops::Range;

use serde::de::{DeserializeOwned, IgnoredAny};

use crate::error::ValidationError;

/// Returns the JSON document embedded in a model response.
///
/// Prefers the first fenced block (```` ```json ```` or bare ```` ``` ````).
/// Otherwise it considers the span from the first `{` to the last `}` and the
/// span from the first `[` to the last `]`. A parsing object span wins unless
/// a parsing array span encloses it. When neither parses the earlier span is
/// returned so the caller can report the syntax error. Returns `None` if the
/// response holds neither.
#[must_use]
pub fn extract_json(raw: &str) -> Option<&str> {
    if let Some(block) = fenced_block(raw) {
        let trimmed = block.trim();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            return Some(trimmed);
        }
    }

    let object = span(raw, '{', '}');
    let array = span(raw, '[', ']');
    let parses =
        |range: &Range<usize>| serde_json::from_str::<IgnoredAny>(&raw[range.clone()]).is_ok();
    let chosen = match (object.clone().filter(&parses), array.clone().filter(&parses)) {
        // A top-level array of objects encloses the object span.
        (Some(o), Some(a)) if a.start < o.start && a.end > o.end => Some(a),
        (Some(o), _) => Some(o),
        (None, Some(a)) => Some(a),
        (None, None) => match (object, array) {
            (Some(o), Some(a)) => Some(if a.start < o.start { a } else { o }),
            (o, a) => o.or(a),
        },
    };
    chosen.map(|range| &raw[range])
}

fn span(raw: &str, open: char, close: char) -> Option<Range<usize>> {
    let start = raw.find(open)?;
    let end = raw.rfind(close)?;
    (end > start).then(|| start..end + close.len_utf8())
}

/// Content of the first fenced code block, without the info string.
pub(crate) fn fenced_block(raw: &str) -> Option<&str> {
    let open = raw.find("```")?;
    let after_ticks = &raw[open + 3..];
    let body_start = after_ticks.find('\n').map_or(after_ticks.len(), |i| i + 1);
    let body = &after_ticks[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}

/// Extracts and deserializes a response into `T`.
///
/// # Errors
///
/// Returns [`ValidationError::Structural`] naming the missing or mistyped
/// field, or `$` when no JSON document is present.
pub fn parse<T: DeserializeOwned>(raw: &str) -> Result<T, ValidationError> {
    let doc = extract_json(raw)
        .ok_or_else(|| ValidationError::structural("$", "response contains no JSON document"))?;
    serde_json::from_str(doc).map_err(|e| {
        let message = e.to_string();
        ValidationError::structural(field_of(&message), message)
    })
}

/// Pulls the field name out of serde messages such as ``missing field `type` ``.
fn field_of(message: &str) -> String {
    let names_field = ["missing field", "unknown field", "duplicate field"]
        .iter()
        .any(|prefix| message.starts_with(prefix));
    let mut parts = message.split('`');
    match (names_field, parts.next(), parts.next()) {
        (true, Some(_), Some(field)) if !field.is_empty() => field.to_string(),
        _ => "$".to_string(),
    }
}
