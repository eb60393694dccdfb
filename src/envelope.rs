//! The `{"data": ..., "nextCursor": ...}` wrapper around API responses.
//!
//! Not every endpoint wraps its payload, so both shapes decode the same way.

use serde_json::Value;

/// Payload of a response: the `data` member when the body is an enveloped
/// object, otherwise the body itself.
pub(crate) fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Cursor for the next page. Empty strings count as "no more pages".
pub(crate) fn next_cursor(body: &Value) -> Option<String> {
    body.get("nextCursor")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Splits a listing response into its items and next cursor. A bare array
/// body is accepted as an unpaginated listing.
pub(crate) fn split_page(body: Value) -> (Vec<Value>, Option<String>) {
    let cursor = next_cursor(&body);
    let items = match unwrap_data(body) {
        Value::Array(items) => items,
        _ => Vec::new(),
    };
    (items, cursor)
}
