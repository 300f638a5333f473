//! Helpers for inspecting raw catalog payloads
//!
//! Every catalog response is a JSON object. Application-level status is carried
//! in a top-level `code` field (absent or `0` when the request succeeded), with
//! an optional human-readable `message`.

use serde_json::Value;

/// Payload code for "no such record"
pub const CODE_NOT_FOUND: i64 = 2002;

/// Payload code for "too many requests"
pub const CODE_RATE_LIMITED: i64 = 1005;

/// Walks `path` through nested objects and returns the value at the end
///
/// An empty path returns `payload` itself. Any missing key, or a non-object on
/// the way, yields `None`.
///
/// # Example
///
/// ```
/// use catalog_crawler::payload::get_nested;
/// use serde_json::json;
///
/// let payload = json!({"video": {"publish_date": "2023-03-01 00:00:00"}});
/// assert_eq!(
///     get_nested(&payload, &["video", "publish_date"]).and_then(|v| v.as_str()),
///     Some("2023-03-01 00:00:00")
/// );
/// assert!(get_nested(&payload, &["video", "missing"]).is_none());
/// ```
pub fn get_nested<'a>(payload: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(payload, |item, key| item.get(*key))
}

/// Returns the numeric `code` of a payload, if it carries one
///
/// Numeric strings are accepted as well, since some endpoints quote the code.
pub fn status_code(payload: &Value) -> Option<i64> {
    match payload.get("code")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Returns the payload `message`, if present
pub fn message(payload: &Value) -> Option<&str> {
    payload.get("message").and_then(Value::as_str)
}

/// Returns true if the payload is a "no such record" answer
pub fn is_not_found(payload: &Value) -> bool {
    status_code(payload) == Some(CODE_NOT_FOUND)
}

/// Returns true if the payload carries a truthy `code` field
///
/// Absent, `null`, `0`, `false` and empty strings count as "no error";
/// any other value counts as an error code.
pub fn has_error_code(payload: &Value) -> bool {
    match payload.get("code") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(true, |f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}
