pub mod listing;
pub mod reviews;

pub use listing::*;
pub use reviews::*;

use serde_json::Value;

/// Pagination block shared by listing and review responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pagination {
    pub total: Option<u64>,
}

impl Pagination {
    pub(crate) fn from_result(result: Option<&Value>) -> Self {
        let pagination = result.and_then(|r| r.get("pagination"));
        Self {
            total: pagination.and_then(|p| p.get("total")).and_then(as_u64),
        }
    }
}

/// Read a string-ish field: plain strings, numbers, or `{ "name": .. }` objects.
pub(crate) fn text_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("name").and_then(|v| v.as_str()).map(str::to_string),
        _ => None,
    }
}

/// Numbers sometimes arrive as strings.
pub(crate) fn number_field(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_field_accepts_names_and_numbers() {
        let v = json!({ "a": "x", "b": 7, "c": { "code": "M", "name": "Male" }, "d": null });
        assert_eq!(text_field(&v, "a").as_deref(), Some("x"));
        assert_eq!(text_field(&v, "b").as_deref(), Some("7"));
        assert_eq!(text_field(&v, "c").as_deref(), Some("Male"));
        assert_eq!(text_field(&v, "d"), None);
        assert_eq!(text_field(&v, "missing"), None);
    }

    #[test]
    fn pagination_defaults() {
        let v = json!({ "pagination": { "total": "12" } });
        assert_eq!(Pagination::from_result(Some(&v)), Pagination { total: Some(12) });
        assert_eq!(Pagination::from_result(None), Pagination::default());
    }
}
