//! Field access over application data.
//!
//! The engine only ever reads named fields (`check_key` / `skip_key` targets)
//! or hands the whole object to a matcher. `FlowData` is the narrow seam that
//! makes any data type usable with key-based completion rules.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

/// Read access to named fields of an application data snapshot.
///
/// Implement this for your own data type to use `check_key` and `skip_key`
/// rules. Types that only use matcher closures can return `false`.
pub trait FlowData {
    /// Whether the field named `key` is present and truthy.
    fn field_truthy(&self, key: &str) -> bool;
}

/// Truthiness of a JSON value, following JavaScript rules.
///
/// `null`, `false`, `0`, `NaN` and `""` are falsy. Everything else,
/// including empty arrays and empty objects, is truthy.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl FlowData for Value {
    fn field_truthy(&self, key: &str) -> bool {
        self.get(key).is_some_and(truthy)
    }
}

impl FlowData for Map<String, Value> {
    fn field_truthy(&self, key: &str) -> bool {
        self.get(key).is_some_and(truthy)
    }
}

impl FlowData for HashMap<String, Value> {
    fn field_truthy(&self, key: &str) -> bool {
        self.get(key).is_some_and(truthy)
    }
}

impl FlowData for BTreeMap<String, Value> {
    fn field_truthy(&self, key: &str) -> bool {
        self.get(key).is_some_and(truthy)
    }
}

impl FlowData for HashMap<String, bool> {
    fn field_truthy(&self, key: &str) -> bool {
        self.get(key).copied().unwrap_or(false)
    }
}

impl<T: FlowData + ?Sized> FlowData for &T {
    fn field_truthy(&self, key: &str) -> bool {
        (**self).field_truthy(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthy_follows_js_rules() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!(0.0)));
        assert!(!truthy(&json!("")));

        assert!(truthy(&json!(true)));
        assert!(truthy(&json!(-1)));
        assert!(truthy(&json!(0.5)));
        assert!(truthy(&json!("no")));
        assert!(truthy(&json!([])));
        assert!(truthy(&json!({})));
    }

    #[test]
    fn test_value_field_lookup() {
        let data = json!({ "loggedIn": true, "userId": "", "assets": [] });
        assert!(data.field_truthy("loggedIn"));
        assert!(!data.field_truthy("userId"));
        assert!(data.field_truthy("assets"));
        assert!(!data.field_truthy("missing"));
    }

    #[test]
    fn test_non_object_value_has_no_fields() {
        assert!(!json!(true).field_truthy("anything"));
        assert!(!json!([1, 2]).field_truthy("0"));
    }

    #[test]
    fn test_bool_map_lookup() {
        let mut data = HashMap::new();
        data.insert("done".to_string(), true);
        data.insert("skipped".to_string(), false);
        assert!(data.field_truthy("done"));
        assert!(!data.field_truthy("skipped"));
        assert!(!data.field_truthy("missing"));
    }
}
