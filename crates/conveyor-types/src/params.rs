//! Free-form stage parameters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StageError;

/// Open mapping of parameter names to arbitrary JSON values.
///
/// Stages pull the keys they need through the typed accessors, which turn a
/// missing or mistyped key into a [`StageError`] of category `config`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageParams(Map<String, Value>);

impl StageParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds params from a JSON value; `null` yields an empty mapping.
    ///
    /// # Errors
    ///
    /// Returns a config error when `value` is neither an object nor `null`.
    pub fn from_value(value: Value) -> Result<Self, StageError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(StageError::config(
                "INVALID_PARAMS",
                format!("stage params must be a mapping, got {other}"),
            )),
        }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// # Errors
    ///
    /// Returns `MISSING_PARAM` if absent, `INVALID_PARAM` if not a string.
    pub fn require_str(&self, key: &str) -> Result<&str, StageError> {
        self.optional_str(key)?
            .ok_or_else(|| StageError::missing_param(key))
    }

    /// # Errors
    ///
    /// Returns `INVALID_PARAM` if present but not a string.
    pub fn optional_str(&self, key: &str) -> Result<Option<&str>, StageError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(invalid(key, "a string", other)),
        }
    }

    /// # Errors
    ///
    /// Returns `INVALID_PARAM` if present but not a boolean.
    pub fn optional_bool(&self, key: &str) -> Result<Option<bool>, StageError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(invalid(key, "a boolean", other)),
        }
    }

    /// # Errors
    ///
    /// Returns `INVALID_PARAM` if present but not a non-negative integer.
    pub fn optional_u64(&self, key: &str) -> Result<Option<u64>, StageError> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_u64()
                .map(Some)
                .ok_or_else(|| invalid(key, "a non-negative integer", v)),
        }
    }

    /// Reads a list of strings. A single string is accepted as a one-element list.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_PARAM` if present with any other shape.
    pub fn optional_str_list(&self, key: &str) -> Result<Option<Vec<String>>, StageError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(invalid(key, "a list of strings", other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(other) => Err(invalid(key, "a list of strings", other)),
        }
    }
}

fn invalid(key: &str, expected: &str, got: &Value) -> StageError {
    StageError::config(
        "INVALID_PARAM",
        format!("parameter '{key}' must be {expected}, got {got}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_require_str_reports_missing_key() {
        let params = StageParams::new().with("delimiter", ",");
        let err = params.require_str("path").unwrap_err();
        assert_eq!(err.code, "MISSING_PARAM");
    }

    #[test]
    fn test_null_value_counts_as_missing() {
        let params = StageParams::from_value(json!({"path": null})).unwrap();
        assert!(!params.contains("path"));
        assert!(params.require_str("path").is_err());
    }

    #[test]
    fn test_mistyped_value_is_invalid_param() {
        let params = StageParams::new().with("has_header", "yes");
        let err = params.optional_bool("has_header").unwrap_err();
        assert_eq!(err.code, "INVALID_PARAM");
    }

    #[test]
    fn test_string_list_accepts_scalar_and_array() {
        let params = StageParams::from_value(json!({"a": "x", "b": ["y", "z"]})).unwrap();
        assert_eq!(params.optional_str_list("a").unwrap(), Some(vec!["x".to_string()]));
        assert_eq!(
            params.optional_str_list("b").unwrap(),
            Some(vec!["y".to_string(), "z".to_string()])
        );
        assert_eq!(params.optional_str_list("c").unwrap(), None);
    }

    #[test]
    fn test_string_list_rejects_mixed_items() {
        let params = StageParams::from_value(json!({"cols": ["a", 1]})).unwrap();
        assert!(params.optional_str_list("cols").is_err());
    }

    #[test]
    fn test_from_value_rejects_scalars() {
        assert!(StageParams::from_value(json!(42)).is_err());
        assert!(StageParams::from_value(Value::Null).unwrap().is_empty());
    }
}
