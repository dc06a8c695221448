//! Validation of structured invocation events.
//!
//! Entry points receive a JSON object and must reject it before any secret
//! lookup or network call when a required field is absent.

use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    #[error("all job parameters missing")]
    Empty,
    #[error("missing required field(s): {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("invalid event: {0}")]
    Invalid(String),
}

/// Check that every name in `required` is present and non-null in `event`.
///
/// # Errors
///
/// `Empty` when the event is `null` or not an object, `MissingFields`
/// listing every absent field otherwise.
pub fn validate_event(event: &Value, required: &[&str]) -> Result<(), EventError> {
    let Some(map) = event.as_object() else {
        return Err(EventError::Empty);
    };
    let missing: Vec<String> = required
        .iter()
        .filter(|key| map.get(**key).map_or(true, Value::is_null))
        .map(|key| (*key).to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EventError::MissingFields(missing))
    }
}

/// Validate then deserialize an event into its typed form.
///
/// # Errors
///
/// Any [`validate_event`] failure, or `Invalid` when a field has the wrong type.
pub fn parse_event<T: DeserializeOwned>(event: &Value, required: &[&str]) -> Result<T, EventError> {
    validate_event(event, required)?;
    serde_json::from_value(event.clone()).map_err(|e| EventError::Invalid(e.to_string()))
}
