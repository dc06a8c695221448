//! Structured error model for stage operations.
//!
//! [`StageError`] carries a classification, a stable machine-readable code,
//! and optional diagnostic details. Construct via category-specific factory
//! methods.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad classification of a stage error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing or invalid stage parameters.
    Config,
    /// File-system or transport failure while reading or writing data.
    Io,
    /// Input data is malformed or does not satisfy the stage's expectations.
    Data,
    /// Schema mismatch or incompatibility.
    Schema,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Io => "io",
            Self::Data => "data",
            Self::Schema => "schema",
        };
        f.write_str(s)
    }
}

/// Validation check outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Success,
    Failed,
}

/// Result of a stage or pipeline validation check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub message: String,
}

impl ValidationResult {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Failed,
            message: message.into(),
        }
    }
}

/// Structured error from a stage operation.
///
/// Construct via category-specific factory methods (e.g., [`StageError::config`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{category}] {code}: {message}")]
pub struct StageError {
    pub category: ErrorCategory,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl StageError {
    fn new(category: ErrorCategory, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Configuration error: a required parameter is absent or has the wrong shape.
    #[must_use]
    pub fn config(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Config, code, message)
    }

    /// Required parameter `key` was not supplied.
    #[must_use]
    pub fn missing_param(key: &str) -> Self {
        Self::config("MISSING_PARAM", format!("required parameter '{key}' is missing"))
    }

    /// I/O error while reading or writing stage data.
    #[must_use]
    pub fn io(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Io, code, message)
    }

    /// Data error.
    #[must_use]
    pub fn data(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Data, code, message)
    }

    /// Schema mismatch error.
    #[must_use]
    pub fn schema(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Schema, code, message)
    }

    /// Attach structured diagnostic details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_param_is_config_error() {
        let err = StageError::missing_param("path");
        assert_eq!(err.category, ErrorCategory::Config);
        assert_eq!(err.code, "MISSING_PARAM");
        assert!(err.message.contains("'path'"));
    }

    #[test]
    fn test_details_survive_serialization() {
        let err = StageError::io("READ_FAILED", "permission denied")
            .with_details(serde_json::json!({"path": "/data/in.csv"}));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["category"], "io");
        assert_eq!(json["details"]["path"], "/data/in.csv");
    }

    #[test]
    fn test_display_format() {
        let err = StageError::config("BAD_DELIMITER", "delimiter must be one byte");
        assert_eq!(
            err.to_string(),
            "[config] BAD_DELIMITER: delimiter must be one byte"
        );
    }
}
