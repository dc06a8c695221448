//! Named secret lookup.
//!
//! A secret is a flat JSON object of named fields, e.g.
//! `{"auth_token": "..."}` or `{"username": "...", "password": "...", "account": "..."}`.
//! Lookups are read-only, so one store can be shared by concurrent dispatches.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;

/// Errors produced by [`SecretStore`] lookups.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("secret '{name}' is unavailable: {reason}")]
    Unavailable { name: String, reason: String },

    #[error("secret '{name}' is not a JSON object: {reason}")]
    Malformed { name: String, reason: String },

    #[error("secret '{name}' has no field '{field}'")]
    MissingField { name: String, field: String },
}

impl SecretError {
    fn unavailable(name: &str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Field values of one secret. `Debug` never prints values.
#[derive(Clone)]
pub struct SecretFields {
    name: String,
    fields: BTreeMap<String, String>,
}

impl SecretFields {
    /// Parse a secret payload. Scalar values are kept as strings; `null`,
    /// arrays and nested objects are dropped.
    ///
    /// # Errors
    ///
    /// `Malformed` if `raw` is not a JSON object.
    pub fn from_json(name: &str, raw: &str) -> Result<Self, SecretError> {
        let malformed = |reason: String| SecretError::Malformed {
            name: name.to_string(),
            reason,
        };
        let value: Value = serde_json::from_str(raw).map_err(|e| malformed(e.to_string()))?;
        let Value::Object(map) = value else {
            return Err(malformed(format!("expected an object, got {value}")));
        };
        let fields = map
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k, s)),
                Value::Number(n) => Some((k, n.to_string())),
                Value::Bool(b) => Some((k, b.to_string())),
                _ => None,
            })
            .collect();
        Ok(Self {
            name: name.to_string(),
            fields,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// # Errors
    ///
    /// `MissingField` if the secret does not carry `field`.
    pub fn require(&self, field: &str) -> Result<&str, SecretError> {
        self.get(field).ok_or_else(|| SecretError::MissingField {
            name: self.name.clone(),
            field: field.to_string(),
        })
    }
}

impl std::fmt::Debug for SecretFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretFields")
            .field("name", &self.name)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Resolves a secret name to its fields.
#[allow(async_fn_in_trait)]
pub trait SecretStore: Send + Sync {
    /// # Errors
    ///
    /// `Unavailable` if the secret does not exist or cannot be read,
    /// `Malformed` if its payload is not a JSON object.
    async fn fetch(&self, name: &str) -> Result<SecretFields, SecretError>;
}

/// Reads secrets from environment variables.
///
/// Secret `matillion-prod` is read from `CONVEYOR_SECRET_MATILLION_PROD`:
/// the name is upper-cased and every non-alphanumeric character becomes `_`.
#[derive(Debug, Clone)]
pub struct EnvSecretStore {
    prefix: String,
}

impl Default for EnvSecretStore {
    fn default() -> Self {
        Self {
            prefix: "CONVEYOR_SECRET_".to_string(),
        }
    }
}

impl EnvSecretStore {
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn var_name(&self, secret: &str) -> String {
        let suffix: String = secret
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}{suffix}", self.prefix)
    }
}

impl SecretStore for EnvSecretStore {
    async fn fetch(&self, name: &str) -> Result<SecretFields, SecretError> {
        let var = self.var_name(name);
        let raw = std::env::var(&var)
            .map_err(|e| SecretError::unavailable(name, format!("{var}: {e}")))?;
        SecretFields::from_json(name, &raw)
    }
}

/// Reads secrets from `<dir>/<name>.json`.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SecretStore for FileSecretStore {
    async fn fetch(&self, name: &str) -> Result<SecretFields, SecretError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(SecretError::unavailable(name, "invalid secret name"));
        }
        let path = self.dir.join(format!("{name}.json"));
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SecretError::unavailable(name, format!("{}: {e}", path.display())))?;
        SecretFields::from_json(name, &raw)
    }
}
