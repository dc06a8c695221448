//! Parameterised SQL script execution.
//!
//! A script is fetched from object storage, its `{{ name }}` placeholders
//! are filled from the event's `params`, and the result is handed to a
//! [`SqlExecutor`] which reports one query id per executed statement.

mod store;

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::event::{parse_event, EventError};
use crate::secrets::{SecretError, SecretStore};

pub use store::{LocalObjectStore, ObjectStore};

pub const SCRIPT_EVENT_FIELDS: [&str; 7] = [
    "credential_name",
    "warehouse",
    "database",
    "schema",
    "bucket",
    "key",
    "params",
];

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.-]*)\s*\}\}").expect("valid placeholder regex")
});

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("invalid script event: {0}")]
    Validation(#[from] EventError),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error("cannot read object '{key}' from bucket '{bucket}': {reason}")]
    Object {
        bucket: String,
        key: String,
        reason: String,
    },

    #[error("parameter '{name}' must be a string, number or boolean")]
    InvalidParam { name: String },

    #[error("script execution failed: {0}")]
    Execution(String),
}

impl ScriptError {
    pub(crate) fn object(bucket: &str, key: &str, reason: impl Into<String>) -> Self {
        Self::Object {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptEvent {
    pub credential_name: String,
    pub warehouse: String,
    pub database: String,
    pub schema: String,
    pub bucket: String,
    pub key: String,
    pub params: Map<String, Value>,
}

impl ScriptEvent {
    /// # Errors
    ///
    /// `Validation` if a required field is missing or has the wrong type.
    pub fn from_value(event: &Value) -> Result<Self, ScriptError> {
        Ok(parse_event(event, &SCRIPT_EVENT_FIELDS)?)
    }
}

/// Where and as whom a script runs.
#[derive(Clone)]
pub struct SqlSession {
    pub username: String,
    pub password: String,
    pub account: String,
    pub warehouse: String,
    pub database: String,
    pub schema: String,
}

impl std::fmt::Debug for SqlSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlSession")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("account", &self.account)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .finish()
    }
}

/// Runs a multi-statement script against a warehouse.
#[allow(async_fn_in_trait)]
pub trait SqlExecutor {
    /// Execute every statement of `script` in order, returning the query id
    /// of each.
    async fn execute(&self, session: &SqlSession, script: &str) -> Result<Vec<String>, ScriptError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptResponse {
    #[serde(rename = "statusCode")]
    pub status_code: i32,
    pub sfqids: Vec<String>,
}

fn param_text(name: &str, value: &Value) -> Result<String, ScriptError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ScriptError::InvalidParam {
            name: name.to_string(),
        }),
    }
}

/// Replace `{{ name }}` with the value of `params[name]`.
/// Placeholders without a matching param are left as written.
///
/// # Errors
///
/// `InvalidParam` if a param used by the template is not a scalar.
pub fn render_template(template: &str, params: &Map<String, Value>) -> Result<String, ScriptError> {
    let mut bad = None;
    let rendered = PLACEHOLDER_RE.replace_all(template, |cap: &Captures<'_>| {
        match params.get(&cap[1]) {
            Some(value) => param_text(&cap[1], value).unwrap_or_else(|e| {
                bad.get_or_insert(e);
                String::new()
            }),
            None => cap[0].to_string(),
        }
    });
    match bad {
        Some(e) => Err(e),
        None => Ok(rendered.into_owned()),
    }
}

/// Validate `event`, fetch and render its script, and execute it.
///
/// # Errors
///
/// Any [`ScriptError`]; validation always happens before the secret lookup.
pub async fn handle_script_event<S, O, E>(
    event: &Value,
    secrets: &S,
    objects: &O,
    executor: &E,
) -> Result<ScriptResponse, ScriptError>
where
    S: SecretStore,
    O: ObjectStore,
    E: SqlExecutor,
{
    let event = ScriptEvent::from_value(event)?;
    let secret = secrets.fetch(&event.credential_name).await?;
    let session = SqlSession {
        username: secret.require("username")?.to_string(),
        password: secret.require("password")?.to_string(),
        account: secret.require("account")?.to_string(),
        warehouse: event.warehouse,
        database: event.database,
        schema: event.schema,
    };

    let template = objects.get_text(&event.bucket, &event.key).await?;
    let script = render_template(&template, &event.params)?;
    tracing::info!(
        bucket = event.bucket,
        key = event.key,
        warehouse = session.warehouse,
        "Executing script"
    );

    let sfqids = executor.execute(&session, &script).await?;
    tracing::info!(statements = sfqids.len(), "Script executed");
    Ok(ScriptResponse {
        status_code: 200,
        sfqids,
    })
}
