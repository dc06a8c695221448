//! Dispatch entry point: event in, response document out.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{DispatchError, JobDispatcher, JobOutcome, JobRequest, JobService};
use crate::event::parse_event;
use crate::secrets::SecretStore;

pub const DISPATCH_EVENT_FIELDS: [&str; 5] = ["credential_name", "group", "project", "job", "version"];

/// Secret field holding the service's basic-auth token.
pub const AUTH_TOKEN_FIELD: &str = "auth_token";

const NO_JOB_RUN_ID: &str = "No job run id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchEvent {
    pub credential_name: String,
    pub group: String,
    pub project: String,
    pub job: String,
    pub version: String,
}

impl DispatchEvent {
    /// # Errors
    ///
    /// `Validation` if the event is empty, lacks a required field or has a
    /// non-string field.
    pub fn from_value(event: &Value) -> Result<Self, DispatchError> {
        Ok(parse_event(event, &DISPATCH_EVENT_FIELDS)?)
    }

    #[must_use]
    pub fn into_request(self, auth_token: impl Into<String>) -> JobRequest {
        JobRequest::new(self.group, self.project, self.job, self.version, auth_token)
    }
}

/// Response document of a dispatch invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DispatchResponse {
    Completed {
        #[serde(rename = "statusCode")]
        status_code: i32,
        run_response: Value,
        status_response: Value,
    },
    NoJobRunId {
        #[serde(rename = "statusCode")]
        status_code: i32,
        #[serde(rename = "errorMsg")]
        error_msg: String,
    },
}

impl DispatchResponse {
    #[must_use]
    pub fn status_code(&self) -> i32 {
        match self {
            Self::Completed { status_code, .. } | Self::NoJobRunId { status_code, .. } => {
                *status_code
            }
        }
    }
}

impl From<JobOutcome> for DispatchResponse {
    fn from(outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Completed {
                submission,
                status_response,
                ..
            } => Self::Completed {
                status_code: 200,
                run_response: submission.response,
                status_response,
            },
            JobOutcome::NoJobRunId { .. } => Self::NoJobRunId {
                status_code: -99,
                error_msg: NO_JOB_RUN_ID.to_string(),
            },
        }
    }
}

/// Validate `event`, resolve its credential and run the dispatch.
///
/// Validation happens before the secret lookup, and the secret lookup before
/// any request to the service. A cancelled token stops the secret lookup.
///
/// # Errors
///
/// `Validation`, `Secret`, `Cancelled`, or any error from
/// [`JobDispatcher::dispatch`].
pub async fn handle_dispatch_event<S, J>(
    event: &Value,
    secrets: &S,
    dispatcher: &JobDispatcher<J>,
    cancel: &CancellationToken,
) -> Result<DispatchResponse, DispatchError>
where
    S: SecretStore,
    J: JobService,
{
    let event = DispatchEvent::from_value(event)?;
    if cancel.is_cancelled() {
        return Err(DispatchError::Cancelled);
    }
    let secret = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(DispatchError::Cancelled),
        fetched = secrets.fetch(&event.credential_name) => fetched?,
    };
    let token = secret.require(AUTH_TOKEN_FIELD)?.to_string();
    let request = event.into_request(token);
    let outcome = dispatcher.dispatch(&request, cancel).await?;
    Ok(outcome.into())
}
