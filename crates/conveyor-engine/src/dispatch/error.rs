use std::time::Duration;

use serde_json::Value;

use crate::event::EventError;
use crate::secrets::SecretError;

/// Failure of a single request to the job execution service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response is not valid JSON: {0}")]
    Decode(String),

    #[error("invalid service URL: {0}")]
    Url(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Invalid dispatch settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("poll interval must be at least 1 second")]
    ZeroPollInterval,
}

/// Errors that end a job dispatch.
///
/// A submission response without a job-run id is not an error; see
/// [`JobOutcome::NoJobRunId`](super::JobOutcome::NoJobRunId).
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("invalid dispatch event: {0}")]
    Validation(#[from] EventError),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error("job submission failed: {0}")]
    Submission(#[source] ServiceError),

    #[error("status query for job run '{job_run_id}' failed: {source}")]
    Polling {
        job_run_id: String,
        #[source]
        source: ServiceError,
    },

    #[error("job run '{job_run_id}' reported failure state '{state}'")]
    JobFailed {
        job_run_id: String,
        state: String,
        status_response: Value,
    },

    #[error("dispatch cancelled")]
    Cancelled,

    #[error("dispatch did not finish within {0:?}")]
    DeadlineExceeded(Duration),
}
