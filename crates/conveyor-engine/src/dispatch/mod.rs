//! Remote job dispatch: submit once, then poll until the run succeeds.
//!
//! ```text
//! submit ──(no id)──────────────────────────► NoJobRunId
//!    │
//!    ▼
//! Pending ──sleep(interval)──► status ──"SUCCESS"──► Succeeded
//!    ▲                            │
//!    └──────(any other state)─────┘
//! ```
//!
//! Transport or decode failures end the dispatch with an error and are never
//! retried. The caller's [`CancellationToken`] and the optional deadline are
//! raced against every sleep and every in-flight request.

mod error;
mod event;
mod service;
mod settings;

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub use error::{DispatchError, ServiceError, SettingsError};
pub use event::{handle_dispatch_event, DispatchEvent, DispatchResponse, DISPATCH_EVENT_FIELDS};
pub use service::{HttpJobService, JobService};
pub use settings::{DispatchSettings, DEFAULT_POLL_INTERVAL, SUCCESS_STATE};

/// Everything needed to submit one job run. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct JobRequest {
    group: String,
    project: String,
    job: String,
    version: String,
    auth_token: String,
}

impl JobRequest {
    pub fn new(
        group: impl Into<String>,
        project: impl Into<String>,
        job: impl Into<String>,
        version: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            project: project.into(),
            job: job.into(),
            version: version.into(),
            auth_token: auth_token.into(),
        }
    }

    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    #[must_use]
    pub fn job(&self) -> &str {
        &self.job
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }
}

impl std::fmt::Debug for JobRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRequest")
            .field("group", &self.group)
            .field("project", &self.project)
            .field("job", &self.job)
            .field("version", &self.version)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

/// An accepted submission and the job-run id it yielded.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSubmission {
    pub job_run_id: String,
    pub response: Value,
}

/// Poll-loop state of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Pending,
    Succeeded,
    /// A configured failure state was reported.
    Failed,
    /// Polling stopped on an error or cancellation; the job's fate is unknown.
    FailedUnknown,
}

impl PollState {
    /// Next state after the service reports `reported` (`None` when the
    /// status document carries no `state`).
    #[must_use]
    pub fn observe(self, reported: Option<&str>, settings: &DispatchSettings) -> Self {
        if self != Self::Pending {
            return self;
        }
        match reported {
            Some(SUCCESS_STATE) => Self::Succeeded,
            Some(state) if settings.is_failure_state(state) => Self::Failed,
            _ => Self::Pending,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self != Self::Pending
    }
}

/// How a dispatch ended when no error occurred.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed {
        submission: JobSubmission,
        status_response: Value,
        /// Number of status queries made.
        polls: u32,
    },
    /// The service accepted the submission but returned no job-run id.
    NoJobRunId { run_response: Value },
}

/// Extract the job-run id from a submission response.
///
/// The id may be a JSON string or number; absent, `null` or empty means none.
#[must_use]
pub fn job_run_id(run_response: &Value) -> Option<String> {
    match run_response.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Drives one [`JobService`] through the submit/poll protocol.
#[derive(Debug, Clone)]
pub struct JobDispatcher<S> {
    service: S,
    settings: DispatchSettings,
}

impl<S: JobService> JobDispatcher<S> {
    pub fn new(service: S, settings: DispatchSettings) -> Self {
        Self { service, settings }
    }

    /// Race `fut` against cancellation and the deadline. Cancellation wins
    /// ties so a cancelled dispatch never issues another request.
    async fn guarded<F: Future>(
        &self,
        fut: F,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<F::Output, DispatchError> {
        let expired = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(DispatchError::Cancelled),
            () = expired => Err(DispatchError::DeadlineExceeded(
                self.settings.deadline().unwrap_or(Duration::ZERO),
            )),
            out = fut => Ok(out),
        }
    }

    /// Submit `request` once and wait for the run to reach `SUCCESS`.
    ///
    /// # Errors
    ///
    /// `Submission` or `Polling` on a service failure, `JobFailed` when a
    /// configured failure state is reported, `Cancelled` or
    /// `DeadlineExceeded` when the wait is aborted.
    pub async fn dispatch(
        &self,
        request: &JobRequest,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome, DispatchError> {
        if cancel.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }
        let deadline = self.settings.deadline().map(|d| Instant::now() + d);

        let run_response = self
            .guarded(self.service.submit(request), cancel, deadline)
            .await?
            .map_err(DispatchError::Submission)?;

        let Some(job_run_id) = job_run_id(&run_response) else {
            tracing::warn!(
                group = request.group(),
                job = request.job(),
                "Submission returned no job run id"
            );
            return Ok(JobOutcome::NoJobRunId { run_response });
        };
        tracing::info!(
            job_run_id,
            group = request.group(),
            project = request.project(),
            job = request.job(),
            "Job submitted"
        );

        let interval = self.settings.poll_interval();
        let mut state = PollState::Pending;
        let mut polls: u32 = 0;
        loop {
            let polled = match self
                .guarded(tokio::time::sleep(interval), cancel, deadline)
                .await
            {
                Ok(()) => {
                    polls += 1;
                    self.guarded(self.service.status(request, &job_run_id), cancel, deadline)
                        .await
                }
                Err(e) => Err(e),
            };

            let status_response = match polled {
                Ok(Ok(body)) => body,
                Ok(Err(source)) => {
                    state = PollState::FailedUnknown;
                    tracing::error!(job_run_id, attempt = polls, ?state, error = %source, "Status query failed");
                    return Err(DispatchError::Polling { job_run_id, source });
                }
                Err(e) => {
                    state = PollState::FailedUnknown;
                    tracing::warn!(job_run_id, attempt = polls, ?state, error = %e, "Polling aborted");
                    return Err(e);
                }
            };

            let reported = status_response.get("state").and_then(Value::as_str);
            state = state.observe(reported, &self.settings);
            tracing::debug!(job_run_id, attempt = polls, state = reported, "Polled job status");

            match state {
                PollState::Succeeded => {
                    tracing::info!(job_run_id, polls, "Job run succeeded");
                    return Ok(JobOutcome::Completed {
                        submission: JobSubmission {
                            job_run_id,
                            response: run_response,
                        },
                        status_response,
                        polls,
                    });
                }
                PollState::Failed => {
                    let state = reported.unwrap_or_default().to_string();
                    tracing::error!(job_run_id, state, "Job run failed");
                    return Err(DispatchError::JobFailed {
                        job_run_id,
                        state,
                        status_response,
                    });
                }
                PollState::Pending | PollState::FailedUnknown => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scripted fake: one submit result, then status results in order.
    /// Once the script runs out, every status query hangs forever.
    #[derive(Default)]
    struct FakeService {
        submit_result: Mutex<Option<Result<Value, ServiceError>>>,
        statuses: Mutex<VecDeque<Result<Value, ServiceError>>>,
        submits: AtomicUsize,
        status_calls: AtomicUsize,
        hung_request_dropped: Arc<AtomicBool>,
    }

    impl FakeService {
        fn new(submit: Value, statuses: Vec<Value>) -> Self {
            Self {
                submit_result: Mutex::new(Some(Ok(submit))),
                statuses: Mutex::new(statuses.into_iter().map(Ok).collect()),
                ..Self::default()
            }
        }

        fn failing_submit(err: ServiceError) -> Self {
            Self {
                submit_result: Mutex::new(Some(Err(err))),
                ..Self::default()
            }
        }

        fn push_status(&self, result: Result<Value, ServiceError>) {
            self.statuses.lock().unwrap().push_back(result);
        }
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    impl JobService for &FakeService {
        async fn submit(&self, _request: &JobRequest) -> Result<Value, ServiceError> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            self.submit_result
                .lock()
                .unwrap()
                .take()
                .expect("submit called more than once")
        }

        async fn status(&self, _request: &JobRequest, job_run_id: &str) -> Result<Value, ServiceError> {
            assert_eq!(job_run_id, "run-1");
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let next = self.statuses.lock().unwrap().pop_front();
            match next {
                Some(result) => result,
                None => {
                    let _guard = DropFlag(Arc::clone(&self.hung_request_dropped));
                    std::future::pending().await
                }
            }
        }
    }

    fn request() -> JobRequest {
        JobRequest::new("G", "P", "J", "V", "token")
    }

    fn settings() -> DispatchSettings {
        DispatchSettings::new("http://unused")
    }

    fn states(names: &[&str]) -> Vec<Value> {
        names.iter().map(|s| json!({ "state": s })).collect()
    }

    #[test]
    fn test_job_run_id_accepts_strings_and_numbers() {
        assert_eq!(job_run_id(&json!({"id": "run-1"})), Some("run-1".into()));
        assert_eq!(job_run_id(&json!({"id": 4321})), Some("4321".into()));
        assert_eq!(job_run_id(&json!({"id": ""})), None);
        assert_eq!(job_run_id(&json!({"id": null})), None);
        assert_eq!(job_run_id(&json!({})), None);
        assert_eq!(job_run_id(&json!("run-1")), None);
    }

    #[test]
    fn test_poll_state_transitions() {
        let s = settings().with_failure_states(["FAILED"]);
        assert_eq!(PollState::Pending.observe(Some("RUNNING"), &s), PollState::Pending);
        assert_eq!(PollState::Pending.observe(None, &s), PollState::Pending);
        assert_eq!(PollState::Pending.observe(Some("SUCCESS"), &s), PollState::Succeeded);
        assert_eq!(PollState::Pending.observe(Some("FAILED"), &s), PollState::Failed);
        assert_eq!(PollState::Succeeded.observe(Some("FAILED"), &s), PollState::Succeeded);
        assert_eq!(
            PollState::Pending.observe(Some("FAILED"), &settings()),
            PollState::Pending
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_then_success_polls_twice() {
        let fake = FakeService::new(json!({"id": "run-1"}), states(&["RUNNING", "SUCCESS"]));
        let dispatcher = JobDispatcher::new(&fake, settings());
        let started = Instant::now();

        let outcome = dispatcher
            .dispatch(&request(), &CancellationToken::new())
            .await
            .unwrap();

        let JobOutcome::Completed {
            submission,
            status_response,
            polls,
        } = outcome
        else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(submission.job_run_id, "run-1");
        assert_eq!(submission.response, json!({"id": "run-1"}));
        assert_eq!(status_response, json!({"state": "SUCCESS"}));
        assert_eq!(polls, 2);
        assert_eq!(fake.submits.load(Ordering::SeqCst), 1);
        assert_eq!(fake.status_calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_id_never_polls() {
        let fake = FakeService::new(json!({}), vec![]);
        let outcome = JobDispatcher::new(&fake, settings())
            .dispatch(&request(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::NoJobRunId { run_response: json!({}) });
        assert_eq!(fake.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_states_keep_polling_by_default() {
        let fake = FakeService::new(
            json!({"id": "run-1"}),
            states(&["QUEUED", "FAILED", "CANCELLED", "SUCCESS"]),
        );
        let outcome = JobDispatcher::new(&fake, settings())
            .dispatch(&request(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, JobOutcome::Completed { polls: 4, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_failure_state_ends_dispatch() {
        let fake = FakeService::new(json!({"id": "run-1"}), states(&["RUNNING", "FAILED", "SUCCESS"]));
        let err = JobDispatcher::new(&fake, settings().with_failure_states(["FAILED"]))
            .dispatch(&request(), &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            DispatchError::JobFailed { job_run_id, state, status_response } => {
                assert_eq!(job_run_id, "run-1");
                assert_eq!(state, "FAILED");
                assert_eq!(status_response, json!({"state": "FAILED"}));
            }
            other => panic!("expected JobFailed, got {other:?}"),
        }
        assert_eq!(fake.status_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_error_is_not_retried() {
        let fake = FakeService::failing_submit(ServiceError::Status {
            status: 500,
            body: "boom".into(),
        });
        let err = JobDispatcher::new(&fake, settings())
            .dispatch(&request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Submission(ServiceError::Status { status: 500, .. })
        ));
        assert_eq!(fake.submits.load(Ordering::SeqCst), 1);
        assert_eq!(fake.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_error_aborts_loop() {
        let fake = FakeService::new(json!({"id": "run-1"}), states(&["RUNNING"]));
        fake.push_status(Err(ServiceError::Decode("expected value".into())));
        fake.push_status(Ok(json!({"state": "SUCCESS"})));

        let err = JobDispatcher::new(&fake, settings())
            .dispatch(&request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Polling { ref job_run_id, source: ServiceError::Decode(_) } if job_run_id == "run-1"
        ));
        assert_eq!(fake.submits.load(Ordering::SeqCst), 1);
        assert_eq!(fake.status_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_cancelled_token_skips_submission() {
        let fake = FakeService::new(json!({"id": "run-1"}), vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = JobDispatcher::new(&fake, settings())
            .dispatch(&request(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Cancelled));
        assert_eq!(fake.submits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_sleep_stops_within_one_interval() {
        let fake = FakeService::new(json!({"id": "run-1"}), states(&["RUNNING"; 10]));
        let dispatcher = JobDispatcher::new(&fake, settings());
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let req = request();

        let (result, ()) = tokio::join!(dispatcher.dispatch(&req, &cancel), async {
            tokio::time::sleep(Duration::from_secs(25)).await;
            cancel.cancel();
        });

        assert!(matches!(result, Err(DispatchError::Cancelled)));
        assert_eq!(fake.status_calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_releases_in_flight_request() {
        let fake = FakeService::new(json!({"id": "run-1"}), states(&["RUNNING"]));
        let dispatcher = JobDispatcher::new(&fake, settings());
        let cancel = CancellationToken::new();
        let req = request();

        let (result, ()) = tokio::join!(dispatcher.dispatch(&req, &cancel), async {
            // second query starts at t=20s and never answers
            tokio::time::sleep(Duration::from_secs(21)).await;
            cancel.cancel();
        });

        assert!(matches!(result, Err(DispatchError::Cancelled)));
        assert_eq!(fake.status_calls.load(Ordering::SeqCst), 2);
        assert!(fake.hung_request_dropped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_aborts_unbounded_loop() {
        let fake = FakeService::new(json!({"id": "run-1"}), states(&["RUNNING"; 100]));
        let limit = Duration::from_secs(35);
        let err = JobDispatcher::new(&fake, settings().with_deadline(Some(limit)))
            .dispatch(&request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::DeadlineExceeded(d) if d == limit));
        assert_eq!(fake.status_calls.load(Ordering::SeqCst), 3);
    }
}
