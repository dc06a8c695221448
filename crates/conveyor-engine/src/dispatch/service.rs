//! Job execution service transport.

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response, Url};
use serde_json::Value;

use super::error::ServiceError;
use super::settings::DispatchSettings;
use super::JobRequest;

/// Remote job execution service.
///
/// Implementations perform exactly one request per call and never retry;
/// the dispatcher decides what happens after a failure.
#[allow(async_fn_in_trait)]
pub trait JobService {
    /// Start a run of the job named by `request`. Returns the parsed response body.
    async fn submit(&self, request: &JobRequest) -> Result<Value, ServiceError>;

    /// Fetch the status document of a job run.
    async fn status(&self, request: &JobRequest, job_run_id: &str) -> Result<Value, ServiceError>;
}

/// [`JobService`] over the service's REST API.
#[derive(Debug, Clone)]
pub struct HttpJobService {
    client: Client,
    base_url: Url,
}

impl HttpJobService {
    /// # Errors
    ///
    /// `Url` if `base_url` is not an absolute http(s) URL, `Transport` if the
    /// HTTP client cannot be built.
    pub fn new(settings: &DispatchSettings) -> Result<Self, ServiceError> {
        let base_url = Url::parse(&settings.base_url)
            .map_err(|e| ServiceError::Url(format!("{}: {e}", settings.base_url)))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(ServiceError::Url(format!(
                "{}: expected an http(s) URL",
                settings.base_url
            )));
        }
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ServiceError::Url(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `POST .../group/name/{g}/project/name/{p}/version/name/{v}/job/name/{j}/run`
    pub fn submit_url(&self, request: &JobRequest) -> Result<Url, ServiceError> {
        self.endpoint(&[
            "rest",
            "v1",
            "group",
            "name",
            request.group(),
            "project",
            "name",
            request.project(),
            "version",
            "name",
            request.version(),
            "job",
            "name",
            request.job(),
            "run",
        ])
    }

    /// `GET .../group/name/{g}/project/name/{p}/task/id/{id}`
    pub fn status_url(&self, request: &JobRequest, job_run_id: &str) -> Result<Url, ServiceError> {
        self.endpoint(&[
            "rest",
            "v1",
            "group",
            "name",
            request.group(),
            "project",
            "name",
            request.project(),
            "task",
            "id",
            job_run_id,
        ])
    }

    fn basic_auth(request: &JobRequest) -> String {
        format!("Basic {}", request.auth_token())
    }
}

async fn read_json(response: Response) -> Result<Value, ServiceError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ServiceError::Status {
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|e| ServiceError::Decode(e.to_string()))
}

impl JobService for HttpJobService {
    async fn submit(&self, request: &JobRequest) -> Result<Value, ServiceError> {
        let url = self.submit_url(request)?;
        tracing::debug!(%url, "Submitting job");
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, Self::basic_auth(request))
            .send()
            .await?;
        read_json(response).await
    }

    async fn status(&self, request: &JobRequest, job_run_id: &str) -> Result<Value, ServiceError> {
        let url = self.status_url(request, job_run_id)?;
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, Self::basic_auth(request))
            .send()
            .await?;
        read_json(response).await
    }
}
