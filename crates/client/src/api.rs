//! REST API client for the GeoEngine HTTP endpoints.
//!
//! Wraps the control-plane API (health, project and tool listing, job
//! submission, status, output retrieval, cancellation) using [`reqwest`].

use async_trait::async_trait;
use geoengine_core::job::{Job, JobInvocation, OutputFile};
use geoengine_core::types::Project;
use reqwest::Url;

use crate::config::ClientConfig;
use crate::models::{
    ErrorBody, HealthStatus, JobSummary, OutputListing, SubmitJobRequest, SubmitJobResponse,
    ToolInfo,
};
use crate::service::{ServiceApi, ServiceClientError};

/// HTTP client for a single GeoEngine service.
#[derive(Debug, Clone)]
pub struct GeoEngineApi {
    client: reqwest::Client,
    base_url: Url,
}

impl GeoEngineApi {
    /// Create a client for the service at `base_url`, e.g.
    /// `http://localhost:9876`.
    pub fn new(base_url: &str) -> Result<Self, ServiceClientError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, ServiceClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ServiceClientError::Config(format!("invalid base URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceClientError::Config(format!(
                "base URL '{base_url}' cannot carry a path"
            )));
        }
        Ok(Self { client, base_url })
    }

    /// Create a client from [`ClientConfig`], applying its request timeout.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ServiceClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ServiceClientError::Config(e.to_string()))?;
        Self::with_client(client, &config.base_url())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ---- private helpers ----

    /// Build an endpoint URL from path segments. Segments are
    /// percent-encoded, so project names and job ids may contain any
    /// characters.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, ServiceClientError> {
        tracing::debug!(%url, "GET");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;
        Self::parse_response(&url, response).await
    }

    /// Ensure the response has a success status code. On failure the
    /// message is the `error` field of a JSON body when there is one,
    /// else the raw body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ServiceClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            let message = match serde_json::from_str::<ErrorBody>(&body) {
                Ok(parsed) => parsed.error,
                Err(_) if body.trim().is_empty() => status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string(),
                Err(_) => body,
            };
            return Err(ServiceClientError::Service {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        url: &Url,
        response: reqwest::Response,
    ) -> Result<T, ServiceClientError> {
        let response = Self::ensure_success(response).await?;
        response.json::<T>().await.map_err(|e| transport_error(url, e))
    }
}

/// Classify a [`reqwest::Error`]. Body decoding failures are `Decode`;
/// everything else means the service could not be reached.
fn transport_error(url: &Url, err: reqwest::Error) -> ServiceClientError {
    let mut origin = url.clone();
    origin.set_path("");
    origin.set_query(None);

    if err.is_decode() {
        ServiceClientError::Decode {
            url: url.to_string(),
            reason: err.to_string(),
        }
    } else {
        ServiceClientError::Unreachable {
            url: origin.as_str().trim_end_matches('/').to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl ServiceApi for GeoEngineApi {
    async fn health_check(&self) -> Result<HealthStatus, ServiceClientError> {
        self.get(self.endpoint(&["api", "health"])).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>, ServiceClientError> {
        self.get(self.endpoint(&["api", "projects"])).await
    }

    async fn get_project(&self, name: &str) -> Result<serde_json::Value, ServiceClientError> {
        self.get(self.endpoint(&["api", "projects", name])).await
    }

    async fn list_tools(&self, project: &str) -> Result<Vec<ToolInfo>, ServiceClientError> {
        self.get(self.endpoint(&["api", "projects", project, "tools"]))
            .await
    }

    async fn submit_job(&self, invocation: &JobInvocation) -> Result<String, ServiceClientError> {
        let url = self.endpoint(&["api", "jobs"]);
        let body = SubmitJobRequest::from(invocation);

        let response = self
            .client
            .post(url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let submitted: SubmitJobResponse = Self::parse_response(&url, response).await?;
        tracing::info!(
            job_id = %submitted.id,
            project = %invocation.project,
            tool = %invocation.tool,
            "Job submitted to GeoEngine",
        );
        Ok(submitted.id)
    }

    async fn get_status(&self, job_id: &str) -> Result<Job, ServiceClientError> {
        let mut job: Job = self.get(self.endpoint(&["api", "jobs", job_id])).await?;
        if job.id.is_empty() {
            job.id = job_id.to_string();
        }
        Ok(job)
    }

    async fn get_output(&self, job_id: &str) -> Result<Vec<OutputFile>, ServiceClientError> {
        let listing: OutputListing = self
            .get(self.endpoint(&["api", "jobs", job_id, "output"]))
            .await?;
        Ok(listing.files)
    }

    async fn cancel(&self, job_id: &str) -> Result<(), ServiceClientError> {
        let url = self.endpoint(&["api", "jobs", job_id]);
        let response = self
            .client
            .delete(url.clone())
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        // The body echoes the job; only the status code matters here.
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn list_jobs(&self, all: bool) -> Result<Vec<JobSummary>, ServiceClientError> {
        let mut url = self.endpoint(&["api", "jobs"]);
        if all {
            url.set_query(Some("all=true"));
        }
        self.get(url).await
    }
}
