//! The service capability consumed by the registry and job lifecycle.

use async_trait::async_trait;
use geoengine_core::job::{Job, JobInvocation, OutputFile};
use geoengine_core::types::Project;

use crate::models::{HealthStatus, JobSummary, ToolInfo};

/// Errors from the GeoEngine control-plane client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceClientError {
    /// The endpoint could not be reached (connection refused, DNS,
    /// timeout, reset).
    #[error("Cannot connect to GeoEngine service at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    /// The service answered with a non-2xx status code.
    #[error("GeoEngine service error ({status}): {message}")]
    Service { status: u16, message: String },

    /// A 2xx response whose body did not match the expected shape.
    #[error("Malformed response from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// The client could not be constructed from its configuration.
    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl ServiceClientError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }

    /// Whether the failure says nothing about the job itself and the
    /// same request may succeed later: the endpoint was unreachable, or
    /// the service reported a server-side (5xx) error.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unreachable { .. } => true,
            Self::Service { status, .. } => *status >= 500,
            Self::Decode { .. } | Self::Config(_) => false,
        }
    }
}

/// One method per remote capability of the GeoEngine service.
///
/// Implementations must be stateless from the caller's perspective and
/// must not retry.
#[async_trait]
pub trait ServiceApi: Send + Sync {
    /// `GET /api/health`
    async fn health_check(&self) -> Result<HealthStatus, ServiceClientError>;

    /// `GET /api/projects`
    async fn list_projects(&self) -> Result<Vec<Project>, ServiceClientError>;

    /// `GET /api/projects/{name}`: full project configuration as published.
    async fn get_project(&self, name: &str) -> Result<serde_json::Value, ServiceClientError>;

    /// `GET /api/projects/{name}/tools`
    async fn list_tools(&self, project: &str) -> Result<Vec<ToolInfo>, ServiceClientError>;

    /// `POST /api/jobs`. Returns the server-assigned job id.
    async fn submit_job(&self, invocation: &JobInvocation) -> Result<String, ServiceClientError>;

    /// `GET /api/jobs/{id}`
    async fn get_status(&self, job_id: &str) -> Result<Job, ServiceClientError>;

    /// `GET /api/jobs/{id}/output`
    async fn get_output(&self, job_id: &str) -> Result<Vec<OutputFile>, ServiceClientError>;

    /// `DELETE /api/jobs/{id}`
    async fn cancel(&self, job_id: &str) -> Result<(), ServiceClientError>;

    /// `GET /api/jobs`, including finished jobs when `all` is set.
    async fn list_jobs(&self, all: bool) -> Result<Vec<JobSummary>, ServiceClientError>;
}
