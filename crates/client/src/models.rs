//! Wire models for the GeoEngine HTTP API.
//!
//! Shapes follow what the service emits; optional fields default so that
//! older or newer services still parse. Normalization into the catalog
//! model happens in the registry, not here.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use geoengine_core::job::{JobInvocation, JobStatus, OutputFile};
use serde::{Deserialize, Serialize};

/// Response of `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    #[serde(default, alias = "uptime")]
    pub uptime_secs: Option<u64>,
}

/// A tool as listed by `GET /api/projects/{name}/tools`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub inputs: Option<Vec<ParameterInfo>>,
    #[serde(default)]
    pub outputs: Option<Vec<ParameterInfo>>,
}

fn default_param_type() -> String {
    "string".to_string()
}

fn default_required() -> bool {
    true
}

/// A parameter declaration inside [`ToolInfo`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Raw kind string; parsed leniently by the registry.
    #[serde(default = "default_param_type", alias = "kind", alias = "type")]
    pub param_type: String,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub choices: Option<Vec<String>>,
}

/// Body of `POST /api/jobs`.
#[derive(Debug, Serialize)]
pub struct SubmitJobRequest<'a> {
    pub project: &'a str,
    pub tool: &'a str,
    pub inputs: BTreeMap<&'a str, &'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
}

impl<'a> From<&'a JobInvocation> for SubmitJobRequest<'a> {
    fn from(invocation: &'a JobInvocation) -> Self {
        Self {
            project: &invocation.project,
            tool: &invocation.tool,
            inputs: invocation.provided_inputs(),
            output_dir: invocation
                .output_dir
                .as_ref()
                .map(|dir| dir.to_string_lossy().into_owned()),
        }
    }
}

/// Response of `POST /api/jobs`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitJobResponse {
    pub id: String,
    #[serde(default)]
    pub status: Option<JobStatus>,
}

/// Response of `GET /api/jobs/{id}/output`.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputListing {
    #[serde(default)]
    pub files: Vec<OutputFile>,
}

/// One row of `GET /api/jobs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Error body shape used by the service: `{"error": "..."}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}
