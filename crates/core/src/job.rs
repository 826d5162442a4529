//! Job model: status ranking, invocations, and output matching.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{ParameterSpec, ToolDescriptor};

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Remote job status as reported by `GET /api/jobs/{id}`.
///
/// Statuses the client does not know are kept verbatim in
/// [`JobStatus::Other`] and treated as non-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    Other(String),
}

impl JobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" => Self::Queued,
            "running" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Other(raw) => raw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Position in the lifecycle, used to suppress stale reports.
    ///
    /// Returns `None` for unknown statuses, which carry no ordering
    /// information.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Self::Queued => Some(1),
            Self::Running => Some(2),
            Self::Completed | Self::Failed | Self::Cancelled => Some(3),
            Self::Other(_) => None,
        }
    }
}

impl From<String> for JobStatus {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job / OutputFile
// ---------------------------------------------------------------------------

/// Local, disposable view of a remote job obtained by polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Not part of every status body; callers fill it from the request.
    #[serde(default)]
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub error: Option<String>,
}

/// One artifact produced by a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub size: u64,
}

/// Match declared outputs to produced artifacts.
///
/// An output is matched to the first artifact whose file name contains
/// the output's parameter name, case-insensitively. Unmatched outputs
/// are absent from the result.
pub fn match_outputs(outputs: &[ParameterSpec], files: &[OutputFile]) -> BTreeMap<String, String> {
    outputs
        .iter()
        .filter_map(|spec| {
            let needle = spec.name.to_lowercase();
            files
                .iter()
                .find(|f| f.name.to_lowercase().contains(&needle))
                .map(|f| (spec.name.clone(), f.path.clone()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// JobInvocation
// ---------------------------------------------------------------------------

/// A request to run one tool with concrete inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInvocation {
    pub project: String,
    pub tool: String,
    /// Input name to value or file path.
    pub inputs: BTreeMap<String, serde_json::Value>,
    pub output_dir: Option<PathBuf>,
}

impl JobInvocation {
    pub fn new(project: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            tool: tool.into(),
            inputs: BTreeMap::new(),
            output_dir: None,
        }
    }

    /// Invocation of `tool` with the given inputs.
    pub fn for_tool(tool: &ToolDescriptor, inputs: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            project: tool.project.clone(),
            tool: tool.name.clone(),
            inputs,
            output_dir: None,
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Inputs that should be sent to the service. `null` values mean
    /// "not provided" and are dropped.
    pub fn provided_inputs(&self) -> BTreeMap<&str, &serde_json::Value> {
        self.inputs
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.as_str(), v))
            .collect()
    }

    /// Check this invocation against the tool it targets.
    ///
    /// Every input key must be a declared input of `tool`. Missing
    /// required inputs are not checked here; the host collects values and
    /// the service owns the final say on completeness.
    pub fn validate(&self, tool: &ToolDescriptor) -> Result<(), CoreError> {
        if self.project != tool.project || self.tool != tool.name {
            return Err(CoreError::ToolMismatch {
                requested: format!("{}/{}", self.project, self.tool),
                resolved: format!("{}/{}", tool.project, tool.name),
            });
        }

        let unknown: Vec<String> = self
            .inputs
            .keys()
            .filter(|key| tool.input(key).is_none())
            .cloned()
            .collect();

        if !unknown.is_empty() {
            return Err(CoreError::UnknownInputs {
                tool: tool.operation_id(),
                names: unknown,
            });
        }

        Ok(())
    }
}
