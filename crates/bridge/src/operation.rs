//! Host operations: one generic [`ToolOperation`] per discovered tool, and
//! the static [`ServiceStatusOperation`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use geoengine_client::models::HealthStatus;
use geoengine_client::ServiceApi;
use geoengine_core::job::JobInvocation;
use geoengine_core::params::{
    map_parameters, output_dir_parameter, HostParameterDescriptor, OUTPUT_DIR_PARAM,
};
use geoengine_core::types::{Direction, Project, ToolDescriptor};

use crate::config::PollPolicy;
use crate::events::Severity;
use crate::host::HostAdapter;
use crate::lifecycle::{JobHandle, JobLifecycle};

// ---------------------------------------------------------------------------
// ToolOperation
// ---------------------------------------------------------------------------

/// A discovered tool as the host sees it.
///
/// The same type is registered once per tool; everything tool-specific
/// comes from the wrapped [`ToolDescriptor`].
#[derive(Clone)]
pub struct ToolOperation {
    tool: Arc<ToolDescriptor>,
    inputs: Vec<HostParameterDescriptor>,
    outputs: Vec<HostParameterDescriptor>,
    service: Arc<dyn ServiceApi>,
    policy: PollPolicy,
}

impl std::fmt::Debug for ToolOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolOperation")
            .field("id", &self.id())
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .finish()
    }
}

impl ToolOperation {
    pub fn new(tool: Arc<ToolDescriptor>, service: Arc<dyn ServiceApi>, policy: PollPolicy) -> Self {
        let inputs = map_parameters(&tool.inputs, Direction::Input);
        let outputs = map_parameters(&tool.outputs, Direction::Output);
        Self {
            tool,
            inputs,
            outputs,
            service,
            policy,
        }
    }

    /// Stable operation id, `{project}_{tool}`.
    pub fn id(&self) -> String {
        self.tool.operation_id()
    }

    pub fn display_name(&self) -> &str {
        &self.tool.label
    }

    /// Operations are grouped by project.
    pub fn group(&self) -> &str {
        &self.tool.project
    }

    pub fn help(&self) -> &str {
        &self.tool.description
    }

    pub fn tool(&self) -> &ToolDescriptor {
        &self.tool
    }

    /// Every parameter the host should render: inputs, the output
    /// directory, then output destinations.
    pub fn parameters(&self) -> Vec<HostParameterDescriptor> {
        let mut params = Vec::with_capacity(self.inputs.len() + self.outputs.len() + 1);
        params.extend(self.inputs.iter().cloned());
        params.push(output_dir_parameter());
        params.extend(self.outputs.iter().cloned());
        params
    }

    pub fn input_parameters(&self) -> &[HostParameterDescriptor] {
        &self.inputs
    }

    pub fn output_parameters(&self) -> &[HostParameterDescriptor] {
        &self.outputs
    }

    /// Start a job with the values the host collected.
    ///
    /// An `OUTPUT_DIR` entry in `inputs` is used as the output directory
    /// when `output_dir` is not given. Validation happens on the job task,
    /// so an invalid invocation surfaces as a `Failed` event.
    pub fn execute(
        &self,
        mut inputs: BTreeMap<String, serde_json::Value>,
        output_dir: Option<PathBuf>,
    ) -> JobHandle {
        let from_params = inputs
            .remove(OUTPUT_DIR_PARAM)
            .and_then(|v| v.as_str().map(PathBuf::from));

        let mut invocation = JobInvocation::for_tool(&self.tool, inputs);
        invocation.output_dir = output_dir.or(from_params);

        tracing::info!(
            project = %self.tool.project,
            tool = %self.tool.name,
            "Starting job",
        );

        JobLifecycle::spawn(
            Arc::clone(&self.service),
            Arc::clone(&self.tool),
            self.policy.clone(),
            invocation,
        )
    }
}

// ---------------------------------------------------------------------------
// ServiceStatusOperation
// ---------------------------------------------------------------------------

/// Result of the service status check.
#[derive(Debug, Clone, Default)]
pub struct ServiceStatus {
    pub endpoint: String,
    pub health: Option<HealthStatus>,
    pub projects: Vec<Project>,
    pub error: Option<String>,
}

impl ServiceStatus {
    pub fn is_healthy(&self) -> bool {
        self.health.is_some() && self.error.is_none()
    }
}

/// Static operation that reports service health and registered projects.
#[derive(Clone)]
pub struct ServiceStatusOperation {
    service: Arc<dyn ServiceApi>,
    endpoint: String,
}

impl ServiceStatusOperation {
    pub const ID: &'static str = "geoengine_status";

    pub fn new(service: Arc<dyn ServiceApi>, endpoint: impl Into<String>) -> Self {
        Self {
            service,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Check health, list projects, and report both to `host`.
    pub async fn run(&self, host: &dyn HostAdapter) -> ServiceStatus {
        let mut status = ServiceStatus {
            endpoint: self.endpoint.clone(),
            ..ServiceStatus::default()
        };

        match self.service.health_check().await {
            Ok(health) => {
                host.emit(Severity::Info, &format!("Service Status: {}", health.status));
                host.emit(Severity::Info, &format!("Version: {}", health.version));
                status.health = Some(health);
            }
            Err(e) => {
                tracing::warn!(endpoint = %self.endpoint, error = %e, "Health check failed");
                host.emit(Severity::Error, &e.to_string());
                status.error = Some(e.to_string());
                return status;
            }
        }

        match self.service.list_projects().await {
            Ok(projects) => {
                let mut report = format!("Registered Projects: {}", projects.len());
                for p in &projects {
                    report.push_str(&format!("\n  - {} ({} tools)", p.name, p.tools_count));
                }
                host.emit(Severity::Info, &report);
                status.projects = projects;
            }
            Err(e) => {
                host.emit(Severity::Error, &e.to_string());
                status.error = Some(e.to_string());
            }
        }

        status
    }
}
