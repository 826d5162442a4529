//! Scripted [`ServiceApi`] stub shared by the bridge integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use geoengine_bridge::config::PollPolicy;
use geoengine_bridge::events::{JobEvent, Severity};
use geoengine_bridge::host::HostAdapter;
use geoengine_bridge::operation::{ServiceStatusOperation, ToolOperation};
use geoengine_client::models::{HealthStatus, JobSummary, ParameterInfo, ToolInfo};
use geoengine_client::{ServiceApi, ServiceClientError};
use geoengine_core::job::{Job, JobInvocation, JobStatus, OutputFile};
use geoengine_core::types::{ParamKind, ParameterSpec, Project, ToolDescriptor};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub fn unreachable() -> ServiceClientError {
    ServiceClientError::Unreachable {
        url: "http://localhost:9876".into(),
        reason: "connection refused".into(),
    }
}

pub fn service_error(status: u16, message: &str) -> ServiceClientError {
    ServiceClientError::Service {
        status,
        message: message.into(),
    }
}

pub fn status(status: &str) -> Result<Job, ServiceClientError> {
    Ok(Job {
        id: "job-1".into(),
        status: JobStatus::parse(status),
        error: None,
    })
}

pub fn failed(error: Option<&str>) -> Result<Job, ServiceClientError> {
    Ok(Job {
        id: "job-1".into(),
        status: JobStatus::Failed,
        error: error.map(str::to_string),
    })
}

pub fn param(name: &str, kind: &str) -> ParameterInfo {
    ParameterInfo {
        name: name.into(),
        label: None,
        param_type: kind.into(),
        required: true,
        default: None,
        description: None,
        choices: None,
    }
}

pub fn tool_info(name: &str) -> ToolInfo {
    ToolInfo {
        name: name.into(),
        label: Some(format!("{name} label")),
        description: Some(format!("Runs {name}")),
        inputs: Some(vec![param("dem", "raster")]),
        outputs: Some(vec![param("filled", "raster")]),
    }
}

/// The tool most lifecycle tests run: `hydro/fill_sinks`.
pub fn fill_sinks() -> Arc<ToolDescriptor> {
    Arc::new(ToolDescriptor {
        project: "hydro".into(),
        name: "fill_sinks".into(),
        label: "Fill Sinks".into(),
        description: String::new(),
        inputs: vec![
            ParameterSpec::new("dem", ParamKind::Raster),
            ParameterSpec::new("z_limit", ParamKind::Float).optional(),
        ],
        outputs: vec![ParameterSpec::new("filled", ParamKind::Raster)],
    })
}

pub fn fast_policy() -> PollPolicy {
    PollPolicy::with_interval(Duration::from_millis(5))
}

// ---------------------------------------------------------------------------
// ScriptedService
// ---------------------------------------------------------------------------

/// Counts of calls made against a [`ScriptedService`].
#[derive(Default)]
pub struct Calls {
    pub list_projects: AtomicUsize,
    pub list_tools: AtomicUsize,
    pub submit: AtomicUsize,
    pub status: AtomicUsize,
    pub output: AtomicUsize,
    pub cancel: AtomicUsize,
}

impl Calls {
    pub fn total(&self) -> usize {
        [
            &self.list_projects,
            &self.list_tools,
            &self.submit,
            &self.status,
            &self.output,
            &self.cancel,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }
}

/// A service whose answers are scripted up front.
///
/// Status polls pop from a queue; once the queue is drained the last
/// scripted answer keeps being returned. A token can be cancelled when a
/// given poll is served, to simulate a host cancelling mid-job.
#[derive(Default)]
pub struct ScriptedService {
    pub calls: Calls,
    pub projects: Mutex<Option<Result<Vec<Project>, ServiceClientError>>>,
    pub tools: Mutex<HashMap<String, Result<Vec<ToolInfo>, ServiceClientError>>>,
    pub submit_result: Mutex<Option<Result<String, ServiceClientError>>>,
    pub statuses: Mutex<VecDeque<Result<Job, ServiceClientError>>>,
    pub outputs: Mutex<Vec<OutputFile>>,
    pub cancel_result: Mutex<Option<ServiceClientError>>,
    pub cancel_on_poll: Mutex<Option<(usize, CancellationToken)>>,
    pub poll_delay: Mutex<Option<Duration>>,
    pub submitted: Mutex<Vec<JobInvocation>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statuses(self, statuses: Vec<Result<Job, ServiceClientError>>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    pub fn with_outputs(self, outputs: Vec<OutputFile>) -> Self {
        *self.outputs.lock().unwrap() = outputs;
        self
    }

    pub fn with_projects(self, projects: Result<Vec<Project>, ServiceClientError>) -> Self {
        *self.projects.lock().unwrap() = Some(projects);
        self
    }

    pub fn with_tools(self, project: &str, tools: Result<Vec<ToolInfo>, ServiceClientError>) -> Self {
        self.tools.lock().unwrap().insert(project.to_string(), tools);
        self
    }

    pub fn with_submit(self, result: Result<String, ServiceClientError>) -> Self {
        *self.submit_result.lock().unwrap() = Some(result);
        self
    }

    /// Make every status request take `delay` to answer.
    pub fn with_poll_delay(self, delay: Duration) -> Self {
        *self.poll_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn failing_cancel(self, error: ServiceClientError) -> Self {
        *self.cancel_result.lock().unwrap() = Some(error);
        self
    }

    /// Cancel `token` while serving the `poll`-th status request (1-based).
    pub fn cancel_at_poll(&self, poll: usize, token: CancellationToken) {
        *self.cancel_on_poll.lock().unwrap() = Some((poll, token));
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub fn project(name: &str) -> Project {
    Project {
        name: name.into(),
        tools_count: 1,
        path: None,
        version: None,
    }
}

#[async_trait]
impl ServiceApi for ScriptedService {
    async fn health_check(&self) -> Result<HealthStatus, ServiceClientError> {
        Ok(HealthStatus {
            status: "healthy".into(),
            version: "0.4.2".into(),
            uptime_secs: None,
        })
    }

    async fn list_projects(&self) -> Result<Vec<Project>, ServiceClientError> {
        self.calls.list_projects.fetch_add(1, Ordering::SeqCst);
        self.projects.lock().unwrap().clone().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn get_project(&self, name: &str) -> Result<serde_json::Value, ServiceClientError> {
        Ok(serde_json::json!({ "name": name }))
    }

    async fn list_tools(&self, project: &str) -> Result<Vec<ToolInfo>, ServiceClientError> {
        self.calls.list_tools.fetch_add(1, Ordering::SeqCst);
        self.tools
            .lock()
            .unwrap()
            .get(project)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn submit_job(&self, invocation: &JobInvocation) -> Result<String, ServiceClientError> {
        self.calls.submit.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(invocation.clone());
        self.submit_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok("job-1".into()))
    }

    async fn get_status(&self, _job_id: &str) -> Result<Job, ServiceClientError> {
        let n = self.calls.status.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = *self.poll_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some((at, token)) = self.cancel_on_poll.lock().unwrap().as_ref() {
            if *at == n {
                token.cancel();
            }
        }

        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() > 1 {
            statuses.pop_front().unwrap()
        } else {
            statuses.front().cloned().unwrap_or_else(|| status("running"))
        }
    }

    async fn get_output(&self, _job_id: &str) -> Result<Vec<OutputFile>, ServiceClientError> {
        self.calls.output.fetch_add(1, Ordering::SeqCst);
        Ok(self.outputs.lock().unwrap().clone())
    }

    async fn cancel(&self, _job_id: &str) -> Result<(), ServiceClientError> {
        self.calls.cancel.fetch_add(1, Ordering::SeqCst);
        match self.cancel_result.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn list_jobs(&self, _all: bool) -> Result<Vec<JobSummary>, ServiceClientError> {
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// Event helpers
// ---------------------------------------------------------------------------

/// Drain every event of a finished lifecycle.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<JobEvent>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn progress_statuses(events: &[JobEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            JobEvent::Progress { status, .. } => Some(status.clone()),
            _ => None,
        })
        .collect()
}

pub fn warnings(events: &[JobEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, JobEvent::Warning { .. }))
        .count()
}

pub fn terminal_count(events: &[JobEvent]) -> usize {
    events.iter().filter(|e| e.is_terminal()).count()
}

// ---------------------------------------------------------------------------
// RecordingHost
// ---------------------------------------------------------------------------

/// Host that records everything registered with or emitted to it.
#[derive(Default)]
pub struct RecordingHost {
    pub operations: Mutex<Vec<ToolOperation>>,
    pub status: Mutex<Option<ServiceStatusOperation>>,
    pub messages: Mutex<Vec<(Severity, String)>>,
}

impl RecordingHost {
    pub fn messages_at(&self, severity: Severity) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl HostAdapter for RecordingHost {
    fn register_operation(&self, operation: ToolOperation) {
        self.operations.lock().unwrap().push(operation);
    }

    fn register_status(&self, operation: ServiceStatusOperation) {
        *self.status.lock().unwrap() = Some(operation);
    }

    fn emit(&self, severity: Severity, message: &str) {
        self.messages.lock().unwrap().push((severity, message.to_string()));
    }
}
