//! Events emitted by a job lifecycle.
//!
//! Each job task sends [`JobEvent`]s over an unbounded channel to the
//! host-facing layer, in the order they happen. Terminal events
//! (`Completed`, `Failed`, `Cancelled`) are always the last event of a
//! lifecycle.

use std::collections::BTreeMap;

use serde::Serialize;

/// Message severity understood by every GIS host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A lifecycle notification for a single job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// The service accepted the job.
    Submitted { job_id: String },

    /// A poll observed a status. `status` is the raw string reported
    /// by the service.
    Progress { job_id: String, status: String },

    /// Something went wrong that does not end the job, e.g. a poll
    /// that could not reach the service.
    Warning {
        job_id: Option<String>,
        message: String,
    },

    /// The host asked for cancellation and the request was sent.
    CancelRequested { job_id: String },

    /// The job finished and its outputs were retrieved.
    Completed {
        job_id: String,
        paths: Vec<String>,
        /// Declared output name to the artifact path it was matched to.
        matched: BTreeMap<String, String>,
    },

    /// The lifecycle ended in an error, before or after submission.
    Failed {
        job_id: Option<String>,
        error: String,
    },

    /// The job was cancelled. `confirmed` is false when the service
    /// never reported the cancellation within the confirmation budget.
    Cancelled {
        job_id: Option<String>,
        confirmed: bool,
    },
}

impl JobEvent {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Submitted { .. }
            | Self::Progress { .. }
            | Self::CancelRequested { .. }
            | Self::Completed { .. } => Severity::Info,
            Self::Warning { .. } | Self::Cancelled { .. } => Severity::Warning,
            Self::Failed { .. } => Severity::Error,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }

    /// Human-readable line for host message panels.
    pub fn message(&self) -> String {
        match self {
            Self::Submitted { job_id } => format!("Job submitted: {job_id}"),
            Self::Progress { status, .. } => format!("Status: {status}"),
            Self::Warning { message, .. } => message.clone(),
            Self::CancelRequested { job_id } => format!("Cancelling job {job_id}..."),
            Self::Completed { paths, .. } => {
                let mut line = format!("Job completed successfully! Output files: {}", paths.len());
                for path in paths {
                    line.push_str("\n  ");
                    line.push_str(path);
                }
                line
            }
            Self::Failed { error, .. } => format!("Job failed: {error}"),
            Self::Cancelled { confirmed: true, .. } => "Job was cancelled".to_string(),
            Self::Cancelled { confirmed: false, .. } => {
                "Job cancelled locally; the service did not confirm the cancellation".to_string()
            }
        }
    }
}
