//! Job lifecycle controller.
//!
//! Drives one job from submission to a terminal outcome:
//!
//! ```text
//! Submitting -> Queued | Running -> Completed | Failed | Cancelled
//! ```
//!
//! Each lifecycle runs on its own Tokio task (see [`JobLifecycle::spawn`])
//! and reports to the host through a [`JobEvent`] channel. Submission is
//! never retried, since a retried `POST /api/jobs` could run the job
//! twice. Polls that cannot reach the service are retried on the next
//! tick. A host cancellation request is forwarded to the service, but the
//! lifecycle keeps polling until the service reports a terminal status
//! (or a bounded number of confirmation polls runs out), because the job
//! may finish before the cancellation lands.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use geoengine_client::{ServiceApi, ServiceClientError};
use geoengine_core::error::CoreError;
use geoengine_core::job::{match_outputs, Job, JobInvocation, JobStatus, OutputFile};
use geoengine_core::types::ToolDescriptor;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::PollPolicy;
use crate::events::JobEvent;

/// Attempts made to fetch outputs of a completed job when the service
/// is transiently unavailable.
const OUTPUT_FETCH_ATTEMPTS: u32 = 3;

/// Message used when a failed job carries no error detail.
const UNKNOWN_ERROR: &str = "Unknown error";

/// Successful terminal outcomes. A cancelled job is an outcome, not an
/// error.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed {
        job_id: String,
        outputs: Vec<OutputFile>,
        /// Declared output name to matched artifact path.
        matched: BTreeMap<String, String>,
    },
    Cancelled {
        /// `None` when cancellation arrived before submission.
        job_id: Option<String>,
        /// Whether the service reported the job as cancelled.
        confirmed: bool,
    },
}

/// Errors that end a lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The invocation does not fit the tool; nothing was sent.
    #[error("Invalid invocation: {0}")]
    InvalidInvocation(#[from] CoreError),

    /// The service did not accept the job.
    #[error("Job submission failed: {0}")]
    SubmissionFailed(#[source] ServiceClientError),

    /// The service reported the job as failed.
    #[error("{error}")]
    JobFailed { job_id: String, error: String },

    /// Polling hit a non-transient error, or too many transient ones.
    #[error("Lost track of job {job_id}: {source}")]
    PollFailed {
        job_id: String,
        #[source]
        source: ServiceClientError,
    },

    /// The job did not reach a terminal status within the policy timeout.
    #[error("Job {job_id} did not complete within {} seconds", .timeout.as_secs())]
    TimedOut { job_id: String, timeout: Duration },

    /// The job completed but its outputs could not be retrieved.
    #[error("Job {job_id} completed but its outputs are unavailable: {source}")]
    OutputUnavailable {
        job_id: String,
        #[source]
        source: ServiceClientError,
    },

    /// The lifecycle task panicked or was aborted.
    #[error("Job task aborted: {0}")]
    Aborted(String),
}

impl LifecycleError {
    /// Server-assigned id of the job, if it got that far.
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::JobFailed { job_id, .. }
            | Self::PollFailed { job_id, .. }
            | Self::TimedOut { job_id, .. }
            | Self::OutputUnavailable { job_id, .. } => Some(job_id),
            Self::InvalidInvocation(_) | Self::SubmissionFailed(_) | Self::Aborted(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// JobHandle
// ---------------------------------------------------------------------------

/// Handle to a running lifecycle task.
pub struct JobHandle {
    /// Lifecycle events in the order they happen. The channel closes
    /// after the terminal event.
    pub events: mpsc::UnboundedReceiver<JobEvent>,
    cancel: CancellationToken,
    task: JoinHandle<Result<JobOutcome, LifecycleError>>,
}

impl JobHandle {
    /// Ask for the job to be cancelled. Safe to call repeatedly.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A clone of the cancellation token, e.g. for a signal handler.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the lifecycle to finish.
    pub async fn wait(self) -> Result<JobOutcome, LifecycleError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(LifecycleError::Aborted(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// JobLifecycle
// ---------------------------------------------------------------------------

/// Per-job state machine. Owns only its own job's bookkeeping.
pub struct JobLifecycle {
    service: Arc<dyn ServiceApi>,
    tool: Arc<ToolDescriptor>,
    policy: PollPolicy,
    events: mpsc::UnboundedSender<JobEvent>,
    cancel: CancellationToken,
}

/// How the polling loop ended.
enum PollEnd {
    Terminal(Job),
    /// Cancellation was requested and the service never confirmed a
    /// terminal status within the confirmation budget.
    Unconfirmed,
}

impl JobLifecycle {
    pub fn new(
        service: Arc<dyn ServiceApi>,
        tool: Arc<ToolDescriptor>,
        policy: PollPolicy,
        events: mpsc::UnboundedSender<JobEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            service,
            tool,
            policy,
            events,
            cancel,
        }
    }

    /// Run `invocation` on a new Tokio task and return its handle.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        service: Arc<dyn ServiceApi>,
        tool: Arc<ToolDescriptor>,
        policy: PollPolicy,
        invocation: JobInvocation,
    ) -> JobHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let lifecycle = Self::new(service, tool, policy, tx, cancel.clone());
        let task = tokio::spawn(lifecycle.run(invocation));

        JobHandle {
            events: rx,
            cancel,
            task,
        }
    }

    /// Drive the job to a terminal outcome and report it.
    ///
    /// Exactly one terminal event is emitted, whatever the result.
    pub async fn run(self, invocation: JobInvocation) -> Result<JobOutcome, LifecycleError> {
        let result = self.drive(&invocation).await;

        match &result {
            Ok(JobOutcome::Completed {
                job_id,
                outputs,
                matched,
            }) => {
                tracing::info!(job_id = %job_id, outputs = outputs.len(), "Job completed");
                self.emit(JobEvent::Completed {
                    job_id: job_id.clone(),
                    paths: outputs.iter().map(|f| f.path.clone()).collect(),
                    matched: matched.clone(),
                });
            }
            Ok(JobOutcome::Cancelled { job_id, confirmed }) => {
                tracing::warn!(job_id = ?job_id, confirmed, "Job cancelled");
                self.emit(JobEvent::Cancelled {
                    job_id: job_id.clone(),
                    confirmed: *confirmed,
                });
            }
            Err(e) => {
                tracing::error!(
                    job_id = ?e.job_id(),
                    project = %invocation.project,
                    tool = %invocation.tool,
                    error = %e,
                    "Job lifecycle failed",
                );
                self.emit(JobEvent::Failed {
                    job_id: e.job_id().map(str::to_string),
                    error: e.to_string(),
                });
            }
        }

        result
    }

    async fn drive(&self, invocation: &JobInvocation) -> Result<JobOutcome, LifecycleError> {
        // Submitting
        invocation.validate(&self.tool)?;

        if self.cancel.is_cancelled() {
            return Ok(JobOutcome::Cancelled {
                job_id: None,
                confirmed: true,
            });
        }

        let job_id = self
            .service
            .submit_job(invocation)
            .await
            .map_err(LifecycleError::SubmissionFailed)?;
        self.emit(JobEvent::Submitted {
            job_id: job_id.clone(),
        });

        // Queued / Running
        let job = match self.poll_until_terminal(&job_id).await? {
            PollEnd::Terminal(job) => job,
            PollEnd::Unconfirmed => {
                return Ok(JobOutcome::Cancelled {
                    job_id: Some(job_id),
                    confirmed: false,
                });
            }
        };

        match job.status {
            JobStatus::Completed => {
                let outputs = self.fetch_outputs(&job_id).await?;
                let matched = match_outputs(&self.tool.outputs, &outputs);
                Ok(JobOutcome::Completed {
                    job_id,
                    outputs,
                    matched,
                })
            }
            JobStatus::Cancelled => Ok(JobOutcome::Cancelled {
                job_id: Some(job_id),
                confirmed: true,
            }),
            _ => Err(LifecycleError::JobFailed {
                job_id,
                error: job.error.unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            }),
        }
    }

    /// Poll until the service reports a terminal status.
    async fn poll_until_terminal(&self, job_id: &str) -> Result<PollEnd, LifecycleError> {
        let deadline = self.policy.timeout.map(|t| Instant::now() + t);
        let mut tracker = StatusTracker::default();
        let mut delay = self.policy.interval;
        let mut failures = 0u32;
        // Set once cancellation has been requested: polls left to
        // confirm it.
        let mut confirm_left: Option<u32> = None;

        loop {
            if confirm_left == Some(0) {
                self.emit(JobEvent::Warning {
                    job_id: Some(job_id.to_string()),
                    message: format!(
                        "Service did not confirm cancellation of job {job_id} after {} polls",
                        self.confirm_budget()
                    ),
                });
                return Ok(PollEnd::Unconfirmed);
            }

            match self.service.get_status(job_id).await {
                Ok(job) => {
                    failures = 0;
                    delay = self.policy.interval;

                    if tracker.advance(&job.status) {
                        tracing::debug!(job_id, status = %job.status, "Job status");
                        self.emit(JobEvent::Progress {
                            job_id: job_id.to_string(),
                            status: job.status.to_string(),
                        });
                    } else {
                        tracing::debug!(job_id, status = %job.status, "Ignoring stale job status");
                    }

                    if job.status.is_terminal() {
                        return Ok(PollEnd::Terminal(job));
                    }
                }
                Err(e) if e.is_transient() => {
                    failures += 1;
                    tracing::warn!(
                        job_id,
                        error = %e,
                        consecutive_failures = failures,
                        "Status poll failed, retrying",
                    );
                    self.emit(JobEvent::Warning {
                        job_id: Some(job_id.to_string()),
                        message: format!("Status check failed, will retry: {e}"),
                    });

                    if self.policy.exhausted(failures) {
                        return Err(LifecycleError::PollFailed {
                            job_id: job_id.to_string(),
                            source: e,
                        });
                    }
                    if failures > 1 {
                        delay = self.policy.next_delay(delay);
                    }
                }
                Err(e) => {
                    return Err(LifecycleError::PollFailed {
                        job_id: job_id.to_string(),
                        source: e,
                    });
                }
            }

            if let Some(left) = confirm_left.as_mut() {
                *left -= 1;
                if *left > 0 {
                    tokio::time::sleep(delay).await;
                }
                continue;
            }

            // A pending cancellation takes precedence over the timeout.
            let sleep = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline && !self.cancel.is_cancelled() {
                        return Err(self.timed_out(job_id).await);
                    }
                    delay.min(deadline.saturating_duration_since(now))
                }
                None => delay,
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.request_cancel(job_id).await;
                    confirm_left = Some(self.confirm_budget());
                }
                _ = tokio::time::sleep(sleep) => {}
            }
        }
    }

    /// Polls spent confirming a cancellation. One confirmation poll is
    /// always made so an already finished job is reported as such.
    fn confirm_budget(&self) -> u32 {
        self.policy.cancel_confirm_polls.max(1)
    }

    /// Give up on a job that ran past the policy timeout. The service is
    /// asked to cancel it so it does not keep running unobserved.
    async fn timed_out(&self, job_id: &str) -> LifecycleError {
        let timeout = self.policy.timeout.unwrap_or_default();
        tracing::warn!(job_id, timeout_secs = timeout.as_secs(), "Job timed out");
        if let Err(e) = self.service.cancel(job_id).await {
            tracing::warn!(job_id, error = %e, "Cancel after timeout failed");
        }
        LifecycleError::TimedOut {
            job_id: job_id.to_string(),
            timeout,
        }
    }

    /// Forward a cancellation request. Failure is logged, not fatal: the
    /// polling loop still decides the outcome.
    async fn request_cancel(&self, job_id: &str) {
        tracing::info!(job_id, "Cancellation requested");
        match self.service.cancel(job_id).await {
            Ok(()) => {
                self.emit(JobEvent::CancelRequested {
                    job_id: job_id.to_string(),
                });
            }
            Err(e) => {
                tracing::warn!(job_id, error = %e, "Cancel request failed");
                self.emit(JobEvent::Warning {
                    job_id: Some(job_id.to_string()),
                    message: format!("Cancel request for job {job_id} failed: {e}"),
                });
            }
        }
    }

    async fn fetch_outputs(&self, job_id: &str) -> Result<Vec<OutputFile>, LifecycleError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.service.get_output(job_id).await {
                Ok(files) => return Ok(files),
                Err(e) if e.is_transient() && attempt < OUTPUT_FETCH_ATTEMPTS => {
                    tracing::warn!(job_id, attempt, error = %e, "Output fetch failed, retrying");
                    tokio::time::sleep(self.policy.interval.min(Duration::from_secs(5))).await;
                }
                Err(e) => {
                    return Err(LifecycleError::OutputUnavailable {
                        job_id: job_id.to_string(),
                        source: e,
                    });
                }
            }
        }
    }

    fn emit(&self, event: JobEvent) {
        // A closed channel only means nobody is listening any more.
        let _ = self.events.send(event);
    }
}

// ---------------------------------------------------------------------------
// StatusTracker
// ---------------------------------------------------------------------------

/// Keeps reported statuses non-decreasing.
#[derive(Debug, Default)]
struct StatusTracker {
    highest: u8,
}

impl StatusTracker {
    /// Record `status`; returns whether it should be reported.
    ///
    /// Statuses behind the highest one seen are stale. Unknown statuses
    /// carry no rank; they are reported but do not move the watermark.
    fn advance(&mut self, status: &JobStatus) -> bool {
        match status.rank() {
            Some(rank) if rank < self.highest => false,
            Some(rank) => {
                self.highest = rank;
                true
            }
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_suppresses_regressions() {
        let mut tracker = StatusTracker::default();
        assert!(tracker.advance(&JobStatus::Queued));
        assert!(tracker.advance(&JobStatus::Running));
        assert!(tracker.advance(&JobStatus::Running));
        assert!(!tracker.advance(&JobStatus::Queued));
        assert!(tracker.advance(&JobStatus::Completed));
    }

    #[test]
    fn tracker_reports_unknown_without_moving() {
        let mut tracker = StatusTracker::default();
        assert!(tracker.advance(&JobStatus::Running));
        assert!(tracker.advance(&JobStatus::Other("staging".into())));
        assert!(!tracker.advance(&JobStatus::Queued));
    }

    #[test]
    fn error_job_ids() {
        let err = LifecycleError::JobFailed {
            job_id: "j1".into(),
            error: "boom".into(),
        };
        assert_eq!(err.job_id(), Some("j1"));
        assert_eq!(err.to_string(), "boom");

        let err = LifecycleError::InvalidInvocation(CoreError::Validation("x".into()));
        assert_eq!(err.job_id(), None);

        let err = LifecycleError::TimedOut {
            job_id: "j2".into(),
            timeout: Duration::from_secs(90),
        };
        assert_eq!(err.job_id(), Some("j2"));
        assert_eq!(err.to_string(), "Job j2 did not complete within 90 seconds");
    }
}
