//! The seam between the bridge and a GIS host application.
//!
//! A host receives one [`ToolOperation`] per discovered tool plus a single
//! [`ServiceStatusOperation`], and shows messages at three severities.
//! The bridge never looks at host UI state.

use tokio::sync::mpsc;

use crate::events::{JobEvent, Severity};
use crate::operation::{ServiceStatusOperation, ToolOperation};

/// Capabilities the bridge needs from a host.
pub trait HostAdapter: Send + Sync {
    /// Make a tool available to users of the host.
    fn register_operation(&self, operation: ToolOperation);

    /// Register the static service status operation.
    fn register_status(&self, operation: ServiceStatusOperation);

    /// Show a message in the host's message panel.
    fn emit(&self, severity: Severity, message: &str);
}

/// Relay lifecycle events to `host` until the channel closes.
///
/// Returns the terminal event, if one was received.
pub async fn forward_events(
    events: &mut mpsc::UnboundedReceiver<JobEvent>,
    host: &dyn HostAdapter,
) -> Option<JobEvent> {
    let mut terminal = None;
    while let Some(event) = events.recv().await {
        host.emit(event.severity(), &event.message());
        if event.is_terminal() {
            terminal = Some(event);
        }
    }
    terminal
}
