//! Registers the discovered tool catalog with a host.

use std::sync::Arc;

use geoengine_client::ServiceApi;

use crate::config::PollPolicy;
use crate::events::Severity;
use crate::host::HostAdapter;
use crate::operation::{ServiceStatusOperation, ToolOperation};
use crate::registry::CapabilityRegistry;

/// Owns the capability registry and turns its catalog into host
/// operations.
pub struct GeoEngineProvider {
    registry: CapabilityRegistry,
    service: Arc<dyn ServiceApi>,
    policy: PollPolicy,
    endpoint: String,
}

impl GeoEngineProvider {
    pub fn new(service: Arc<dyn ServiceApi>, policy: PollPolicy, endpoint: impl Into<String>) -> Self {
        Self {
            registry: CapabilityRegistry::new(Arc::clone(&service)),
            service,
            policy,
            endpoint: endpoint.into(),
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Refresh the catalog and register one operation per tool, plus the
    /// service status operation. Returns the number of tool operations
    /// registered.
    ///
    /// Discovery problems are shown to the host as warnings; loading
    /// itself never fails.
    pub async fn load(&self, host: &dyn HostAdapter) -> usize {
        let warnings = self.registry.refresh().await;
        for warning in &warnings {
            host.emit(Severity::Warning, warning);
        }

        let catalog = self.registry.catalog().await;
        if !catalog.service_available() {
            host.emit(
                Severity::Warning,
                &format!(
                    "GeoEngine service is not available at {}. No tools were loaded.",
                    self.endpoint
                ),
            );
        }

        for tool in catalog.tools() {
            host.register_operation(ToolOperation::new(
                Arc::clone(tool),
                Arc::clone(&self.service),
                self.policy.clone(),
            ));
        }
        host.register_status(ServiceStatusOperation::new(
            Arc::clone(&self.service),
            self.endpoint.clone(),
        ));

        tracing::info!(
            endpoint = %self.endpoint,
            tools = catalog.tools().len(),
            "Registered GeoEngine operations",
        );
        catalog.tools().len()
    }
}
