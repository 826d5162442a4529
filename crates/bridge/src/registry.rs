//! Capability registry: the discovered tool catalog.
//!
//! [`CapabilityRegistry::discover`] walks the service's projects and
//! converts each published tool into a normalized [`ToolDescriptor`].
//! Discovery never fails outright: an unreachable service yields an empty
//! catalog, and a project whose tools cannot be listed is skipped. Both
//! cases are reported as warnings for the caller to present.
//!
//! The catalog is held as an `Arc` snapshot behind a lock. A refresh
//! builds a new snapshot off to the side and swaps it in, so readers see
//! either the old catalog or the new one, never a mix.

use std::collections::HashSet;
use std::sync::Arc;

use geoengine_client::models::{ParameterInfo, ToolInfo};
use geoengine_client::ServiceApi;
use geoengine_core::types::{Direction, ParamKind, ParameterSpec, Project, ToolDescriptor};
use tokio::sync::RwLock;

/// Result of one discovery pass.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub projects: Vec<Project>,
    pub tools: Vec<ToolDescriptor>,
    pub warnings: Vec<String>,
    /// False when the project list itself could not be fetched.
    pub service_available: bool,
}

/// An immutable catalog snapshot.
#[derive(Debug, Default)]
pub struct Catalog {
    projects: Vec<Project>,
    tools: Vec<Arc<ToolDescriptor>>,
    service_available: bool,
}

impl Catalog {
    fn from_discovery(discovery: Discovery) -> Self {
        Self {
            projects: discovery.projects,
            tools: discovery.tools.into_iter().map(Arc::new).collect(),
            service_available: discovery.service_available,
        }
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn tools(&self) -> &[Arc<ToolDescriptor>] {
        &self.tools
    }

    pub fn service_available(&self) -> bool {
        self.service_available
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Find a tool by its `(project, name)` identity.
    pub fn find(&self, project: &str, tool: &str) -> Option<Arc<ToolDescriptor>> {
        self.tools
            .iter()
            .find(|t| t.key() == (project, tool))
            .cloned()
    }
}

/// Shared, refreshable tool catalog.
pub struct CapabilityRegistry {
    service: Arc<dyn ServiceApi>,
    catalog: RwLock<Arc<Catalog>>,
}

impl CapabilityRegistry {
    /// Create a registry with an empty catalog. Call
    /// [`refresh`](Self::refresh) to populate it.
    pub fn new(service: Arc<dyn ServiceApi>) -> Self {
        Self {
            service,
            catalog: RwLock::new(Arc::new(Catalog::default())),
        }
    }

    /// Current catalog snapshot.
    pub async fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&*self.catalog.read().await)
    }

    /// Look up a tool in the current catalog.
    pub async fn find(&self, project: &str, tool: &str) -> Option<Arc<ToolDescriptor>> {
        self.catalog.read().await.find(project, tool)
    }

    /// Re-run discovery and install the result. Returns the warnings
    /// produced along the way.
    pub async fn refresh(&self) -> Vec<String> {
        let mut discovery = self.discover().await;
        let warnings = std::mem::take(&mut discovery.warnings);
        let catalog = Arc::new(Catalog::from_discovery(discovery));

        tracing::info!(
            projects = catalog.projects().len(),
            tools = catalog.tools().len(),
            warnings = warnings.len(),
            "Tool catalog refreshed",
        );

        *self.catalog.write().await = catalog;
        warnings
    }

    /// Fetch the full catalog from the service without installing it.
    pub async fn discover(&self) -> Discovery {
        let mut discovery = Discovery::default();

        let projects = match self.service.list_projects().await {
            Ok(projects) => projects,
            Err(e) => {
                tracing::warn!(error = %e, "Tool discovery failed, service unavailable");
                discovery
                    .warnings
                    .push(format!("GeoEngine service unavailable: {e}"));
                return discovery;
            }
        };
        discovery.service_available = true;

        for project in &projects {
            match self.service.list_tools(&project.name).await {
                Ok(tools) => {
                    for info in tools {
                        if let Some(tool) =
                            normalize_tool(&project.name, info, &mut discovery.warnings)
                        {
                            discovery.tools.push(tool);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        project = %project.name,
                        error = %e,
                        "Skipping project, tool listing failed",
                    );
                    discovery.warnings.push(format!(
                        "Skipping project '{}': failed to list tools: {e}",
                        project.name
                    ));
                }
            }
        }

        discovery.projects = projects;
        discovery
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Convert one published tool into a [`ToolDescriptor`].
///
/// Returns `None` (with a warning) for a tool without a name.
pub fn normalize_tool(
    project: &str,
    info: ToolInfo,
    warnings: &mut Vec<String>,
) -> Option<ToolDescriptor> {
    if info.name.trim().is_empty() {
        warnings.push(format!("Skipping unnamed tool in project '{project}'"));
        return None;
    }

    let context = format!("{project}/{}", info.name);
    let inputs = normalize_parameters(
        &context,
        info.inputs.unwrap_or_default(),
        Direction::Input,
        warnings,
    );
    let outputs = normalize_parameters(
        &context,
        info.outputs.unwrap_or_default(),
        Direction::Output,
        warnings,
    );

    Some(ToolDescriptor {
        project: project.to_string(),
        label: info.label.unwrap_or_else(|| info.name.clone()),
        description: info.description.unwrap_or_default(),
        name: info.name,
        inputs,
        outputs,
    })
}

fn normalize_parameters(
    context: &str,
    params: Vec<ParameterInfo>,
    direction: Direction,
    warnings: &mut Vec<String>,
) -> Vec<ParameterSpec> {
    let mut seen = HashSet::new();
    let mut specs = Vec::with_capacity(params.len());

    for info in params {
        if !seen.insert(info.name.clone()) {
            warnings.push(format!(
                "{context}: duplicate {direction:?} parameter '{}' ignored",
                info.name
            ));
            continue;
        }

        let kind = ParamKind::parse(&info.param_type);
        if let ParamKind::Unknown(raw) = &kind {
            tracing::debug!(
                tool = %context,
                parameter = %info.name,
                kind = %raw,
                "Unknown parameter kind, presenting as string",
            );
        }

        let default = match info.default {
            Some(value) if value.is_null() => None,
            Some(value) if !kind.accepts(&value) => {
                warnings.push(format!(
                    "{context}: default {value} of parameter '{}' does not match kind '{kind}', dropped",
                    info.name
                ));
                None
            }
            other => other,
        };

        specs.push(ParameterSpec {
            label: info.label.unwrap_or_else(|| info.name.clone()),
            name: info.name,
            kind,
            required: info.required,
            default,
            description: info.description,
            choices: info.choices.unwrap_or_default(),
        });
    }

    specs
}
