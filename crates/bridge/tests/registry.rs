//! Discovery and catalog refresh against a scripted service.

mod common;

use std::sync::Arc;

use common::*;
use geoengine_bridge::registry::CapabilityRegistry;

#[tokio::test]
async fn failing_project_is_skipped_with_one_warning() {
    let service = Arc::new(
        ScriptedService::new()
            .with_projects(Ok(vec![project("A"), project("B")]))
            .with_tools("A", Err(service_error(500, "broken manifest")))
            .with_tools("B", Ok(vec![tool_info("buffer"), tool_info("clip")])),
    );
    let registry = CapabilityRegistry::new(service.clone());

    let discovery = registry.discover().await;

    assert!(discovery.service_available);
    assert_eq!(discovery.projects.len(), 2);
    assert_eq!(discovery.warnings.len(), 1);
    assert!(discovery.warnings[0].contains("'A'"));
    let tools: Vec<_> = discovery.tools.iter().map(|t| (t.project.as_str(), t.name.as_str())).collect();
    assert_eq!(tools, vec![("B", "buffer"), ("B", "clip")]);
    assert_eq!(ScriptedService::count(&service.calls.list_tools), 2);
}

#[tokio::test]
async fn unavailable_service_yields_empty_catalog() {
    let service = Arc::new(ScriptedService::new().with_projects(Err(unreachable())));
    let registry = CapabilityRegistry::new(service.clone());

    let discovery = registry.discover().await;

    assert!(!discovery.service_available);
    assert!(discovery.tools.is_empty());
    assert_eq!(discovery.warnings.len(), 1);
    assert_eq!(ScriptedService::count(&service.calls.list_tools), 0);
}

#[tokio::test]
async fn discover_does_not_install_the_catalog() {
    let service = Arc::new(
        ScriptedService::new()
            .with_projects(Ok(vec![project("B")]))
            .with_tools("B", Ok(vec![tool_info("buffer")])),
    );
    let registry = CapabilityRegistry::new(service);

    let discovery = registry.discover().await;

    assert_eq!(discovery.tools.len(), 1);
    assert!(registry.catalog().await.is_empty());
}

#[tokio::test]
async fn refresh_swaps_the_snapshot() {
    let service = Arc::new(
        ScriptedService::new()
            .with_projects(Ok(vec![project("B")]))
            .with_tools("B", Ok(vec![tool_info("buffer")])),
    );
    let registry = CapabilityRegistry::new(service.clone());

    let warnings = registry.refresh().await;
    assert!(warnings.is_empty());
    let before = registry.catalog().await;
    assert_eq!(before.tools().len(), 1);
    assert!(registry.find("B", "buffer").await.is_some());

    *service.tools.lock().unwrap() = [(
        "B".to_string(),
        Ok(vec![tool_info("buffer"), tool_info("clip")]),
    )]
    .into_iter()
    .collect();
    registry.refresh().await;

    // Readers holding the old snapshot keep their view.
    assert_eq!(before.tools().len(), 1);
    assert!(before.find("B", "clip").is_none());

    let after = registry.catalog().await;
    assert_eq!(after.tools().len(), 2);
    assert!(after.find("B", "clip").is_some());
}

#[tokio::test]
async fn refresh_after_outage_clears_the_catalog() {
    let service = Arc::new(
        ScriptedService::new()
            .with_projects(Ok(vec![project("B")]))
            .with_tools("B", Ok(vec![tool_info("buffer")])),
    );
    let registry = CapabilityRegistry::new(service.clone());
    registry.refresh().await;

    *service.projects.lock().unwrap() = Some(Err(unreachable()));
    let warnings = registry.refresh().await;

    assert_eq!(warnings.len(), 1);
    let catalog = registry.catalog().await;
    assert!(catalog.is_empty());
    assert!(!catalog.service_available());
}

#[tokio::test]
async fn tool_descriptors_carry_labels_and_parameters() {
    let service = Arc::new(
        ScriptedService::new()
            .with_projects(Ok(vec![project("hydro")]))
            .with_tools("hydro", Ok(vec![tool_info("fill_sinks")])),
    );
    let registry = CapabilityRegistry::new(service);
    registry.refresh().await;

    let tool = registry.find("hydro", "fill_sinks").await.unwrap();
    assert_eq!(tool.label, "fill_sinks label");
    assert_eq!(tool.operation_id(), "hydro_fill_sinks");
    assert_eq!(tool.inputs[0].name, "dem");
    assert_eq!(tool.outputs[0].name, "filled");
}
