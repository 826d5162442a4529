//! GeoEngine control-plane client.
//!
//! Provides the [`ServiceApi`](service::ServiceApi) capability trait, its
//! HTTP/JSON implementation [`GeoEngineApi`](api::GeoEngineApi), the wire
//! models exchanged with the service, and environment-driven connection
//! settings.
//!
//! This layer is stateless and never retries: each method is exactly one
//! request. Retry policy belongs to the job lifecycle.

pub mod api;
pub mod config;
pub mod models;
pub mod service;

pub use api::GeoEngineApi;
pub use service::{ServiceApi, ServiceClientError};
