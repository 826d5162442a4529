//! `geoengine-bridge` library crate.
//!
//! Connects a GIS host to a GeoEngine service: discovers the tool
//! catalog, exposes each tool as a host operation, and drives submitted
//! jobs to a terminal outcome on their own tasks, reporting progress
//! through an event channel. The binary entrypoint lives in `main.rs`.

pub mod config;
pub mod events;
pub mod host;
pub mod lifecycle;
pub mod operation;
pub mod provider;
pub mod registry;
