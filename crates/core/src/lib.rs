//! Domain types shared by the GeoEngine bridge crates.
//!
//! Pure data and pure functions only: the tool catalog model, job status
//! ranking, invocation validation, and the host parameter type mapper.
//! Nothing in this crate performs I/O.

pub mod error;
pub mod job;
pub mod params;
pub mod types;
