//! Observability plumbing for the service.
//!
//! The metric families themselves live in `mlserve_core::metrics`; this module
//! feeds them from the HTTP layer and exports them through `/metrics`.

pub mod connections;
pub mod pipeline;
pub mod resources;

pub use pipeline::MetricsPipeline;
