//! mlserve gateway library entry.
//!
//! This crate wires the model registry and metrics recorder from
//! `mlserve-core` into an axum service: the predict endpoint, operational
//! endpoints, the off-path metrics pipeline and background tasks. It is
//! consumed by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod background;
pub mod config;
pub mod inference;
pub mod obs;
pub mod ops;
pub mod router;
