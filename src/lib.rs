//! Pulse: news aggregation over several upstream providers.
//!
//! This crate wires the [`pulse_search`] engine into an HTTP service:
//! configuration is loaded from TOML and environment variables, the engine
//! is assembled from that configuration, and axum serves it.
//!
//! # Architecture
//!
//! - **Config**: [`config::ServiceConfig`], file first, environment on top
//! - **Assembly**: [`app::build_service`] registers providers, cache, index and embedder
//! - **HTTP**: [`server::router`] maps routes onto [`pulse_search::PulseService`]
//! - **Errors**: [`error::ApiError`] renders engine failures as JSON bodies

pub mod app;
pub mod config;
pub mod error;
pub mod server;

pub use app::build_service;
pub use config::ServiceConfig;
pub use error::{ApiError, Result, ServiceError};
pub use server::{AppState, router};
