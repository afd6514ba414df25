//! Standalone x402 gate server.
//!
//! Runs an HTTP reverse proxy with the payment gate registered in front of a
//! single backend, plus a mock facilitator for local development.
//!
//! # Modules
//!
//! - [`config`] - Server configuration with environment variable expansion
//! - [`proxy`] - Reverse proxy handler
//! - [`mock`] - In-memory facilitator
//! - [`error`] - Server error types
//! - [`util`] - Signal handling

pub mod config;
pub mod error;
pub mod mock;
pub mod proxy;
pub mod util;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use error::{ProxyError, ServerError};

/// Builds the gate server router.
///
/// `GET /health` is answered locally; every other request goes through the
/// payment gate and then to the backend.
///
/// # Errors
///
/// Returns [`ServerError`] if the gate configuration is invalid or the
/// backend client cannot be built.
pub fn gate_router(config: &ServerConfig) -> Result<Router, ServerError> {
    let proxy = proxy::Proxy::try_new(
        config.backend_url.clone(),
        Duration::from_secs(config.backend_timeout_seconds),
        config.max_body_bytes,
    )?;
    let gated = x402_gate::register_handler(
        &config.extra_config,
        proxy::proxy_router(Arc::new(proxy)),
    )?;

    Ok(Router::new()
        .route("/health", get(health))
        .fallback_service(gated)
        .layer(TraceLayer::new_for_http()))
}

/// Health check endpoint.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
