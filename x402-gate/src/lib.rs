//! Pay-per-request [x402](https://www.x402.org) gate for HTTP backends.
//!
//! The gate sits in front of an existing API. Requests without a payment get
//! a `402 Payment Required` challenge describing the price. Requests carrying a
//! payment are verified with a facilitator, stripped of the payment header,
//! given the backend's own credential, and forwarded. Once the backend answers
//! with a 2xx status, the payment is settled.
//!
//! # Modules
//!
//! - [`config`] - Raw and validated gate configuration
//! - [`facilitator`] - The [`Facilitator`] trait
//! - [`facilitator_client`] - HTTP facilitator client
//! - [`paygate`] - Per-request decision engine
//! - [`handoff`] - Credential handoff on forwarded requests
//! - [`capture`] - Bounded capture of the backend response
//! - [`hooks`] - Verify and settle lifecycle hooks
//! - [`layer`] - Tower layer and host registration entry point
//!
//! # Feature Flags
//!
//! - `telemetry` (default) - Emits `tracing` spans and events.

pub mod capture;
pub mod config;
pub mod constants;
pub mod error;
pub mod facilitator;
pub mod facilitator_client;
pub mod handoff;
pub mod hooks;
pub mod layer;
pub mod paygate;

pub use config::{ConfigError, GateConfig, GateSettings};
pub use error::{PaygateError, SettlementError};
pub use facilitator::Facilitator;
pub use facilitator_client::{FacilitatorClient, FacilitatorClientError, FacilitatorEndpoint};
pub use hooks::{NoopHooks, PaygateHooks};
pub use layer::{X402Gate, X402GateService, register_handler};
pub use paygate::{Paygate, SecureConnection, resource_url};

pub use x402_gate_proto as proto;
