//! Lifecycle hooks for the payment gate.
//!
//! Hooks let the host observe verification and settlement without changing
//! their outcome. Settlement failures in particular are never reported to the
//! paying client; [`PaygateHooks::on_settle_failure`] is where reconciliation
//! or alerting plugs in.
//!
//! Implement [`PaygateHooks`] with only the hooks you need. All methods have
//! default no-op implementations.

use std::future::Future;
use std::pin::Pin;

use x402_gate_proto::{FacilitatorRequest, SettleOutcome, VerifyOutcome};

use crate::error::SettlementError;

/// Boxed future returned by hook methods.
pub type HookFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Observers of the verify and settle lifecycle.
///
/// This trait is dyn-compatible; the gate stores it as `Arc<dyn PaygateHooks>`.
pub trait PaygateHooks: Send + Sync {
    /// Called after the facilitator answered a verify call, valid or not.
    fn after_verify<'a>(
        &'a self,
        _request: &'a FacilitatorRequest,
        _outcome: &'a VerifyOutcome,
    ) -> HookFuture<'a> {
        Box::pin(async {})
    }

    /// Called after a successful settlement.
    fn after_settle<'a>(
        &'a self,
        _request: &'a FacilitatorRequest,
        _outcome: &'a SettleOutcome,
    ) -> HookFuture<'a> {
        Box::pin(async {})
    }

    /// Called when settlement failed after the backend served the request.
    fn on_settle_failure<'a>(
        &'a self,
        _request: &'a FacilitatorRequest,
        _error: &'a SettlementError,
    ) -> HookFuture<'a> {
        Box::pin(async {})
    }
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl PaygateHooks for NoopHooks {}
