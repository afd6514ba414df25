//! The facilitator seam.
//!
//! The gate never verifies signatures or touches chain state itself. It hands
//! the payload and the requirements to a [`Facilitator`] and trusts the verdict.
//! [`FacilitatorClient`](crate::facilitator_client::FacilitatorClient) is the
//! HTTP implementation; tests and embedders may supply their own.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use x402_gate_proto::{SettleOutcome, SettleRequest, VerifyOutcome, VerifyRequest};

/// Boxed future returned by [`Facilitator`] methods.
pub type FacilitatorFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// A party that verifies and settles payment authorizations.
///
/// An `Err` from either method is a transport-level failure (unreachable
/// peer, timeout, undecodable answer). A payment the facilitator merely
/// refuses comes back as `Ok` with `is_valid == false` or `success == false`.
pub trait Facilitator: Send + Sync {
    /// Transport error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Verifies a payment authorization without settling it.
    fn verify<'a>(
        &'a self,
        request: &'a VerifyRequest,
    ) -> FacilitatorFuture<'a, VerifyOutcome, Self::Error>;

    /// Settles a previously verified payment.
    fn settle<'a>(
        &'a self,
        request: &'a SettleRequest,
    ) -> FacilitatorFuture<'a, SettleOutcome, Self::Error>;
}

impl<T: Facilitator + ?Sized> Facilitator for Arc<T> {
    type Error = T::Error;

    fn verify<'a>(
        &'a self,
        request: &'a VerifyRequest,
    ) -> FacilitatorFuture<'a, VerifyOutcome, Self::Error> {
        (**self).verify(request)
    }

    fn settle<'a>(
        &'a self,
        request: &'a SettleRequest,
    ) -> FacilitatorFuture<'a, SettleOutcome, Self::Error> {
        (**self).settle(request)
    }
}
