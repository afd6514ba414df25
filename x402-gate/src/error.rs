//! Error types for the payment gate.
//!
//! [`PaygateError`] covers every way a request can be refused before or while
//! it is forwarded. Each variant maps to exactly one response status.
//! [`SettlementError`] is post-hoc: it is handed to hooks and logged, never
//! returned to the caller.

use x402_gate_proto::{DecodeError, PaymentRequired};

/// Request-terminating outcomes of the gate.
#[derive(Debug, thiserror::Error)]
pub enum PaygateError {
    /// No payment header was presented. Answered with `402` and the challenge body.
    #[error("payment required")]
    PaymentRequired(Box<PaymentRequired>),
    /// The payment header could not be decoded. Answered with `400`.
    #[error("invalid payment header: {0}")]
    InvalidPaymentHeader(#[from] DecodeError),
    /// The facilitator judged the payment invalid. Answered with `401`.
    #[error("payment rejected: {}", reason.as_deref().unwrap_or("no reason given"))]
    Rejected {
        /// Reason reported by the facilitator.
        reason: Option<String>,
    },
    /// The facilitator could not be reached or answered nonsense. Answered with `500`.
    #[error("payment verification failed: {0}")]
    VerificationTransport(String),
    /// The downstream response body could not be captured. Answered with `502`.
    #[error("backend response could not be read: {0}")]
    BackendCapture(String),
}

/// Failure to settle a payment after the backend already served the request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettlementError {
    /// The settle call itself failed.
    #[error("settlement request failed: {0}")]
    Transport(String),
    /// The facilitator answered but reported failure.
    #[error("settlement failed: {}", reason.as_deref().unwrap_or("no reason given"))]
    Failed {
        /// Reason reported by the facilitator.
        reason: Option<String>,
        /// Network the settlement targeted.
        network: String,
        /// Payer, if the facilitator reported one.
        payer: Option<String>,
    },
}
