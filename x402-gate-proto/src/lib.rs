#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Wire types for the x402 payment gate.
//!
//! This crate holds everything that crosses a process boundary in the
//! three-party exchange between a paying client, the gate, and the
//! facilitator that verifies and settles payment authorizations.
//!
//! # Modules
//!
//! - [`version`] - Protocol version marker that serializes as a bare integer
//! - [`types`] - Payment requirements, payloads, and facilitator messages
//! - [`encoding`] - Base64 wrapper used for header transport
//! - [`codec`] - Header decoding and JSON encoding of gate messages
//! - [`error`] - Decode failures for client-supplied payment headers

pub mod codec;
pub mod encoding;
pub mod error;
pub mod types;
pub mod version;

pub use codec::{
    decode_payment_header, encode_payment_header, encode_payment_required, encode_requirements,
};
pub use encoding::Base64Bytes;
pub use error::DecodeError;
pub use types::{
    ExactEvmAuthorization, ExactEvmPayload, FacilitatorRequest, PaymentPayload, PaymentRequired,
    PaymentRequirements, SettleOutcome, SettleRequest, VerifyOutcome, VerifyRequest,
};
pub use version::{V1, X402Version1};
