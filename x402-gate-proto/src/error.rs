//! Error types for payment header decoding.

/// A client-supplied payment header could not be turned into a [`PaymentPayload`].
///
/// Every variant is the client's fault; the gate answers with a 400-class
/// status and never contacts the facilitator.
///
/// [`PaymentPayload`]: crate::PaymentPayload
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The header is not valid standard base64.
    #[error("Invalid payment header encoding: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The decoded bytes are not JSON matching the payment payload schema.
    #[error("Invalid payment payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload carries an empty signature.
    #[error("Invalid payment payload: signature is empty")]
    MissingSignature,
}
