//! Header encoding and decoding for gate messages.
//!
//! Payment payloads travel as base64-encoded JSON in a request header. The
//! gate's own messages (requirements and the 402 body) are plain JSON.

use crate::encoding::Base64Bytes;
use crate::error::DecodeError;
use crate::types::{PaymentPayload, PaymentRequired, PaymentRequirements};

/// Decodes a payment header value into a [`PaymentPayload`].
///
/// The header must be standard base64 wrapping a JSON document that matches
/// the payload schema and carries a non-empty signature.
///
/// # Errors
///
/// Returns [`DecodeError`] if the header is not base64, not a matching JSON
/// document, or has an empty signature.
pub fn decode_payment_header(header: &[u8]) -> Result<PaymentPayload, DecodeError> {
    let json = Base64Bytes::from(header).decode()?;
    let payload: PaymentPayload = serde_json::from_slice(&json)?;
    if payload.signature().trim().is_empty() {
        return Err(DecodeError::MissingSignature);
    }
    Ok(payload)
}

/// Encodes a [`PaymentPayload`] as a base64 string suitable for the payment header.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn encode_payment_header(payload: &PaymentPayload) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(payload)?;
    Ok(Base64Bytes::encode(json).to_string())
}

/// Serializes [`PaymentRequirements`] into a JSON document.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn encode_requirements(
    requirements: &PaymentRequirements,
) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::to_value(requirements)
}

/// Serializes a [`PaymentRequired`] body into JSON bytes.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn encode_payment_required(body: &PaymentRequired) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExactEvmAuthorization, ExactEvmPayload};
    use serde_json::json;

    fn sample_payload() -> PaymentPayload {
        PaymentPayload {
            x402_version: 1,
            scheme: "exact".into(),
            network: "filecoin-calibration".into(),
            payload: ExactEvmPayload {
                signature: "0x2d6a7588d6acca505cbf0d9a4a227e0c52c6c34008c8e8986a1283259764173608a2ce6496642e377d6da8dbbf5836e9bd15092f9ecab05ded3d6293af148b571c".into(),
                authorization: ExactEvmAuthorization {
                    from: "0x857b06519E91e3A54538791bDbb0E22373e36b66".into(),
                    to: "0x209693Bc6afc0C5328bA36FaF03C514EF312287C".into(),
                    value: "10000".into(),
                    valid_after: "1740672089".into(),
                    valid_before: "1740672154".into(),
                    nonce: "0xf3746613c2d920b5fdabc0856f2aeb2d4f88ee6037b8cc5d04a71a4462f13480"
                        .into(),
                },
            },
        }
    }

    #[test]
    fn test_payload_roundtrip_through_header() {
        let original = sample_payload();
        let header = encode_payment_header(&original).unwrap();
        let decoded = decode_payment_header(header.as_bytes()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        let err = decode_payment_header(b"not base64!!").unwrap_err();
        assert!(matches!(err, DecodeError::Base64(_)));
    }

    #[test]
    fn test_decode_rejects_non_json() {
        let header = Base64Bytes::encode("definitely not json").to_string();
        let err = decode_payment_header(header.as_bytes()).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn test_decode_rejects_json_missing_authorization() {
        let body = json!({
            "x402Version": 1,
            "scheme": "exact",
            "network": "filecoin-calibration",
            "payload": { "signature": "0xabc" }
        });
        let header = Base64Bytes::encode(body.to_string()).to_string();
        let err = decode_payment_header(header.as_bytes()).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn test_decode_passes_through_unknown_versions() {
        for version in [json!(2), json!(256), json!(-1)] {
            let mut body = serde_json::to_value(sample_payload()).unwrap();
            body["x402Version"] = version.clone();
            let header = Base64Bytes::encode(body.to_string()).to_string();
            let decoded = decode_payment_header(header.as_bytes()).unwrap();
            assert_eq!(json!(decoded.x402_version), version);
        }
    }

    #[test]
    fn test_decode_rejects_empty_signature() {
        let mut payload = sample_payload();
        payload.payload.signature = "   ".into();
        let header = encode_payment_header(&payload).unwrap();
        let err = decode_payment_header(header.as_bytes()).unwrap_err();
        assert!(matches!(err, DecodeError::MissingSignature));
    }

    #[test]
    fn test_encode_requirements_uses_wire_names() {
        let requirements = PaymentRequirements {
            scheme: "exact".into(),
            network: "base-sepolia".into(),
            max_amount_required: "1".into(),
            resource: "http://localhost/".into(),
            description: String::new(),
            mime_type: "application/json".into(),
            pay_to: "0xPayee".into(),
            max_timeout_seconds: 60,
            asset: "0xToken".into(),
            output_schema: None,
            extra: None,
        };
        let value = encode_requirements(&requirements).unwrap();
        assert_eq!(value["maxAmountRequired"], json!("1"));
        assert_eq!(value["maxTimeoutSeconds"], json!(60));
        assert!(value.get("extra").is_none());

        let body = encode_payment_required(&PaymentRequired::single(requirements)).unwrap();
        let parsed: PaymentRequired = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.accepts[0].pay_to, "0xPayee");
    }
}
