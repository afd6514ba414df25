//! Protocol version 1 wire types spoken by the gate.
//!
//! All types serialize to JSON using camelCase field names. Field names are
//! part of the wire contract with both paying clients and the facilitator.
//!
//! # Key Types
//!
//! - [`PaymentRequirements`] - Payment terms the gate demands for a resource
//! - [`PaymentPayload`] - Signed payment authorization from the client
//! - [`PaymentRequired`] - HTTP 402 response body
//! - [`FacilitatorRequest`] - Envelope posted to the facilitator's verify and settle endpoints
//! - [`VerifyOutcome`] / [`SettleOutcome`] - Facilitator verdicts

use serde::{Deserialize, Serialize};

use crate::version::X402Version1;

/// Payment requirements set by the gate.
///
/// Defines the terms under which a payment will be accepted for one resource.
/// Built fresh for every request from static configuration plus the request's
/// own URL and never persisted.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// The payment scheme (always `"exact"`).
    pub scheme: String,
    /// The network name (e.g., `"filecoin-calibration"`).
    pub network: String,
    /// The maximum amount required, as a decimal string in atomic units.
    pub max_amount_required: String,
    /// The resource URL being paid for.
    pub resource: String,
    /// Human-readable description of the resource.
    pub description: String,
    /// MIME type of the resource.
    pub mime_type: String,
    /// The recipient address for payment.
    pub pay_to: String,
    /// Maximum time in seconds for payment validity.
    pub max_timeout_seconds: u64,
    /// The token asset address.
    pub asset: String,
    /// Optional JSON schema for the resource output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    /// Scheme-specific extra data, such as the `{name, version}` signing domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// A signed payment authorization from the client.
///
/// The version is carried as a plain integer: judging whether it is acceptable
/// is the facilitator's job.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version declared by the client.
    pub x402_version: i64,
    /// The payment scheme (e.g., `"exact"`).
    pub scheme: String,
    /// The network name.
    pub network: String,
    /// The scheme-specific signed payload.
    pub payload: ExactEvmPayload,
}

impl PaymentPayload {
    /// Returns the signature carried by this payload.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.payload.signature
    }
}

/// Signed ERC-3009 style transfer authorization.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    /// Signature over the authorization.
    pub signature: String,
    /// The authorization body that was signed.
    pub authorization: ExactEvmAuthorization,
}

/// Body of a transfer authorization.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmAuthorization {
    /// Payer address.
    pub from: String,
    /// Payee address.
    pub to: String,
    /// Authorized value in atomic units.
    pub value: String,
    /// Unix timestamp after which the authorization is valid.
    pub valid_after: String,
    /// Unix timestamp before which the authorization is valid.
    pub valid_before: String,
    /// Unique nonce preventing replay.
    pub nonce: String,
}

/// HTTP 402 Payment Required response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// List of acceptable payment methods.
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
    /// Optional error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaymentRequired {
    /// Creates a challenge offering a single set of requirements.
    #[must_use]
    pub fn single(requirements: PaymentRequirements) -> Self {
        Self {
            x402_version: crate::V1,
            accepts: vec![requirements],
            error: None,
        }
    }
}

/// Body posted to the facilitator's verify and settle endpoints.
///
/// Both endpoints take the same shape, so a single envelope built once per
/// request is reused for verification and settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorRequest {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// The client's payment payload, forwarded untouched.
    pub payment_payload: PaymentPayload,
    /// The requirements the payload is checked against.
    pub payment_requirements: PaymentRequirements,
}

/// Request to verify a payment.
pub type VerifyRequest = FacilitatorRequest;

/// Request to settle a verified payment.
pub type SettleRequest = FacilitatorRequest;

/// Facilitator verdict on a payment payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    /// Whether the payment may be accepted.
    pub is_valid: bool,
    /// Why the payment was rejected, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    /// The payer's address, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

/// Facilitator result of a settlement attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleOutcome {
    /// Whether the payment was settled.
    pub success: bool,
    /// Why settlement failed, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    /// Transaction identifier (empty when settlement failed).
    #[serde(default)]
    pub transaction: String,
    /// Network the settlement was submitted to.
    #[serde(default)]
    pub network: String,
    /// The payer's address, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: "filecoin-calibration".into(),
            max_amount_required: "10000".into(),
            resource: "https://api.example.com/v1/weather?lat=1".into(),
            description: "Weather data".into(),
            mime_type: "application/json".into(),
            pay_to: "0xPayee".into(),
            max_timeout_seconds: 300,
            asset: "0xToken".into(),
            output_schema: None,
            extra: Some(json!({ "name": "USD for Filecoin Community", "version": "1" })),
        }
    }

    #[test]
    fn test_requirements_wire_keys() {
        let value = serde_json::to_value(sample_requirements()).unwrap();
        let keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        let mut expected = vec![
            "scheme",
            "network",
            "maxAmountRequired",
            "resource",
            "description",
            "mimeType",
            "payTo",
            "maxTimeoutSeconds",
            "asset",
            "extra",
        ];
        let mut keys = keys;
        keys.sort_unstable();
        expected.sort_unstable();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_requirements_output_schema_serialized_when_present() {
        let mut requirements = sample_requirements();
        requirements.output_schema = Some(json!({ "type": "object" }));
        let value = serde_json::to_value(requirements).unwrap();
        assert_eq!(value["outputSchema"], json!({ "type": "object" }));
    }

    #[test]
    fn test_payment_required_shape() {
        let body = PaymentRequired::single(sample_requirements());
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["x402Version"], json!(1));
        assert_eq!(value["accepts"].as_array().unwrap().len(), 1);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_verify_outcome_optional_fields() {
        let outcome: VerifyOutcome = serde_json::from_str(r#"{"isValid":true}"#).unwrap();
        assert!(outcome.is_valid);
        assert!(outcome.invalid_reason.is_none());
        assert!(outcome.payer.is_none());

        let outcome: VerifyOutcome = serde_json::from_str(
            r#"{"isValid":false,"invalidReason":"insufficient_funds","payer":"0xabc"}"#,
        )
        .unwrap();
        assert_eq!(outcome.invalid_reason.as_deref(), Some("insufficient_funds"));
        assert_eq!(outcome.payer.as_deref(), Some("0xabc"));
    }

    #[test]
    fn test_settle_outcome_tolerates_missing_transaction() {
        let outcome: SettleOutcome =
            serde_json::from_str(r#"{"success":false,"errorReason":"Payment already settled"}"#)
                .unwrap();
        assert!(!outcome.success);
        assert!(outcome.transaction.is_empty());
        assert_eq!(outcome.error_reason.as_deref(), Some("Payment already settled"));
    }

    #[test]
    fn test_facilitator_request_envelope() {
        let request = FacilitatorRequest {
            x402_version: crate::V1,
            payment_payload: PaymentPayload {
                x402_version: 1,
                scheme: "exact".into(),
                network: "filecoin-calibration".into(),
                payload: ExactEvmPayload {
                    signature: "0xsig".into(),
                    authorization: ExactEvmAuthorization {
                        from: "0xPayer".into(),
                        to: "0xPayee".into(),
                        value: "10000".into(),
                        valid_after: "0".into(),
                        valid_before: "9999999999".into(),
                        nonce: "0x01".into(),
                    },
                },
            },
            payment_requirements: sample_requirements(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["x402Version"], json!(1));
        assert_eq!(
            value["paymentPayload"]["payload"]["authorization"]["validBefore"],
            json!("9999999999")
        );
        assert_eq!(value["paymentRequirements"]["payTo"], json!("0xPayee"));
    }
}
