//! Gate configuration.
//!
//! [`GateConfig`] is the raw, deserializable form supplied by the host at
//! registration time. [`GateConfig::validate`] checks it once at startup and
//! produces [`GateSettings`], the parsed and immutable form the gate reads on
//! every request.
//!
//! # Example Configuration
//!
//! ```json
//! {
//!   "x402-payment-gate": {
//!     "facilitator_url": "https://facilitator.example",
//!     "backend_api_key": "secret",
//!     "payment_header_name": "X-PAYMENT",
//!     "auth_header_name": "X-API-KEY",
//!     "payment_address": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
//!     "max_amount_required": "10000",
//!     "network": "filecoin-calibration",
//!     "description": "Weather data",
//!     "asset": "0xb3042734b608a1B16e9e86B374A3f3e389B4cDf0"
//!   }
//! }
//! ```

use std::fmt;
use std::time::Duration;

use http::{HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use url::Url;
use x402_gate_proto::PaymentRequirements;

use crate::constants::{
    DEFAULT_FACILITATOR_TIMEOUT, DEFAULT_MAX_CAPTURED_BODY_BYTES, DEFAULT_MAX_TIMEOUT_SECONDS,
    DEFAULT_MIME_TYPE, DEFAULT_TOKEN_NAME, DEFAULT_TOKEN_VERSION, PLUGIN_NAME, SCHEME_EXACT,
};
use crate::facilitator_client::FacilitatorClientError;

/// Errors detected while loading or validating the gate configuration.
///
/// All of them are fatal: the gate refuses to start.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The host's extra-config map has no entry for the gate.
    #[error("plugin configuration not found under \"{0}\"")]
    NamespaceNotFound(&'static str),
    /// The configuration entry does not have the expected shape.
    #[error("could not parse plugin configuration: {0}")]
    Malformed(#[from] serde_json::Error),
    /// A required field is missing or empty.
    #[error("missing required config field: {0}")]
    MissingField(&'static str),
    /// The facilitator URL does not parse.
    #[error("invalid facilitator_url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// A configured header name is not a valid HTTP header name.
    #[error("invalid header name in {field}: {value}")]
    InvalidHeaderName {
        /// The offending configuration field.
        field: &'static str,
        /// The rejected value.
        value: String,
    },
    /// The backend credential cannot be sent as an HTTP header value.
    #[error("backend_api_key is not a valid header value")]
    InvalidHeaderValue,
    /// The amount is not an unsigned decimal integer in atomic units.
    #[error("max_amount_required must be a decimal integer in atomic units, got {0:?}")]
    InvalidAmount(String),
    /// The facilitator client could not be built from the configured URL.
    #[error("invalid facilitator endpoint: {0}")]
    Facilitator(#[from] FacilitatorClientError),
}

/// Raw gate configuration as supplied by the host.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Base URL of the facilitator service.
    pub facilitator_url: String,
    /// Static credential injected into forwarded requests.
    pub backend_api_key: String,
    /// Request header carrying the base64 payment payload.
    pub payment_header_name: String,
    /// Request header the backend reads its credential from.
    pub auth_header_name: String,
    /// Payee address.
    pub payment_address: String,
    /// Price in atomic units, as a decimal string.
    pub max_amount_required: String,
    /// Network identifier.
    pub network: String,
    /// Human description of the protected resource.
    pub description: String,
    /// Token contract address.
    pub asset: String,
    /// Payment validity window in seconds (`0` selects the default of 300).
    pub max_timeout_seconds: u64,
    /// MIME type of the protected resource (empty selects `application/json`).
    pub mime_type: String,
    /// Budget for each facilitator call in seconds (`0` selects the default of 30).
    pub facilitator_timeout_seconds: u64,
    /// Signing-domain name advertised in `extra`.
    pub token_name: Option<String>,
    /// Signing-domain version advertised in `extra`.
    pub token_version: Option<String>,
    /// Optional output schema advertised in requirements.
    pub output_schema: Option<serde_json::Value>,
    /// Honor the debug bypass signature. Never enable in production.
    pub debug_bypass: bool,
    /// Upper bound on a downstream response body held for inspection (`0` selects 10 MiB).
    pub max_captured_body_bytes: usize,
}

impl fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateConfig")
            .field("facilitator_url", &self.facilitator_url)
            .field("backend_api_key", &"<redacted>")
            .field("payment_header_name", &self.payment_header_name)
            .field("auth_header_name", &self.auth_header_name)
            .field("payment_address", &self.payment_address)
            .field("max_amount_required", &self.max_amount_required)
            .field("network", &self.network)
            .field("description", &self.description)
            .field("asset", &self.asset)
            .field("max_timeout_seconds", &self.max_timeout_seconds)
            .field("mime_type", &self.mime_type)
            .field("facilitator_timeout_seconds", &self.facilitator_timeout_seconds)
            .field("debug_bypass", &self.debug_bypass)
            .finish_non_exhaustive()
    }
}

impl GateConfig {
    /// Reads the gate's entry from a host extra-config map.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NamespaceNotFound`] if the map has no gate entry,
    /// or [`ConfigError::Malformed`] if the entry cannot be deserialized.
    pub fn from_extra(
        extra: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, ConfigError> {
        let raw = extra
            .get(PLUGIN_NAME)
            .ok_or(ConfigError::NamespaceNotFound(PLUGIN_NAME))?;
        Ok(Self::deserialize(raw)?)
    }

    /// Checks required fields, applies defaults, and parses the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] describing the first problem found.
    pub fn validate(self) -> Result<GateSettings, ConfigError> {
        let required = [
            ("facilitator_url", &self.facilitator_url),
            ("backend_api_key", &self.backend_api_key),
            ("payment_header_name", &self.payment_header_name),
            ("auth_header_name", &self.auth_header_name),
            ("payment_address", &self.payment_address),
            ("max_amount_required", &self.max_amount_required),
            ("network", &self.network),
            ("description", &self.description),
            ("asset", &self.asset),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::MissingField(*field));
        }

        if !self.max_amount_required.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ConfigError::InvalidAmount(self.max_amount_required));
        }

        let mut normalized = self.facilitator_url.trim_end_matches('/').to_owned();
        normalized.push('/');
        let facilitator_url = Url::parse(&normalized)?;

        let payment_header = parse_header_name("payment_header_name", &self.payment_header_name)?;
        let auth_header = parse_header_name("auth_header_name", &self.auth_header_name)?;
        let mut backend_credential = HeaderValue::from_str(&self.backend_api_key)
            .map_err(|_| ConfigError::InvalidHeaderValue)?;
        backend_credential.set_sensitive(true);

        let extra = json!({
            "name": self.token_name.as_deref().unwrap_or(DEFAULT_TOKEN_NAME),
            "version": self.token_version.as_deref().unwrap_or(DEFAULT_TOKEN_VERSION),
        });

        Ok(GateSettings {
            facilitator_url,
            facilitator_timeout: if self.facilitator_timeout_seconds == 0 {
                DEFAULT_FACILITATOR_TIMEOUT
            } else {
                Duration::from_secs(self.facilitator_timeout_seconds)
            },
            payment_header,
            auth_header,
            backend_credential,
            network: self.network,
            max_amount_required: self.max_amount_required,
            description: self.description,
            mime_type: if self.mime_type.is_empty() {
                DEFAULT_MIME_TYPE.to_owned()
            } else {
                self.mime_type
            },
            pay_to: self.payment_address,
            max_timeout_seconds: if self.max_timeout_seconds == 0 {
                DEFAULT_MAX_TIMEOUT_SECONDS
            } else {
                self.max_timeout_seconds
            },
            asset: self.asset,
            output_schema: self.output_schema,
            extra,
            debug_bypass: self.debug_bypass,
            max_captured_body_bytes: if self.max_captured_body_bytes == 0 {
                DEFAULT_MAX_CAPTURED_BODY_BYTES
            } else {
                self.max_captured_body_bytes
            },
        })
    }
}

fn parse_header_name(field: &'static str, value: &str) -> Result<HeaderName, ConfigError> {
    HeaderName::from_bytes(value.trim().as_bytes()).map_err(|_| ConfigError::InvalidHeaderName {
        field,
        value: value.to_owned(),
    })
}

/// Validated, immutable gate settings shared by every request.
#[derive(Debug, Clone)]
pub struct GateSettings {
    /// Facilitator base URL, normalized to end with a slash.
    pub facilitator_url: Url,
    /// Budget for each facilitator call.
    pub facilitator_timeout: Duration,
    /// Header carrying the payment payload.
    pub payment_header: HeaderName,
    /// Header carrying the backend credential.
    pub auth_header: HeaderName,
    /// Backend credential, marked sensitive.
    pub backend_credential: HeaderValue,
    network: String,
    max_amount_required: String,
    description: String,
    mime_type: String,
    pay_to: String,
    max_timeout_seconds: u64,
    asset: String,
    output_schema: Option<serde_json::Value>,
    extra: serde_json::Value,
    /// Whether the debug bypass signature is honored.
    pub debug_bypass: bool,
    /// Upper bound on a downstream response body held for inspection.
    pub max_captured_body_bytes: usize,
}

impl GateSettings {
    /// Builds the payment requirements for a resource.
    ///
    /// This is the only place requirements are constructed, so the 402
    /// challenge and the later verify and settle calls agree field for field.
    #[must_use]
    pub fn requirements_for(&self, resource: String) -> PaymentRequirements {
        PaymentRequirements {
            scheme: SCHEME_EXACT.to_owned(),
            network: self.network.clone(),
            max_amount_required: self.max_amount_required.clone(),
            resource,
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
            pay_to: self.pay_to.clone(),
            max_timeout_seconds: self.max_timeout_seconds,
            asset: self.asset.clone(),
            output_schema: self.output_schema.clone(),
            extra: Some(self.extra.clone()),
        }
    }
}
