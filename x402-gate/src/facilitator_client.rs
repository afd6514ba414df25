//! HTTP client for a remote x402 facilitator.
//!
//! [`FacilitatorClient`] posts the `{x402Version, paymentPayload,
//! paymentRequirements}` envelope to `./api/v1/verify` and `./api/v1/settle`
//! relative to the configured base URL. Only a `200 OK` carrying a decodable
//! outcome is an answer; anything else surfaces as a
//! [`FacilitatorClientError`], which the gate treats as a transport failure.

use std::fmt;
use std::time::Duration;

use http::{HeaderMap, StatusCode};
use reqwest::Client;
use url::Url;
use x402_gate_proto::{
    FacilitatorRequest, SettleOutcome, SettleRequest, VerifyOutcome, VerifyRequest,
};

#[cfg(feature = "telemetry")]
use tracing::{Instrument, Span};

use crate::constants::{SETTLE_PATH, VERIFY_PATH};
use crate::facilitator::{Facilitator, FacilitatorFuture};

/// Longest error body kept from a non-200 facilitator response.
const ERROR_BODY_LIMIT: usize = 512;

/// The two facilitator operations the gate calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacilitatorEndpoint {
    /// `POST /api/v1/verify`
    Verify,
    /// `POST /api/v1/settle`
    Settle,
}

impl FacilitatorEndpoint {
    const fn path(self) -> &'static str {
        match self {
            Self::Verify => VERIFY_PATH,
            Self::Settle => SETTLE_PATH,
        }
    }
}

impl fmt::Display for FacilitatorEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Verify => "verify",
            Self::Settle => "settle",
        })
    }
}

/// Reasons a facilitator call produced no usable outcome.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorClientError {
    /// The base URL cannot be parsed or joined with an endpoint path.
    #[error("invalid facilitator URL for {endpoint}: {source}")]
    InvalidUrl {
        /// Endpoint being resolved.
        endpoint: FacilitatorEndpoint,
        /// Parse failure.
        #[source]
        source: url::ParseError,
    },
    /// Connection failure, timeout, or a body that could not be read.
    #[error("facilitator {endpoint} request failed: {source}")]
    Transport {
        /// Endpoint that was called.
        endpoint: FacilitatorEndpoint,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// The facilitator answered with something other than `200 OK`.
    #[error("facilitator {endpoint} returned {status}: {body}")]
    Status {
        /// Endpoint that was called.
        endpoint: FacilitatorEndpoint,
        /// Status returned.
        status: StatusCode,
        /// Response body, truncated.
        body: String,
    },
    /// A `200 OK` whose body is not the expected outcome.
    #[error("facilitator {endpoint} response is not a valid outcome: {source}")]
    Decode {
        /// Endpoint that was called.
        endpoint: FacilitatorEndpoint,
        /// Deserialization failure.
        #[source]
        source: reqwest::Error,
    },
}

/// A [`Facilitator`] reached over HTTP.
#[derive(Clone, Debug)]
pub struct FacilitatorClient {
    base_url: Url,
    verify_url: Url,
    settle_url: Url,
    client: Client,
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl Facilitator for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn verify<'a>(
        &'a self,
        request: &'a VerifyRequest,
    ) -> FacilitatorFuture<'a, VerifyOutcome, Self::Error> {
        let fut = Self::verify(self, request);
        #[cfg(feature = "telemetry")]
        let fut = fut.instrument(tracing::info_span!(
            "x402.facilitator.verify",
            otel.status_code = tracing::field::Empty,
            error.message = tracing::field::Empty,
        ));
        Box::pin(fut)
    }

    fn settle<'a>(
        &'a self,
        request: &'a SettleRequest,
    ) -> FacilitatorFuture<'a, SettleOutcome, Self::Error> {
        let fut = Self::settle(self, request);
        #[cfg(feature = "telemetry")]
        let fut = fut.instrument(tracing::info_span!(
            "x402.facilitator.settle",
            otel.status_code = tracing::field::Empty,
            error.message = tracing::field::Empty,
        ));
        Box::pin(fut)
    }
}

impl FacilitatorClient {
    /// Builds a client whose endpoints are resolved against `base_url`.
    ///
    /// `base_url` should end with a slash, otherwise its last path segment is
    /// replaced. [`TryFrom<&str>`] normalizes this.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError::InvalidUrl`] if an endpoint URL cannot be built.
    pub fn try_new(base_url: Url) -> Result<Self, FacilitatorClientError> {
        let join = |endpoint: FacilitatorEndpoint| {
            base_url
                .join(endpoint.path())
                .map_err(|source| FacilitatorClientError::InvalidUrl { endpoint, source })
        };
        Ok(Self {
            verify_url: join(FacilitatorEndpoint::Verify)?,
            settle_url: join(FacilitatorEndpoint::Settle)?,
            base_url,
            client: Client::new(),
            headers: HeaderMap::new(),
            timeout: None,
        })
    }

    /// Headers sent with every facilitator request.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Bounds each facilitator round trip.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Base URL the endpoints were resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Per-request timeout, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Resolved URL of `endpoint`.
    #[must_use]
    pub const fn endpoint_url(&self, endpoint: FacilitatorEndpoint) -> &Url {
        match endpoint {
            FacilitatorEndpoint::Verify => &self.verify_url,
            FacilitatorEndpoint::Settle => &self.settle_url,
        }
    }

    /// Asks the facilitator whether the payment is acceptable.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] if no verify outcome was obtained.
    pub async fn verify(
        &self,
        request: &VerifyRequest,
    ) -> Result<VerifyOutcome, FacilitatorClientError> {
        self.call(FacilitatorEndpoint::Verify, request).await
    }

    /// Asks the facilitator to execute the payment.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] if no settle outcome was obtained.
    pub async fn settle(
        &self,
        request: &SettleRequest,
    ) -> Result<SettleOutcome, FacilitatorClientError> {
        self.call(FacilitatorEndpoint::Settle, request).await
    }

    async fn call<R>(
        &self,
        endpoint: FacilitatorEndpoint,
        envelope: &FacilitatorRequest,
    ) -> Result<R, FacilitatorClientError>
    where
        R: serde::de::DeserializeOwned,
    {
        let mut req = self
            .client
            .post(self.endpoint_url(endpoint).clone())
            .headers(self.headers.clone())
            .json(envelope);
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let result = match req.send().await {
            Err(source) => Err(FacilitatorClientError::Transport { endpoint, source }),
            Ok(response) if response.status() == StatusCode::OK => response
                .json::<R>()
                .await
                .map_err(|source| FacilitatorClientError::Decode { endpoint, source }),
            Ok(response) => {
                let status = response.status();
                match response.text().await {
                    Ok(mut body) => {
                        if let Some((cut, _)) = body.char_indices().nth(ERROR_BODY_LIMIT) {
                            body.truncate(cut);
                        }
                        Err(FacilitatorClientError::Status {
                            endpoint,
                            status,
                            body,
                        })
                    }
                    Err(source) => Err(FacilitatorClientError::Transport { endpoint, source }),
                }
            }
        };

        record_outcome(&result);
        result
    }
}

impl TryFrom<&str> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let base = format!("{}/", value.trim_end_matches('/'));
        let url = Url::parse(&base).map_err(|source| FacilitatorClientError::InvalidUrl {
            endpoint: FacilitatorEndpoint::Verify,
            source,
        })?;
        Self::try_new(url)
    }
}

impl TryFrom<String> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

#[cfg(feature = "telemetry")]
fn record_outcome<R>(result: &Result<R, FacilitatorClientError>) {
    let span = Span::current();
    match result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
        }
        Err(err) => {
            span.record("otel.status_code", "ERROR");
            span.record("error.message", tracing::field::display(err));
            tracing::warn!(error = %err, "facilitator call failed");
        }
    }
}

#[cfg(not(feature = "telemetry"))]
fn record_outcome<R>(_result: &Result<R, FacilitatorClientError>) {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use x402_gate_proto::{
        ExactEvmAuthorization, ExactEvmPayload, FacilitatorRequest, PaymentPayload,
        PaymentRequirements, V1,
    };

    fn create_test_request() -> FacilitatorRequest {
        FacilitatorRequest {
            x402_version: V1,
            payment_payload: PaymentPayload {
                x402_version: 1,
                scheme: "exact".into(),
                network: "base-sepolia".into(),
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
            payment_requirements: PaymentRequirements {
                scheme: "exact".into(),
                network: "base-sepolia".into(),
                max_amount_required: "10000".into(),
                resource: "http://gate.local/data".into(),
                description: "data".into(),
                mime_type: "application/json".into(),
                pay_to: "0xPayee".into(),
                max_timeout_seconds: 300,
                asset: "0xToken".into(),
                output_schema: None,
                extra: None,
            },
        }
    }

    #[tokio::test]
    async fn test_verify_posts_envelope_to_api_path() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/verify"))
            .and(body_partial_json(json!({
                "x402Version": 1,
                "paymentPayload": { "scheme": "exact" },
                "paymentRequirements": { "payTo": "0xPayee" }
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "isValid": true, "payer": "0xPayer" })),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = FacilitatorClient::try_from(mock_server.uri()).unwrap();
        let outcome = client.verify(&create_test_request()).await.unwrap();
        assert!(outcome.is_valid);
        assert_eq!(outcome.payer.as_deref(), Some("0xPayer"));
    }

    #[tokio::test]
    async fn test_verify_invalid_is_not_an_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({ "isValid": false, "invalidReason": "Invalid payment structure" }),
            ))
            .mount(&mock_server)
            .await;

        let client = FacilitatorClient::try_from(mock_server.uri()).unwrap();
        let outcome = client.verify(&create_test_request()).await.unwrap();
        assert!(!outcome.is_valid);
        assert_eq!(
            outcome.invalid_reason.as_deref(),
            Some("Invalid payment structure")
        );
    }

    #[tokio::test]
    async fn test_non_ok_status_is_transport_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/verify"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Missing payment payload"))
            .mount(&mock_server)
            .await;

        let client = FacilitatorClient::try_from(mock_server.uri()).unwrap();
        let err = client.verify(&create_test_request()).await.unwrap_err();
        match err {
            FacilitatorClientError::Status { status, body, .. } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(body, "Missing payment payload");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_undecodable_body_is_transport_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/settle"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let client = FacilitatorClient::try_from(mock_server.uri()).unwrap();
        let err = client.settle(&create_test_request()).await.unwrap_err();
        assert!(matches!(
            err,
            FacilitatorClientError::Decode { endpoint: FacilitatorEndpoint::Settle, .. }
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/verify"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "isValid": true }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let client = FacilitatorClient::try_from(mock_server.uri())
            .unwrap()
            .with_timeout(Duration::from_millis(50));
        let err = client.verify(&create_test_request()).await.unwrap_err();
        assert!(matches!(err, FacilitatorClientError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_settle_with_custom_headers_and_base_path() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/x402/api/v1/settle"))
            .and(header("x-facilitator-key", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "transaction": "0xdeadbeef",
                "network": "base-sepolia",
                "payer": "0xPayer"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-facilitator-key", "abc".parse().unwrap());
        let client = FacilitatorClient::try_from(format!("{}/x402", mock_server.uri()))
            .unwrap()
            .with_headers(headers);
        assert!(
            client
                .endpoint_url(FacilitatorEndpoint::Settle)
                .as_str()
                .ends_with("/x402/api/v1/settle")
        );

        let outcome = client.settle(&create_test_request()).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.transaction, "0xdeadbeef");
    }
}
