//! Core payment gate logic for enforcing x402 payments.
//!
//! The [`Paygate`] struct handles the full lifecycle of one request:
//! challenge, decode, verification, credential handoff, forwarding, and
//! settlement after a successful backend response.
//!
//! Verification always precedes forwarding and settlement always follows it.
//! A request whose payment is missing, malformed, rejected, or unverifiable
//! never reaches the backend.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use http::header::{CONTENT_TYPE, HOST};
use http::uri::PathAndQuery;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde_json::json;
use tower::{Service, ServiceExt};
use x402_gate_proto::{
    FacilitatorRequest, PaymentRequired, V1, decode_payment_header, encode_payment_required,
};

#[cfg(feature = "telemetry")]
use tracing::{Instrument, instrument};

use crate::capture::CapturedResponse;
use crate::config::GateSettings;
use crate::constants::DEBUG_BYPASS_SIGNATURE;
use crate::error::{PaygateError, SettlementError};
use crate::facilitator::Facilitator;
use crate::handoff::hand_off;
use crate::hooks::PaygateHooks;

/// Request extension marking a connection that arrived over TLS.
///
/// Hosts that terminate TLS themselves insert this so resource URLs are
/// reported with the `https` scheme when the request URI is origin-form.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecureConnection;

/// Reconstructs the full URL of the requested resource.
///
/// The scheme comes from an absolute request URI, else from a
/// [`SecureConnection`] extension, else `http`. The host comes from the `Host`
/// header, else the URI authority, else `localhost`.
#[must_use]
pub fn resource_url(req: &Request) -> String {
    let uri = req.uri();
    let scheme = uri.scheme_str().unwrap_or_else(|| {
        if req.extensions().get::<SecureConnection>().is_some() {
            "https"
        } else {
            "http"
        }
    });
    let host = req
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .filter(|h| !h.is_empty())
        .or_else(|| uri.authority().map(http::uri::Authority::as_str))
        .unwrap_or("localhost");
    let path_and_query = uri.path_and_query().map_or("/", PathAndQuery::as_str);
    format!("{scheme}://{host}{path_and_query}")
}

/// Payment gate for one protected backend.
///
/// Holds only immutable configuration and shared collaborators; there is no
/// state carried between requests.
#[allow(missing_debug_implementations)]
pub struct Paygate<F> {
    /// The facilitator for verifying and settling payments
    pub facilitator: F,
    /// Validated gate settings
    pub settings: Arc<GateSettings>,
    /// Lifecycle observers
    pub hooks: Arc<dyn PaygateHooks>,
}

impl<F> Paygate<F> {
    /// Calls the inner service with proper telemetry instrumentation.
    async fn call_inner<S>(inner: S, req: Request) -> Response
    where
        S: Service<Request, Response = Response, Error = Infallible>,
        S::Future: Send,
    {
        let fut = inner.oneshot(req);
        #[cfg(feature = "telemetry")]
        let fut = fut.instrument(tracing::info_span!("inner"));
        match fut.await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

impl<F> Paygate<F>
where
    F: Facilitator + Clone + 'static,
{
    /// Handles an incoming request, enforcing payment.
    ///
    /// Every refusal is turned into its response here, so this never fails.
    ///
    /// # Errors
    ///
    /// This method is infallible (`Infallible` error type).
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.handle_request", skip_all, fields(path = %req.uri().path()))
    )]
    pub async fn handle_request<S>(&self, inner: S, req: Request) -> Result<Response, Infallible>
    where
        S: Service<Request, Response = Response, Error = Infallible>,
        S::Future: Send,
    {
        match self.handle_request_fallible(inner, req).await {
            Ok(response) => Ok(response),
            Err(err) => {
                #[cfg(feature = "telemetry")]
                match &err {
                    PaygateError::PaymentRequired(_) => tracing::info!("no payment presented"),
                    PaygateError::VerificationTransport(_) | PaygateError::BackendCapture(_) => {
                        tracing::error!(error = %err, "request failed");
                    }
                    _ => tracing::warn!(error = %err, "payment refused"),
                }
                Ok(error_into_response(err))
            }
        }
    }

    /// Handles an incoming request, returning refusals as [`PaygateError`].
    ///
    /// # Errors
    ///
    /// Returns [`PaygateError`] if the request must not be forwarded, or if the
    /// backend response could not be captured.
    pub async fn handle_request_fallible<S>(
        &self,
        inner: S,
        mut req: Request,
    ) -> Result<Response, PaygateError>
    where
        S: Service<Request, Response = Response, Error = Infallible>,
        S::Future: Send,
    {
        let requirements = self.settings.requirements_for(resource_url(&req));

        let Some(header) = extract_payment_header(req.headers(), &self.settings.payment_header)
        else {
            return Err(PaygateError::PaymentRequired(Box::new(
                PaymentRequired::single(requirements),
            )));
        };
        let payment_payload = decode_payment_header(header)?;

        let request = FacilitatorRequest {
            x402_version: V1,
            payment_payload,
            payment_requirements: requirements,
        };

        if self.settings.debug_bypass
            && request.payment_payload.signature() == DEBUG_BYPASS_SIGNATURE
        {
            #[cfg(feature = "telemetry")]
            tracing::warn!("debug bypass signature presented, skipping verification");
        } else {
            self.verify(&request).await?;
        }

        hand_off(req.headers_mut(), &self.settings);
        let response = Self::call_inner(inner, req).await;
        let captured =
            CapturedResponse::capture(response, self.settings.max_captured_body_bytes)
                .await
                .map_err(|e| PaygateError::BackendCapture(e.to_string()))?;

        #[cfg(feature = "telemetry")]
        {
            tracing::info!(status = captured.status().as_u16(), "backend responded");
            tracing::debug!(body = %captured.preview(), "backend response body");
        }

        if captured.status().is_success() {
            self.settle_detached(request).await;
        } else {
            #[cfg(feature = "telemetry")]
            tracing::info!(
                status = captured.status().as_u16(),
                "backend did not succeed, skipping settlement"
            );
        }

        Ok(captured.into_response())
    }

    async fn verify(&self, request: &FacilitatorRequest) -> Result<(), PaygateError> {
        let outcome = self
            .facilitator
            .verify(request)
            .await
            .map_err(|e| PaygateError::VerificationTransport(e.to_string()))?;
        self.hooks.after_verify(request, &outcome).await;

        if outcome.is_valid {
            #[cfg(feature = "telemetry")]
            tracing::debug!(payer = ?outcome.payer, "payment verified");
            Ok(())
        } else {
            Err(PaygateError::Rejected {
                reason: outcome.invalid_reason,
            })
        }
    }

    /// Settles on a spawned task and waits for it, so that dropping the
    /// request future (client disconnect) does not abort settlement.
    async fn settle_detached(&self, request: FacilitatorRequest) {
        let facilitator = self.facilitator.clone();
        let hooks = Arc::clone(&self.hooks);
        let task = async move { settle_payment(&facilitator, hooks.as_ref(), &request).await };
        #[cfg(feature = "telemetry")]
        let task = task.in_current_span();

        let joined = tokio::spawn(task).await;
        #[cfg(feature = "telemetry")]
        if let Err(err) = joined {
            tracing::error!(error = %err, "settlement task did not complete");
        }
        #[cfg(not(feature = "telemetry"))]
        drop(joined);
    }
}

async fn settle_payment<F: Facilitator>(
    facilitator: &F,
    hooks: &dyn PaygateHooks,
    request: &FacilitatorRequest,
) {
    let result = match facilitator.settle(request).await {
        Ok(outcome) if outcome.success => Ok(outcome),
        Ok(outcome) => Err(SettlementError::Failed {
            reason: outcome.error_reason,
            network: outcome.network,
            payer: outcome.payer,
        }),
        Err(err) => Err(SettlementError::Transport(err.to_string())),
    };

    match result {
        Ok(outcome) => {
            #[cfg(feature = "telemetry")]
            tracing::info!(
                transaction = %outcome.transaction,
                network = %outcome.network,
                "payment settled"
            );
            hooks.after_settle(request, &outcome).await;
        }
        Err(err) => {
            #[cfg(feature = "telemetry")]
            tracing::error!(error = %err, "failed to settle payment");
            hooks.on_settle_failure(request, &err).await;
        }
    }
}

/// Extracts a non-blank payment header value from the header map.
fn extract_payment_header<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a [u8]> {
    headers
        .get(name)
        .map(HeaderValue::as_bytes)
        .filter(|value| !value.trim_ascii().is_empty())
}

/// Converts a [`PaygateError`] into its HTTP response.
#[must_use]
pub fn error_into_response(err: PaygateError) -> Response {
    match err {
        PaygateError::PaymentRequired(body) => match encode_payment_required(&body) {
            Ok(bytes) => (
                StatusCode::PAYMENT_REQUIRED,
                [(CONTENT_TYPE, "application/json")],
                bytes,
            )
                .into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode payment requirements: {err}"),
            )
                .into_response(),
        },
        err @ PaygateError::InvalidPaymentHeader(_) => {
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
        PaygateError::Rejected { .. } => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid Payment" })),
        )
            .into_response(),
        PaygateError::VerificationTransport(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error during payment verification",
        )
            .into_response(),
        PaygateError::BackendCapture(_) => (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response(),
    }
}
