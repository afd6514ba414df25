//! In-memory facilitator for local development and integration tests.
//!
//! Accepts any structurally valid version 1 `exact` payment without checking
//! signatures or touching a chain. Settlement is refused for an authorization
//! that was already settled.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use dashmap::DashSet;
use serde_json::{Value, json};
use x402_gate::proto::Base64Bytes;

/// Shared application state for the mock facilitator.
pub type MockState = Arc<MockFacilitator>;

/// Identity of a transfer authorization for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AuthorizationKey {
    from: Option<String>,
    to: Option<String>,
    value: Option<String>,
    nonce: Option<String>,
}

impl AuthorizationKey {
    fn of(payload: &Value) -> Self {
        let authorization = &payload["payload"]["authorization"];
        let field = |name: &str| authorization[name].as_str().map(str::to_owned);
        Self {
            from: field("from"),
            to: field("to"),
            value: field("value"),
            nonce: field("nonce"),
        }
    }
}

/// Mock facilitator state.
#[derive(Debug, Default)]
pub struct MockFacilitator {
    settled: DashSet<AuthorizationKey>,
    counter: AtomicU64,
}

impl MockFacilitator {
    /// Number of distinct authorizations settled so far.
    #[must_use]
    pub fn settled_count(&self) -> usize {
        self.settled.len()
    }

    fn transaction_hash(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis());
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("0x{millis:x}{seq:08x}")
    }
}

fn is_acceptable(payload: &Value) -> bool {
    payload["x402Version"] == 1 && payload["scheme"] == "exact" && !payload["payload"].is_null()
}

fn payer(payload: &Value) -> Value {
    payload["payload"]["authorization"]["from"].clone()
}

fn missing_payload() -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "x402Version": 1, "error": "Missing payment payload" })),
    )
}

/// `POST /api/v1/verify` - Accepts any well-formed version 1 `exact` payload.
///
/// A base64 `X-PAYMENT` header, when present, takes precedence over the body's payload.
pub async fn verify(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let from_header = match headers.get("x-payment") {
        Some(raw) => {
            let decoded = Base64Bytes::from(raw.as_bytes())
                .decode()
                .ok()
                .and_then(|json| serde_json::from_slice::<Value>(&json).ok());
            let Some(payload) = decoded else {
                tracing::warn!("undecodable X-PAYMENT header");
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "x402Version": 1,
                        "error": "Invalid X-Payment header encoding"
                    })),
                );
            };
            Some(payload)
        }
        None => None,
    };
    let Some(payload) = from_header.or_else(|| body.get("paymentPayload").cloned()) else {
        return missing_payload();
    };

    if is_acceptable(&payload) {
        tracing::info!(payer = %payer(&payload), "payment verified");
        (
            StatusCode::OK,
            Json(json!({ "isValid": true, "payer": payer(&payload) })),
        )
    } else {
        tracing::info!("invalid payment structure");
        (
            StatusCode::OK,
            Json(json!({ "isValid": false, "invalidReason": "Invalid payment structure" })),
        )
    }
}

/// `POST /api/v1/settle` - Settles each authorization at most once.
pub async fn settle(
    State(state): State<MockState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let Some(payload) = body.get("paymentPayload").filter(|p| !p.is_null()) else {
        return missing_payload();
    };
    let network = payload["network"].as_str().unwrap_or_default();
    let key = AuthorizationKey::of(payload);
    let failed = |reason: &str| {
        (
            StatusCode::OK,
            Json(json!({
                "success": false,
                "errorReason": reason,
                "transaction": "",
                "network": network
            })),
        )
    };

    if !is_acceptable(payload) {
        if state.settled.contains(&key) {
            return failed("Payment already settled");
        }
        return failed("Invalid payment structure");
    }
    if !state.settled.insert(key) {
        tracing::info!("payment already settled");
        return failed("Payment already settled");
    }

    let transaction = state.transaction_hash();
    tracing::info!(%transaction, "payment settled");
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "transaction": transaction,
            "network": if network.is_empty() { "base-sepolia" } else { network },
            "payer": payer(payload)
        })),
    )
}

/// `GET /api/v1/info` - Describes the mock facilitator.
pub async fn info() -> Json<Value> {
    Json(json!({
        "name": "Mock x402 Facilitator",
        "version": env!("CARGO_PKG_VERSION"),
        "supportedNetworks": ["base-sepolia", "filecoin-calibration"],
        "supportedSchemes": ["exact"]
    }))
}

/// `GET /health` - Health check.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Builds the mock facilitator router.
pub fn mock_router(state: MockState) -> Router {
    Router::new()
        .route("/api/v1/verify", post(verify))
        .route("/api/v1/settle", post(settle))
        .route("/api/v1/info", get(info))
        .route("/health", get(health))
        .with_state(state)
}
