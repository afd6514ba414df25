//! Tower middleware for enforcing [x402](https://www.x402.org) payments in front of a backend.
//!
//! [`X402Gate`] validates configuration once and then acts as a
//! [`tower::Layer`]: wrapping any `Service<Request>` yields an
//! [`X402GateService`] that challenges unpaid requests, verifies payments with
//! the facilitator, swaps the payment header for the backend credential, and
//! settles after a successful response.
//!
//! ## Construction
//!
//! - **[`X402Gate::from_config`]** validates a [`GateConfig`] and talks to the
//!   configured facilitator over HTTP.
//! - **[`X402Gate::from_extra`]** does the same starting from the host's
//!   extra-config map.
//! - **[`X402Gate::with_facilitator`]** accepts any [`Facilitator`].
//! - **[`register_handler`]** is the one-call "configuration plus next handler"
//!   factory for hosts.
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use x402_gate::{GateConfig, X402Gate};
//!
//! # fn build(config: GateConfig) -> Result<Router, x402_gate::ConfigError> {
//! let gate = X402Gate::from_config(config)?;
//! let app: Router = Router::new()
//!     .route("/weather", get(|| async { "sunny" }))
//!     .layer(gate);
//! # Ok(app)
//! # }
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::response::Response;
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service};

use crate::config::{ConfigError, GateConfig, GateSettings};
use crate::facilitator::Facilitator;
use crate::facilitator_client::FacilitatorClient;
use crate::hooks::{NoopHooks, PaygateHooks};
use crate::paygate::Paygate;

/// The payment gate middleware.
///
/// Create one per protected backend. Settings are immutable once built.
pub struct X402Gate<F> {
    facilitator: F,
    settings: Arc<GateSettings>,
    hooks: Arc<dyn PaygateHooks>,
}

impl<F: Clone> Clone for X402Gate<F> {
    fn clone(&self) -> Self {
        Self {
            facilitator: self.facilitator.clone(),
            settings: Arc::clone(&self.settings),
            hooks: Arc::clone(&self.hooks),
        }
    }
}

impl<F: std::fmt::Debug> std::fmt::Debug for X402Gate<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402Gate")
            .field("facilitator", &self.facilitator)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl X402Gate<Arc<FacilitatorClient>> {
    /// Validates `config` and builds a gate backed by an HTTP facilitator client.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is incomplete or invalid.
    pub fn from_config(config: GateConfig) -> Result<Self, ConfigError> {
        let settings = config.validate()?;
        let facilitator = FacilitatorClient::try_new(settings.facilitator_url.clone())?
            .with_timeout(settings.facilitator_timeout);

        #[cfg(feature = "telemetry")]
        tracing::info!(
            facilitator = %settings.facilitator_url,
            payment_header = %settings.payment_header,
            auth_header = %settings.auth_header,
            debug_bypass = settings.debug_bypass,
            "payment gate configured"
        );
        #[cfg(feature = "telemetry")]
        if settings.debug_bypass {
            tracing::warn!("debug bypass signature is enabled; do not use in production");
        }

        Ok(Self::with_facilitator(settings, Arc::new(facilitator)))
    }

    /// Reads the gate's namespace from a host extra-config map and builds the gate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the namespace is missing or the configuration is invalid.
    pub fn from_extra(
        extra: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, ConfigError> {
        Self::from_config(GateConfig::from_extra(extra)?)
    }
}

impl<F> X402Gate<F> {
    /// Builds a gate from validated settings and any facilitator.
    #[must_use]
    pub fn with_facilitator(settings: GateSettings, facilitator: F) -> Self {
        Self {
            facilitator,
            settings: Arc::new(settings),
            hooks: Arc::new(NoopHooks),
        }
    }

    /// Installs lifecycle hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn PaygateHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Returns a reference to the underlying facilitator.
    pub const fn facilitator(&self) -> &F {
        &self.facilitator
    }

    /// Returns the validated settings.
    #[must_use]
    pub fn settings(&self) -> &GateSettings {
        &self.settings
    }
}

impl<S, F> Layer<S> for X402Gate<F>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    F: Facilitator + Clone + 'static,
{
    type Service = X402GateService<F>;

    fn layer(&self, inner: S) -> Self::Service {
        X402GateService {
            paygate: Arc::new(Paygate {
                facilitator: self.facilitator.clone(),
                settings: Arc::clone(&self.settings),
                hooks: Arc::clone(&self.hooks),
            }),
            inner: BoxCloneSyncService::new(inner),
        }
    }
}

/// Service that enforces x402 payments on incoming requests.
#[allow(missing_debug_implementations)] // BoxCloneSyncService does not implement Debug
pub struct X402GateService<F> {
    paygate: Arc<Paygate<F>>,
    /// The wrapped downstream handler
    inner: BoxCloneSyncService<Request, Response, Infallible>,
}

impl<F> Clone for X402GateService<F> {
    fn clone(&self) -> Self {
        Self {
            paygate: Arc::clone(&self.paygate),
            inner: self.inner.clone(),
        }
    }
}

impl<F> Service<Request> for X402GateService<F>
where
    F: Facilitator + Clone + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    /// Delegates readiness polling to the wrapped inner service.
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let paygate = Arc::clone(&self.paygate);
        let inner = self.inner.clone();
        Box::pin(async move { paygate.handle_request(inner, req).await })
    }
}

/// Builds a payment-gated handler from the host's extra-config map and the next handler.
///
/// # Errors
///
/// Returns [`ConfigError`] if the gate's configuration is missing or invalid;
/// the host should refuse to start.
pub fn register_handler<S>(
    extra: &serde_json::Map<String, serde_json::Value>,
    next: S,
) -> Result<X402GateService<Arc<FacilitatorClient>>, ConfigError>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    Ok(X402Gate::from_extra(extra)?.layer(next))
}
