//! Error types for the gate server.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that stop the server from starting or running.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The configuration file could not be read.
    #[error("failed to read config file {}: {source}", path.display())]
    ReadConfig {
        /// Path that was read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or misses required keys.
    #[error("failed to parse config file: {0}")]
    ParseConfig(#[from] toml::de::Error),

    /// The payment gate rejected its configuration.
    #[error("payment gate configuration: {0}")]
    Gate(#[from] x402_gate::ConfigError),

    /// The backend HTTP client could not be built.
    #[error("failed to build backend client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Socket or signal setup failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while relaying a request to the backend.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The inbound request body exceeded the configured limit or failed mid-stream.
    #[error("request body rejected: {0}")]
    RequestBody(axum::Error),

    /// The backend could not be reached or its response could not be read.
    #[error("backend request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::RequestBody(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        (status, self.to_string()).into_response()
    }
}
