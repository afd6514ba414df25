//! Buffering of the downstream response.
//!
//! The gate must see the backend's status before deciding whether to settle,
//! and logs a preview of the body. [`CapturedResponse`] holds the whole
//! response in memory, bounded by a size limit, and rebuilds it unchanged.

use axum::body::{Body, Bytes};
use axum::response::Response;
use http::StatusCode;
use http::response::Parts;

use crate::constants::LOGGED_BODY_PREVIEW_CHARS;

/// A downstream response whose body has been read into memory.
#[derive(Debug)]
pub struct CapturedResponse {
    parts: Parts,
    body: Bytes,
}

impl CapturedResponse {
    /// Reads the response body, failing if it exceeds `limit` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`axum::Error`] if the body stream fails or is larger than `limit`.
    pub async fn capture(response: Response, limit: usize) -> Result<Self, axum::Error> {
        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(body, limit).await?;
        Ok(Self { parts, body })
    }

    /// Status returned by the backend.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.parts.status
    }

    /// Captured body bytes.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Up to the first 1000 characters of the body, lossily decoded as UTF-8.
    #[must_use]
    pub fn preview(&self) -> String {
        String::from_utf8_lossy(&self.body)
            .chars()
            .take(LOGGED_BODY_PREVIEW_CHARS)
            .collect()
    }

    /// Rebuilds the response with its original status, headers and body.
    #[must_use]
    pub fn into_response(self) -> Response {
        Response::from_parts(self.parts, Body::from(self.body))
    }
}
