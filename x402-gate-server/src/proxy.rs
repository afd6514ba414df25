//! Reverse proxy to the protected backend.
//!
//! The gate wraps this handler: by the time a request arrives here it has been
//! paid for and carries the backend credential instead of the payment header.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::Response;
use http::HeaderMap;
use http::header::HOST;
use reqwest::Client;
use url::Url;

use crate::error::{ProxyError, ServerError};

/// Headers never relayed between hops.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

/// Forwards requests to a fixed backend.
#[derive(Debug, Clone)]
pub struct Proxy {
    client: Client,
    backend_url: Url,
    max_body_bytes: usize,
}

/// Shared proxy state.
pub type ProxyState = Arc<Proxy>;

impl Proxy {
    /// Builds a proxy to `backend_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::HttpClient`] if the HTTP client cannot be built.
    pub fn try_new(
        backend_url: Url,
        timeout: Duration,
        max_body_bytes: usize,
    ) -> Result<Self, ServerError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            backend_url,
            max_body_bytes,
        })
    }

    /// Resolves the backend URL for an inbound path and query.
    #[must_use]
    pub fn target_url(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.backend_url.clone();
        let joined = format!("{}{}", self.backend_url.path().trim_end_matches('/'), path);
        url.set_path(&joined);
        url.set_query(query);
        url
    }

    /// Relays one request and its response.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError`] if the body is too large or the backend fails.
    pub async fn forward(&self, req: Request) -> Result<Response, ProxyError> {
        let (parts, body) = req.into_parts();
        let body = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(ProxyError::RequestBody)?;
        let url = self.target_url(parts.uri.path(), parts.uri.query());

        let mut headers = without_hop_by_hop(parts.headers);
        headers.remove(HOST);

        tracing::debug!(method = %parts.method, %url, "forwarding to backend");
        let upstream = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = upstream.status();
        let headers = without_hop_by_hop(upstream.headers().clone());
        let body = upstream.bytes().await?;

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

fn without_hop_by_hop(mut headers: HeaderMap) -> HeaderMap {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
    headers
}

/// Fallback handler relaying everything to the backend.
pub async fn forward(
    State(proxy): State<ProxyState>,
    req: Request,
) -> Result<Response, ProxyError> {
    proxy.forward(req).await.inspect_err(|err| {
        tracing::error!(error = %err, "backend request failed");
    })
}

/// Router that sends every request to the backend.
pub fn proxy_router(proxy: ProxyState) -> Router {
    Router::new().fallback(forward).with_state(proxy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use http::header::CONNECTION;
    use tower::ServiceExt;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, Request as MockRequest, ResponseTemplate};

    fn proxy(uri: &str) -> Proxy {
        Proxy::try_new(Url::parse(uri).unwrap(), Duration::from_secs(5), 1024).unwrap()
    }

    #[test]
    fn test_target_url_keeps_backend_prefix() {
        let proxy = proxy("https://api.example.com/v2/");
        assert_eq!(
            proxy.target_url("/weather", Some("lat=1")).as_str(),
            "https://api.example.com/v2/weather?lat=1"
        );
        assert_eq!(
            proxy.target_url("/", None).as_str(),
            "https://api.example.com/v2/"
        );
    }

    #[tokio::test]
    async fn test_forwards_request_and_relays_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/forecast"))
            .and(query_param("days", "3"))
            .and(header("x-api-key", "backend-secret"))
            .and(body_string("{\"city\":\"Athens\"}"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("x-upstream", "yes")
                    .set_body_string("created"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let router = proxy_router(Arc::new(proxy(&server.uri())));
        let req = Request::builder()
            .method("POST")
            .uri("/v1/forecast?days=3")
            .header(HOST, "gate.example")
            .header(CONNECTION, "upgrade")
            .header("x-api-key", "backend-secret")
            .body(Body::from("{\"city\":\"Athens\"}"))
            .unwrap();
        let response = router.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-upstream"], "yes");
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"created");

        let received: Vec<MockRequest> = server.received_requests().await.unwrap();
        let host = received[0].headers.get(HOST).unwrap().to_str().unwrap();
        assert_ne!(host, "gate.example");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_bad_gateway() {
        let router = proxy_router(Arc::new(proxy("http://127.0.0.1:9")));
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_oversized_request_body_is_rejected() {
        let router = proxy_router(Arc::new(proxy("http://127.0.0.1:9")));
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(vec![b'x'; 4096]))
            .unwrap();
        let response = router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
