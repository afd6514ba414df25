//! Credential handoff on the outbound request.

use http::HeaderMap;
use http::header::ACCEPT_ENCODING;

use crate::config::GateSettings;

/// Rewrites the headers of a verified request before it reaches the backend.
///
/// The payment header is removed, the backend credential is set on the
/// configured auth header (replacing anything the caller sent under that
/// name), and `Accept-Encoding` is dropped so the backend answers uncompressed.
pub fn hand_off(headers: &mut HeaderMap, settings: &GateSettings) {
    headers.remove(&settings.payment_header);
    headers.insert(
        settings.auth_header.clone(),
        settings.backend_credential.clone(),
    );
    headers.remove(ACCEPT_ENCODING);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;
    use http::HeaderValue;

    #[test]
    fn test_hand_off_swaps_payment_for_credential() {
        let settings = sample_config("https://facilitator.example").validate().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-payment", HeaderValue::from_static("eyJ4NDAyVmVyc2lvbiI6MX0="));
        headers.insert("x-api-key", HeaderValue::from_static("caller-supplied"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, br"));
        headers.insert("x-request-id", HeaderValue::from_static("abc"));

        hand_off(&mut headers, &settings);

        assert!(headers.get("x-payment").is_none());
        assert!(headers.get(ACCEPT_ENCODING).is_none());
        assert_eq!(headers.get_all("x-api-key").iter().count(), 1);
        assert_eq!(headers["x-api-key"], "backend-secret");
        assert!(headers["x-api-key"].is_sensitive());
        assert_eq!(headers["x-request-id"], "abc");
    }
}
