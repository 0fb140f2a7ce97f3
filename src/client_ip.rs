//! Client identity used as the guard's per-client key.

use axum::extract::{ConnectInfo, Request};
use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

/// Shared key for requests whose source address cannot be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Resolve the key for `request`.
///
/// Forwarded headers are consulted only when `trust_forwarded_headers` is
/// set, then the peer address, then [`UNKNOWN_CLIENT`].
pub fn client_key(request: &Request, trust_forwarded_headers: bool) -> String {
    if trust_forwarded_headers {
        if let Some(client) = forwarded_client(request.headers()) {
            return client;
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_canonical().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn forwarded_client(headers: &HeaderMap) -> Option<String> {
    let from_forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(normalize);

    from_forwarded_for.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .and_then(normalize)
    })
}

/// Trim and canonicalize a raw address. Empty input yields `None`;
/// non-address text is kept verbatim.
pub fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    match trimmed.parse::<IpAddr>() {
        Ok(ip) => Some(ip.to_canonical().to_string()),
        Err(_) => Some(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::HeaderValue;

    fn request_from(addr: &str) -> Request {
        let mut request = Request::new(Body::empty());
        request
            .extensions_mut()
            .insert(ConnectInfo(addr.parse::<SocketAddr>().unwrap()));
        request
    }

    #[test]
    fn test_peer_address() {
        let request = request_from("192.168.1.1:53000");
        assert_eq!(client_key(&request, false), "192.168.1.1");
    }

    #[test]
    fn test_ipv4_mapped_peer_is_canonicalized() {
        let request = request_from("[::ffff:10.0.0.7]:443");
        assert_eq!(client_key(&request, false), "10.0.0.7");
    }

    #[test]
    fn test_forwarded_for_ignored_unless_trusted() {
        let mut request = request_from("10.0.0.1:8000");
        request
            .headers_mut()
            .insert("x-forwarded-for", HeaderValue::from_static("203.0.113.5, 10.0.0.1"));

        assert_eq!(client_key(&request, false), "10.0.0.1");
        assert_eq!(client_key(&request, true), "203.0.113.5");
    }

    #[test]
    fn test_real_ip_header_when_trusted() {
        let mut request = request_from("10.0.0.1:8000");
        request
            .headers_mut()
            .insert("x-real-ip", HeaderValue::from_static(" 203.0.113.9 "));

        assert_eq!(client_key(&request, true), "203.0.113.9");
    }

    #[test]
    fn test_blank_forwarded_for_falls_through() {
        let mut request = request_from("10.0.0.1:8000");
        request
            .headers_mut()
            .insert("x-forwarded-for", HeaderValue::from_static(" , 203.0.113.5"));

        assert_eq!(client_key(&request, true), "10.0.0.1");
    }

    #[test]
    fn test_unknown_fallback() {
        let request = Request::new(Body::empty());
        assert_eq!(client_key(&request, true), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  "), None);
        assert_eq!(normalize("2001:0db8:0000::0001").as_deref(), Some("2001:db8::1"));
        assert_eq!(normalize("proxy-host").as_deref(), Some("proxy-host"));
    }
}
