use std::net::{IpAddr, SocketAddr};

use axum::extract::connect_info::ConnectInfo;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};

/// The resolved client address for a request, honoring the trusted proxy
/// header order from spec.md §6: `X-Forwarded-For` (first token) →
/// `X-Real-IP` → `CF-Connecting-IP` → the transport-level remote address.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub IpAddr);

/// Resolves the client address from request headers, falling back to the
/// transport-level `ConnectInfo` extension set by
/// `into_make_service_with_connect_info`.
pub fn resolve(headers: &HeaderMap, connect_info: Option<SocketAddr>) -> Option<IpAddr> {
    if let Some(ip) = header_ip(headers, "x-forwarded-for").and_then(first_token_ip) {
        return Some(ip);
    }
    if let Some(ip) = header_ip(headers, "x-real-ip").and_then(|s| s.parse().ok()) {
        return Some(ip);
    }
    if let Some(ip) = header_ip(headers, "cf-connecting-ip").and_then(|s| s.parse().ok()) {
        return Some(ip);
    }
    connect_info.map(|addr| addr.ip())
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let connect_info = parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0);
        resolve(&parts.headers, connect_info)
            .map(ClientIp)
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "could not resolve client address"))
    }
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name)?.to_str().ok().map(|s| s.to_string())
}

fn first_token_ip(raw: String) -> Option<IpAddr> {
    raw.split(',').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn forwarded_for_takes_first_token() {
        let headers = headers_with("x-forwarded-for", "203.0.113.5, 10.0.0.1");
        assert_eq!(resolve(&headers, None), Some("203.0.113.5".parse().unwrap()));
    }

    #[test]
    fn real_ip_used_when_no_forwarded_for() {
        let headers = headers_with("x-real-ip", "198.51.100.7");
        assert_eq!(resolve(&headers, None), Some("198.51.100.7".parse().unwrap()));
    }

    #[test]
    fn falls_back_to_connect_info() {
        let headers = HeaderMap::new();
        let addr: SocketAddr = "127.0.0.1:1234".parse().unwrap();
        assert_eq!(resolve(&headers, Some(addr)), Some(addr.ip()));
    }

    #[test]
    fn no_source_resolves_to_none() {
        let headers = HeaderMap::new();
        assert_eq!(resolve(&headers, None), None);
    }
}
