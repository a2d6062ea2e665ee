//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `form_rate_limiter`: strict limits for endpoints that write orders,
//!   create payment intents or accept design requests (~10/min)
//! - `api_rate_limiter`: relaxed limits for cart and checkout edits (~100/min)

use std::net::IpAddr;
use std::sync::Arc;

use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

// =============================================================================
// Client IP Key Extractor
// =============================================================================

/// Single-address proxy headers tried after `X-Forwarded-For`.
const FALLBACK_IP_HEADERS: &[&str] = &["x-real-ip", "fly-client-ip"];

/// Key extractor that reads the client IP from CDN and proxy headers.
///
/// `X-Forwarded-For` is checked after `CF-Connecting-IP` and only its first
/// hop is used.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        client_ip(req.headers()).ok_or(GovernorError::UnableToExtractKey)
    }
}

fn header_ip(headers: &axum::http::HeaderMap, name: &str) -> Option<IpAddr> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

/// The client IP as reported by the proxy chain, if any.
#[must_use]
pub fn client_ip(headers: &axum::http::HeaderMap) -> Option<IpAddr> {
    if let Some(ip) = header_ip(headers, "cf-connecting-ip") {
        return Some(ip);
    }

    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return Some(ip);
    }

    FALLBACK_IP_HEADERS
        .iter()
        .find_map(|name| header_ip(headers, name))
}

// =============================================================================
// Rate Limiter Configuration
// =============================================================================

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create rate limiter for order, payment and form endpoints: ~10 requests
/// per minute per IP.
///
/// Configuration: 1 request every 6 seconds (replenish), burst of 5.
///
/// # Panics
///
/// This function will not panic. `per_second(6)` and `burst_size(5)` are
/// valid positive values that `GovernorConfigBuilder` always accepts.
#[must_use]
pub fn form_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(6)
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(6) and burst_size(5) is valid");
    GovernorLayer::new(Arc::new(config))
}

/// Create rate limiter for cart and checkout edits: ~100 requests per minute
/// per IP.
///
/// Configuration: 1 request per second (replenish), burst of 50.
///
/// # Panics
///
/// This function will not panic. `per_second(1)` and `burst_size(50)` are
/// valid positive values that `GovernorConfigBuilder` always accepts.
#[must_use]
pub fn api_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(1)
        .burst_size(50)
        .finish()
        .expect("rate limiter config with per_second(1) and burst_size(50) is valid");
    GovernorLayer::new(Arc::new(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue};

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn cloudflare_header_wins() {
        let map = headers(&[
            ("cf-connecting-ip", "203.0.113.7"),
            ("x-forwarded-for", "198.51.100.1"),
        ]);
        assert_eq!(client_ip(&map), Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn forwarded_for_uses_first_hop() {
        let map = headers(&[("x-forwarded-for", "198.51.100.1, 10.0.0.2")]);
        assert_eq!(client_ip(&map), Some("198.51.100.1".parse().unwrap()));
    }

    #[test]
    fn falls_back_to_fly_header() {
        let map = headers(&[("fly-client-ip", "2001:db8::1")]);
        assert_eq!(client_ip(&map), Some("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn no_headers_no_key() {
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }
}
