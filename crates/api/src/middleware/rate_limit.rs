//! Rate limiting for the login endpoint using governor and `tower_governor`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Client IP key for the login limiter.
///
/// Uses the socket peer address. Proxy headers are read first only when
/// `trust_proxy_headers` is set, since any client can send them. Requests
/// with no usable address (in-process tests) share one unspecified-address
/// bucket instead of failing.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor {
    pub trust_proxy_headers: bool,
}

const PROXY_HEADERS: [&str; 4] = ["cf-connecting-ip", "x-forwarded-for", "x-real-ip", "fly-client-ip"];

fn header_ip<T>(req: &Request<T>, name: &str) -> Option<IpAddr> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let forwarded = if self.trust_proxy_headers {
            PROXY_HEADERS.iter().find_map(|name| header_ip(req, name))
        } else {
            None
        };
        let ip = forwarded
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        Ok(ip)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create rate limiter for login: ~10 requests per minute per IP.
///
/// Configuration: 1 request every 6 seconds (replenish), burst of 5.
/// `trust_proxy_headers` comes from `TRUST_PROXY_HEADERS`.
///
/// # Panics
///
/// This function will not panic. `per_second(6)` and `burst_size(5)` are
/// both non-zero, which is all `GovernorConfigBuilder` checks.
#[must_use]
pub fn login_rate_limiter(trust_proxy_headers: bool) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor { trust_proxy_headers })
        .per_second(6)
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(6) and burst_size(5) is valid");
    GovernorLayer::new(Arc::new(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    const BEHIND_PROXY: ClientIpKeyExtractor = ClientIpKeyExtractor { trust_proxy_headers: true };
    const DIRECT: ClientIpKeyExtractor = ClientIpKeyExtractor { trust_proxy_headers: false };

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_forwarded_for_uses_first_hop() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(BEHIND_PROXY.extract(&req).unwrap(), ip("203.0.113.7"));
    }

    #[test]
    fn test_spoofed_headers_ignored_without_trusted_proxy() {
        let mut req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .header("x-real-ip", "203.0.113.8")
            .header("cf-connecting-ip", "203.0.113.9")
            .body(())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo("198.51.100.2:4000".parse::<SocketAddr>().unwrap()));
        assert_eq!(DIRECT.extract(&req).unwrap(), ip("198.51.100.2"));

        // Rotating the header does not buy a fresh bucket.
        let mut rotated = Request::builder()
            .header("x-forwarded-for", "192.0.2.200")
            .body(())
            .unwrap();
        rotated
            .extensions_mut()
            .insert(ConnectInfo("198.51.100.2:4001".parse::<SocketAddr>().unwrap()));
        assert_eq!(DIRECT.extract(&rotated).unwrap(), ip("198.51.100.2"));
    }

    #[test]
    fn test_falls_back_to_peer_then_unspecified() {
        for extractor in [BEHIND_PROXY, DIRECT] {
            let mut req = Request::builder().body(()).unwrap();
            assert_eq!(
                extractor.extract(&req).unwrap(),
                IpAddr::V4(Ipv4Addr::UNSPECIFIED)
            );

            req.extensions_mut()
                .insert(ConnectInfo("198.51.100.2:4000".parse::<SocketAddr>().unwrap()));
            assert_eq!(extractor.extract(&req).unwrap(), ip("198.51.100.2"));
        }
    }
}
