use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::time::Duration;

use axum::http::HeaderMap;
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};

const LOGIN_BURST: u32 = 10;
const LOGIN_WINDOW_SECS: u64 = 15 * 60;

/// Per-client login throttle: 10 attempts per 15 minutes.
pub struct LoginLimiter {
    inner: RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>,
}

impl LoginLimiter {
    pub fn new() -> Self {
        // GCRA quota: burst of 10, one slot replenished every window/10.
        let quota = Quota::with_period(Duration::from_secs(LOGIN_WINDOW_SECS / LOGIN_BURST as u64))
            .unwrap()
            .allow_burst(NonZeroU32::new(LOGIN_BURST).unwrap());
        Self {
            inner: RateLimiter::keyed(quota),
        }
    }

    pub fn check(&self, key: &str) -> bool {
        self.inner.check_key(&key.to_string()).is_ok()
    }
}

impl Default for LoginLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Client identity for throttling: first X-Forwarded-For hop when present
/// (we sit behind a proxy in production), else the peer address.
pub fn client_key(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| peer.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_burst_then_blocks() {
        let limiter = LoginLimiter::new();
        for _ in 0..LOGIN_BURST {
            assert!(limiter.check("1.2.3.4"));
        }
        assert!(!limiter.check("1.2.3.4"));
        // Other clients are unaffected.
        assert!(limiter.check("5.6.7.8"));
    }

    #[test]
    fn client_key_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        assert_eq!(client_key(&headers, peer), "203.0.113.9");

        let empty = HeaderMap::new();
        assert_eq!(client_key(&empty, peer), "127.0.0.1");
    }
}
