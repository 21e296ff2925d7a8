//! Per-client rate limiting middleware.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::ApiError;

/// Remaining allowance of one client.
#[derive(Debug, Clone, Copy)]
struct Allowance {
    tokens: f64,
    refreshed: Instant,
}

struct Buckets {
    clients: HashMap<IpAddr, Allowance>,
    last_sweep: Instant,
}

/// Allows `max` requests per client per `window`, refilled continuously.
///
/// A client idle for a whole window is back at full allowance, so its entry
/// is indistinguishable from a fresh one and gets swept.
pub struct RateLimiter {
    buckets: Mutex<Buckets>,
    capacity: f64,
    refill_per_sec: f64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        let capacity = f64::from(max.max(1));
        Self {
            buckets: Mutex::new(Buckets {
                clients: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            capacity,
            refill_per_sec: capacity / window.as_secs_f64().max(f64::EPSILON),
            window,
        }
    }

    /// Consume one request for `client`. `false` means it is over its limit.
    pub fn check(&self, client: IpAddr) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        if now.duration_since(buckets.last_sweep) >= self.window {
            self.sweep(&mut buckets, now);
        }

        let allowance = buckets.clients.entry(client).or_insert(Allowance {
            tokens: self.capacity,
            refreshed: now,
        });
        let refill = now.duration_since(allowance.refreshed).as_secs_f64() * self.refill_per_sec;
        allowance.tokens = (allowance.tokens + refill).min(self.capacity);
        allowance.refreshed = now;

        if allowance.tokens < 1.0 {
            return false;
        }
        allowance.tokens -= 1.0;
        true
    }

    /// Number of clients currently tracked.
    pub fn tracked(&self) -> usize {
        self.buckets.lock().expect("rate limiter mutex poisoned").clients.len()
    }

    fn sweep(&self, buckets: &mut Buckets, now: Instant) {
        let before = buckets.clients.len();
        buckets
            .clients
            .retain(|_, allowance| now.duration_since(allowance.refreshed) < self.window);
        buckets.last_sweep = now;
        tracing::trace!(swept = before - buckets.clients.len(), "Idle rate limit entries removed");
    }
}

/// Rejects requests over the limit with 429. Clients are keyed by peer IP;
/// requests without connection info share one allowance.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if limiter.check(client) {
        next.run(request).await
    } else {
        tracing::warn!(client = %client, "Rate limit exceeded");
        ApiError::new(StatusCode::TOO_MANY_REQUESTS, "Too Many Requests").into_response()
    }
}
