//! Rate limiting middleware.
//!
//! In-memory fixed-window limit per client IP, applied to the login routes.

use crate::api::ApiError;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Configuration for rate limiting.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Window duration.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

/// Rate limiter state tracking requests per IP.
#[derive(Clone)]
pub struct RateLimitLayer {
    config: RateLimitConfig,
    state: Arc<Mutex<HashMap<IpAddr, RateLimitEntry>>>,
}

struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

#[derive(Debug, PartialEq, Eq)]
enum RateLimitResult {
    Allowed { remaining: u32 },
    Exceeded { retry_after: Duration },
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn check(&self, ip: IpAddr) -> RateLimitResult {
        let mut state = self.state.lock();
        let now = Instant::now();

        let entry = state.entry(ip).or_insert(RateLimitEntry {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.config.window {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count += 1;

        if entry.count > self.config.max_requests {
            let reset_at = entry.window_start + self.config.window;
            RateLimitResult::Exceeded {
                retry_after: reset_at.saturating_duration_since(now),
            }
        } else {
            RateLimitResult::Allowed {
                remaining: self.config.max_requests - entry.count,
            }
        }
    }

    /// Drop entries whose window has long passed (call from a background task).
    pub fn cleanup(&self) {
        let mut state = self.state.lock();
        let now = Instant::now();
        let window = self.config.window;

        state.retain(|_, entry| now.duration_since(entry.window_start) < window * 2);
    }

    pub fn window(&self) -> Duration {
        self.config.window
    }
}

/// Reject logins past the per-IP limit with a JSON 429.
///
/// Requests without connection info (in-process test clients) share the
/// unspecified address.
pub async fn login_rate_limit(
    State(limiter): State<RateLimitLayer>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    match limiter.check(ip) {
        RateLimitResult::Allowed { .. } => next.run(request).await,
        RateLimitResult::Exceeded { retry_after } => {
            warn!(
                ip = %ip,
                path = %request.uri().path(),
                retry_after_secs = retry_after.as_secs(),
                "Login rate limit exceeded"
            );
            ApiError::TooManyRequests {
                retry_after_secs: retry_after.as_secs().max(1),
            }
            .into_response()
        }
    }
}
