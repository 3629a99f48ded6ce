//! Rate limiting middleware
//!
//! Fixed-window request counting per client, keyed by the
//! forwarded-for header. Windows reset lazily on the next request;
//! `cleanup` reclaims idle clients and is driven by the binary's
//! maintenance loop.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::ApiError;
use crate::server::AppState;

/// Rate limiter configuration
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window
    pub max_requests: u32,
    /// Window length
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 120,
            window: Duration::from_secs(60),
        }
    }
}

struct WindowState {
    hits: u32,
    started: Instant,
}

/// In-memory fixed-window rate limiter
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: RwLock<HashMap<String, WindowState>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: RwLock::new(HashMap::new()),
        }
    }

    /// Whether the client may make another request right now
    pub async fn allow(&self, client_id: &str) -> bool {
        let mut windows = self.windows.write().await;
        let now = Instant::now();

        let window = windows.entry(client_id.to_string()).or_insert(WindowState {
            hits: 0,
            started: now,
        });

        if now.duration_since(window.started) > self.config.window {
            window.hits = 0;
            window.started = now;
        }

        if window.hits >= self.config.max_requests {
            warn!("Rate limit exceeded for client: {}", client_id);
            return false;
        }

        window.hits += 1;
        true
    }

    /// Drop windows that expired; called periodically
    pub async fn cleanup(&self) {
        let mut windows = self.windows.write().await;
        let now = Instant::now();
        windows.retain(|_, w| now.duration_since(w.started) <= self.config.window);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client_id = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    if !state.limiter.allow(&client_id).await {
        return Err(ApiError::RateLimited);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allows_within_limit() {
        let limiter = RateLimiter::with_config(RateLimitConfig {
            max_requests: 3,
            window: Duration::from_secs(60),
        });

        assert!(limiter.allow("client1").await);
        assert!(limiter.allow("client1").await);
        assert!(limiter.allow("client1").await);
        assert!(!limiter.allow("client1").await);
    }

    #[tokio::test]
    async fn test_clients_have_separate_windows() {
        let limiter = RateLimiter::with_config(RateLimitConfig {
            max_requests: 1,
            window: Duration::from_secs(60),
        });

        assert!(limiter.allow("client1").await);
        assert!(!limiter.allow("client1").await);
        assert!(limiter.allow("client2").await);
    }

    #[tokio::test]
    async fn test_window_resets_after_expiry() {
        let limiter = RateLimiter::with_config(RateLimitConfig {
            max_requests: 1,
            window: Duration::from_millis(10),
        });

        assert!(limiter.allow("client1").await);
        assert!(!limiter.allow("client1").await);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(limiter.allow("client1").await);
    }

    #[tokio::test]
    async fn test_cleanup_reclaims_idle_clients() {
        let limiter = RateLimiter::with_config(RateLimitConfig {
            max_requests: 1,
            window: Duration::from_millis(10),
        });

        limiter.allow("client1").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        limiter.cleanup().await;

        assert!(limiter.windows.read().await.is_empty());
    }
}
