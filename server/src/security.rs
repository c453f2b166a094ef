use axum::{
    body::Body,
    extract::State,
    http::{
        Request, Response, StatusCode,
        header::{HeaderName, HeaderValue},
    },
    middleware::Next,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Policy for API responses. Nothing served here is ever rendered as a page.
const API_CSP: [&str; 4] = [
    "default-src 'none'",
    "frame-ancestors 'none'",
    "base-uri 'none'",
    "form-action 'none'",
];

/// Security headers middleware
/// Adds security headers to all responses
pub async fn security_headers(
    req: Request<Body>,
    next: Next,
) -> Result<Response<Body>, StatusCode> {
    let mut response = next.run(req).await;

    let headers = response.headers_mut();

    // X-Frame-Options: Prevent clickjacking
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );

    // X-Content-Type-Options: Prevent MIME type sniffing
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );

    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("no-referrer"),
    );

    // Strict-Transport-Security (HSTS): Force HTTPS for 1 year
    headers.insert(
        HeaderName::from_static("strict-transport-security"),
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );

    headers.insert(
        HeaderName::from_static("content-security-policy"),
        HeaderValue::from_str(&API_CSP.join("; "))
            .unwrap_or_else(|_| HeaderValue::from_static("default-src 'none'")),
    );

    // Permissions-Policy: Disable unnecessary browser features
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(
            "geolocation=(), microphone=(), camera=(), payment=(), usb=(), magnetometer=()",
        ),
    );

    Ok(response)
}

/// Per-client request history plus the time of the last full sweep.
struct Clients {
    history: HashMap<String, Vec<Instant>>,
    last_sweep: Instant,
}

/// Rate limiting state
#[derive(Clone)]
pub struct RateLimiter {
    /// Map of client addresses to their request history
    clients: Arc<Mutex<Clients>>,
    /// Maximum requests per window
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    /// * `max_requests` - Maximum number of requests allowed per window
    /// * `window_secs` - Sliding window length in seconds
    pub fn new(max_requests: usize, window_secs: u64) -> Self {
        Self {
            clients: Arc::new(Mutex::new(Clients {
                history: HashMap::new(),
                last_sweep: Instant::now(),
            })),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Check if a request from the given client should be allowed
    async fn check_rate_limit(&self, client: &str) -> bool {
        let mut clients = self.clients.lock().await;
        let now = Instant::now();
        let window = self.window;

        // Once per window, forget clients with no request inside it.
        if now.duration_since(clients.last_sweep) >= window {
            clients
                .history
                .retain(|_, times| times.iter().any(|&time| now.duration_since(time) < window));
            clients.last_sweep = now;
        }

        let history = clients.history.entry(client.to_owned()).or_default();

        // Remove old requests outside the time window
        history.retain(|&time| now.duration_since(time) < window);

        if history.len() < self.max_requests {
            history.push(now);
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    async fn tracked_clients(&self) -> usize {
        self.clients.lock().await.history.len()
    }
}

/// Rate limiting middleware, keyed on the first `X-Forwarded-For` address.
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Result<Response<Body>, StatusCode> {
    let client = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .unwrap_or("unknown")
        .trim()
        .to_owned();

    if !limiter.check_rate_limit(&client).await {
        tracing::warn!(%client, "Rate limit exceeded");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_allows_under_limit() {
        let limiter = RateLimiter::new(5, 60);

        for _ in 0..5 {
            assert!(limiter.check_rate_limit("127.0.0.1").await);
        }
    }

    #[tokio::test]
    async fn test_rate_limiter_blocks_over_limit() {
        let limiter = RateLimiter::new(3, 60);

        for _ in 0..3 {
            assert!(limiter.check_rate_limit("192.168.1.1").await);
        }

        // 4th request should be blocked
        assert!(!limiter.check_rate_limit("192.168.1.1").await);
    }

    #[tokio::test]
    async fn test_rate_limiter_different_clients() {
        let limiter = RateLimiter::new(2, 60);

        assert!(limiter.check_rate_limit("10.0.0.1").await);
        assert!(limiter.check_rate_limit("10.0.0.2").await);
        assert!(limiter.check_rate_limit("10.0.0.1").await);
        assert!(limiter.check_rate_limit("10.0.0.2").await);

        assert!(!limiter.check_rate_limit("10.0.0.1").await);
        assert!(!limiter.check_rate_limit("10.0.0.2").await);
    }

    #[tokio::test]
    async fn test_rate_limiter_window_expires() {
        let limiter = RateLimiter::new(1, 0);

        assert!(limiter.check_rate_limit("10.0.0.3").await);
        // A zero-length window forgets every earlier request.
        assert!(limiter.check_rate_limit("10.0.0.3").await);
    }

    #[tokio::test]
    async fn test_rate_limiter_forgets_idle_clients() {
        let limiter = RateLimiter::new(1, 0);

        for n in 0..100 {
            assert!(limiter.check_rate_limit(&format!("10.1.0.{n}")).await);
        }
        assert_eq!(limiter.tracked_clients().await, 1);
    }

    #[tokio::test]
    async fn test_rate_limiter_keeps_active_clients() {
        let limiter = RateLimiter::new(1, 60);

        for client in ["10.2.0.1", "10.2.0.2", "10.2.0.3"] {
            assert!(limiter.check_rate_limit(client).await);
        }
        assert_eq!(limiter.tracked_clients().await, 3);
        assert!(!limiter.check_rate_limit("10.2.0.1").await);
    }

    #[test]
    fn test_api_csp_is_a_valid_header() {
        assert!(HeaderValue::from_str(&API_CSP.join("; ")).is_ok());
    }
}
