use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::ConnectInfo,
    http::{Extensions, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;
use tracing::warn;

/// What a bucket is counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Any HTTP request, keyed by client address.
    Request,
    /// Loading a shared view by token.
    Resolve,
    PostComment,
    React,
    SendInvitation,
}

/// One bucket: who is calling and what for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateKey {
    pub subject: String,
    pub operation: Operation,
}

impl RateKey {
    pub fn new(subject: impl Into<String>, operation: Operation) -> Self {
        Self {
            subject: subject.into(),
            operation,
        }
    }
}

/// Refill rate (tokens per second) and burst capacity of a bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatePolicy {
    pub rate: f64,
    pub capacity: f64,
}

impl RatePolicy {
    pub const fn new(rate: f64, capacity: f64) -> Self {
        Self { rate, capacity }
    }
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn try_consume(&mut self, policy: RatePolicy) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;

        self.tokens = (self.tokens + elapsed * policy.rate).min(policy.capacity);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Token-bucket limiter shared by the middleware and the handlers.
///
/// Cloning is cheap; clones share their buckets.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<RateKey, TokenBucket>>>,
    policies: Arc<HashMap<Operation, RatePolicy>>,
    default_policy: RatePolicy,
}

impl RateLimiter {
    /// A limiter applying `default_policy` to every operation.
    pub fn new(default_policy: RatePolicy) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            policies: Arc::new(HashMap::new()),
            default_policy,
        }
    }

    /// Override the policy of one operation.
    pub fn with_policy(mut self, operation: Operation, policy: RatePolicy) -> Self {
        Arc::make_mut(&mut self.policies).insert(operation, policy);
        self
    }

    /// Limits used by the server: the configured rate for plain requests and
    /// view loads, tighter ones for writes.
    pub fn for_server(rate: f64, burst: f64) -> Self {
        Self::new(RatePolicy::new(rate, burst))
            .with_policy(Operation::PostComment, RatePolicy::new(0.5, 10.0))
            .with_policy(Operation::React, RatePolicy::new(2.0, 20.0))
            .with_policy(Operation::SendInvitation, RatePolicy::new(0.1, 10.0))
    }

    pub fn policy(&self, operation: Operation) -> RatePolicy {
        self.policies
            .get(&operation)
            .copied()
            .unwrap_or(self.default_policy)
    }

    /// Take one token from the key's bucket. `false` means over the limit.
    pub async fn check(&self, key: &RateKey) -> bool {
        let policy = self.policy(key.operation);
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry(key.clone())
            .or_insert_with(|| TokenBucket::new(policy.capacity));
        bucket.try_consume(policy)
    }

    /// Forget a key, giving it a full bucket on its next call.
    pub async fn reset(&self, key: &RateKey) {
        self.buckets.lock().await.remove(key);
    }

    pub async fn purge_stale(&self, max_idle: Duration) {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_refill) < max_idle);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::for_server(10.0, 30.0)
    }
}

pub async fn rate_limit_middleware(
    axum::extract::State(limiter): axum::extract::State<RateLimiter>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let ip = client_ip(req.extensions(), req.headers());

    if let Some(ip) = ip {
        if !limiter.check(&RateKey::new(ip.to_string(), Operation::Request)).await {
            warn!(ip = %ip, "Rate limit exceeded");
            return Err(StatusCode::TOO_MANY_REQUESTS);
        }
    }

    Ok(next.run(req).await)
}

/// Try ConnectInfo first, then X-Forwarded-For, then X-Real-IP.
pub fn client_ip(extensions: &Extensions, headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(connect_info) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return Some(connect_info.0.ip());
    }

    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                if let Ok(ip) = first.trim().parse::<IpAddr>() {
                    return Some(ip);
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            if let Ok(ip) = value.trim().parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(subject: &str, operation: Operation) -> RateKey {
        RateKey::new(subject, operation)
    }

    #[tokio::test]
    async fn test_rate_limiter_allows_burst() {
        let limiter = RateLimiter::new(RatePolicy::new(10.0, 5.0));
        let k = key("127.0.0.1", Operation::Request);

        for _ in 0..5 {
            assert!(limiter.check(&k).await);
        }

        assert!(!limiter.check(&k).await);
    }

    #[tokio::test]
    async fn test_rate_limiter_different_subjects() {
        let limiter = RateLimiter::new(RatePolicy::new(10.0, 2.0));
        let k1 = key("10.0.0.1", Operation::Request);
        let k2 = key("10.0.0.2", Operation::Request);

        assert!(limiter.check(&k1).await);
        assert!(limiter.check(&k1).await);
        assert!(!limiter.check(&k1).await);

        assert!(limiter.check(&k2).await);
    }

    #[tokio::test]
    async fn test_operations_have_separate_buckets() {
        let limiter = RateLimiter::new(RatePolicy::new(10.0, 1.0))
            .with_policy(Operation::PostComment, RatePolicy::new(0.0, 2.0));

        assert!(limiter.check(&key("u1", Operation::Resolve)).await);
        assert!(!limiter.check(&key("u1", Operation::Resolve)).await);

        let post = key("u1", Operation::PostComment);
        assert!(limiter.check(&post).await);
        assert!(limiter.check(&post).await);
        assert!(!limiter.check(&post).await);
    }

    #[tokio::test]
    async fn test_reset_refills() {
        let limiter = RateLimiter::new(RatePolicy::new(0.0, 1.0));
        let k = key("u1", Operation::React);
        assert!(limiter.check(&k).await);
        assert!(!limiter.check(&k).await);

        limiter.reset(&k).await;
        assert!(limiter.check(&k).await);
    }

    #[tokio::test]
    async fn test_purge_stale() {
        let limiter = RateLimiter::default();
        assert!(limiter.check(&key("192.168.1.1", Operation::Request)).await);

        limiter.purge_stale(Duration::ZERO).await;

        let buckets = limiter.buckets.lock().await;
        assert!(buckets.is_empty());
    }

    #[test]
    fn test_client_ip_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        let ip = client_ip(&Extensions::new(), &headers);
        assert_eq!(ip, Some("203.0.113.7".parse().unwrap()));

        assert_eq!(client_ip(&Extensions::new(), &HeaderMap::new()), None);
    }
}
