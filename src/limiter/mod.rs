//! Per-client token-bucket rate limiting.
//!
//! Each peer IP owns a bucket holding up to `burst` tokens, refilled at `rps`
//! tokens per second. A request spends one token; an empty bucket means 429.
//! Clients idle for [`IDLE_TTL`] are evicted by [`RateLimiter::run_sweeper`].

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio_util::sync::CancellationToken;

use crate::errors::AppError;

/// How long a client may stay silent before its bucket is dropped.
pub const IDLE_TTL: Duration = Duration::from_secs(3 * 60);

/// How often the sweeper looks for idle clients.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
pub struct LimiterConfig {
    pub enabled: bool,
    pub rps: f64,
    pub burst: u32,
}

#[derive(Debug)]
struct Client {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

pub struct RateLimiter {
    config: LimiterConfig,
    clients: Mutex<HashMap<IpAddr, Client>>,
}

impl RateLimiter {
    pub fn new(config: LimiterConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            clients: Mutex::new(HashMap::new()),
        })
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Spend one token for `ip`, returning whether the request may proceed.
    pub fn allow(&self, ip: IpAddr) -> bool {
        self.allow_at(ip, Instant::now())
    }

    fn allow_at(&self, ip: IpAddr, now: Instant) -> bool {
        if !self.config.enabled {
            return true;
        }

        let burst = f64::from(self.config.burst);
        let mut clients = self.lock();
        let client = clients.entry(ip).or_insert(Client {
            tokens: burst,
            last_refill: now,
            last_seen: now,
        });

        let elapsed = now.saturating_duration_since(client.last_refill).as_secs_f64();
        client.tokens = (client.tokens + elapsed * self.config.rps).min(burst);
        client.last_refill = now;
        client.last_seen = now;

        if client.tokens >= 1.0 {
            client.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop every client not seen within [`IDLE_TTL`] of `now`.
    fn evict_idle(&self, now: Instant) -> usize {
        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|_, c| now.saturating_duration_since(c.last_seen) < IDLE_TTL);
        before - clients.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    /// Periodically evict idle clients until `shutdown` fires.
    pub async fn run_sweeper(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let evicted = self.evict_idle(Instant::now());
                    if evicted > 0 {
                        tracing::debug!(
                            evicted,
                            remaining = self.tracked_clients(),
                            "evicted idle rate-limit clients"
                        );
                    }
                }
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<IpAddr, Client>> {
        self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Middleware rejecting clients that exhausted their bucket.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if !limiter.allow(peer.ip()) {
        return AppError::RateLimited.into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(enabled: bool) -> Arc<RateLimiter> {
        RateLimiter::new(LimiterConfig {
            enabled,
            rps: 2.0,
            burst: 4,
        })
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([10, 0, 0, last])
    }

    #[test]
    fn test_burst_then_deny() {
        let limiter = limiter(true);
        let now = Instant::now();
        for _ in 0..4 {
            assert!(limiter.allow_at(ip(1), now));
        }
        assert!(!limiter.allow_at(ip(1), now));
    }

    #[test]
    fn test_refill_over_time() {
        let limiter = limiter(true);
        let now = Instant::now();
        for _ in 0..4 {
            limiter.allow_at(ip(1), now);
        }
        assert!(!limiter.allow_at(ip(1), now));

        // 2 rps: half a second buys one more request
        let later = now + Duration::from_millis(500);
        assert!(limiter.allow_at(ip(1), later));
        assert!(!limiter.allow_at(ip(1), later));
    }

    #[test]
    fn test_refill_caps_at_burst() {
        let limiter = limiter(true);
        let now = Instant::now();
        limiter.allow_at(ip(1), now);

        let much_later = now + Duration::from_secs(60);
        for _ in 0..4 {
            assert!(limiter.allow_at(ip(1), much_later));
        }
        assert!(!limiter.allow_at(ip(1), much_later));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = limiter(true);
        let now = Instant::now();
        for _ in 0..4 {
            limiter.allow_at(ip(1), now);
        }
        assert!(!limiter.allow_at(ip(1), now));
        assert!(limiter.allow_at(ip(2), now));
    }

    #[test]
    fn test_disabled_allows_everything() {
        let limiter = limiter(false);
        let now = Instant::now();
        for _ in 0..100 {
            assert!(limiter.allow_at(ip(1), now));
        }
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn test_idle_clients_are_evicted() {
        let limiter = limiter(true);
        let now = Instant::now();
        limiter.allow_at(ip(1), now);
        limiter.allow_at(ip(2), now + Duration::from_secs(120));

        let evicted = limiter.evict_idle(now + IDLE_TTL + Duration::from_secs(1));
        assert_eq!(evicted, 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(limiter(true).run_sweeper(shutdown.clone()));
        shutdown.cancel();
        handle.await.unwrap();
    }
}
