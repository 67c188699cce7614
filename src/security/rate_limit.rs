//! Per-client rate limiting.
//!
//! Each client IP gets a token bucket holding at most `burst_size` tokens and
//! refilled at `requests_per_second`. Entries are created on first sight and
//! forgotten by a janitor task once idle for longer than `idle_timeout_secs`.
//! Admission and the sweep share one mutex.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::error::GateError;
use crate::observability::metrics;

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
struct ClientEntry {
    bucket: TokenBucket,
    last_seen: Instant,
}

pub struct RateLimiter {
    clients: Mutex<HashMap<String, ClientEntry>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Admits or rejects one request from `client`.
    pub fn check(&self, client: &str) -> Result<(), GateError> {
        if !self.config.enabled {
            return Ok(());
        }

        let burst = f64::from(self.config.burst_size);
        let rate = self.config.requests_per_second;
        let now = Instant::now();

        let mut clients = self.clients.lock().expect("rate limiter mutex poisoned");
        let tracked = clients.len();
        let entry = clients
            .entry(client.to_string())
            .or_insert_with(|| ClientEntry {
                bucket: TokenBucket::new(burst, now),
                last_seen: now,
            });
        entry.last_seen = now;
        let admitted = entry.bucket.try_acquire(burst, rate, now);

        if clients.len() != tracked {
            metrics::record_client_count(clients.len());
        }

        if admitted {
            Ok(())
        } else {
            Err(GateError::RateLimited)
        }
    }

    /// Drops every client idle for longer than the configured timeout.
    /// Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let idle_timeout = self.config.idle_timeout();
        let now = Instant::now();

        let mut clients = self.clients.lock().expect("rate limiter mutex poisoned");
        let before = clients.len();
        clients.retain(|_, entry| now.duration_since(entry.last_seen) <= idle_timeout);
        let removed = before - clients.len();

        metrics::record_client_count(clients.len());
        removed
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().expect("rate limiter mutex poisoned").len()
    }

    pub fn is_tracked(&self, client: &str) -> bool {
        self.clients
            .lock()
            .expect("rate limiter mutex poisoned")
            .contains_key(client)
    }

    /// Sweeps on a fixed interval for as long as the runtime lives.
    pub fn spawn_janitor(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);
        let period = self.config.sweep_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = limiter.sweep();
                if removed > 0 {
                    tracing::debug!(removed, "Evicted idle rate limiter clients");
                }
            }
        })
    }
}

/// Middleware keyed on the peer IP address.
pub async fn rate_limit(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = addr.ip().to_string();
    match limiter.check(&client) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            tracing::warn!(client = %client, "Rate limit exceeded");
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limiter(rps: f64, burst: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            enabled: true,
            requests_per_second: rps,
            burst_size: burst,
            sweep_interval_secs: 60,
            idle_timeout_secs: 60,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_reject() {
        let limiter = limiter(2.0, 4);
        for _ in 0..4 {
            assert!(limiter.check("10.0.0.1").is_ok());
        }
        assert!(matches!(limiter.check("10.0.0.1"), Err(GateError::RateLimited)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_after_one_interval() {
        let limiter = limiter(2.0, 4);
        for _ in 0..4 {
            limiter.check("10.0.0.1").unwrap();
        }
        assert!(limiter.check("10.0.0.1").is_err());

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.check("10.0.0.1").is_ok());
        assert!(limiter.check("10.0.0.1").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_caps_at_burst() {
        let limiter = limiter(2.0, 4);
        limiter.check("10.0.0.1").unwrap();

        tokio::time::advance(Duration::from_secs(3600)).await;
        for _ in 0..4 {
            assert!(limiter.check("10.0.0.1").is_ok());
        }
        assert!(limiter.check("10.0.0.1").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clients_are_independent() {
        let limiter = limiter(1.0, 1);
        assert!(limiter.check("10.0.0.1").is_ok());
        assert!(limiter.check("10.0.0.1").is_err());
        assert!(limiter.check("10.0.0.2").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_admits_everything() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        });
        for _ in 0..100 {
            assert!(limiter.check("10.0.0.1").is_ok());
        }
        assert_eq!(limiter.client_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_evicts_idle_and_keeps_active() {
        let limiter = limiter(2.0, 4);
        limiter.check("idle").unwrap();
        limiter.check("busy").unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        limiter.check("busy").unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(limiter.sweep(), 1);
        assert!(!limiter.is_tracked("idle"));
        assert!(limiter.is_tracked("busy"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicted_client_starts_with_full_burst() {
        let limiter = limiter(2.0, 4);
        for _ in 0..4 {
            limiter.check("10.0.0.1").unwrap();
        }
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(limiter.sweep(), 1);
        for _ in 0..4 {
            assert!(limiter.check("10.0.0.1").is_ok());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_janitor_runs_on_interval() {
        let limiter = Arc::new(limiter(2.0, 4));
        limiter.check("10.0.0.1").unwrap();
        let janitor = limiter.spawn_janitor();

        // Past the idle timeout and the next sweep.
        tokio::time::sleep(Duration::from_secs(121)).await;
        assert_eq!(limiter.client_count(), 0);
        janitor.abort();
    }

    fn rendered_clients(handle: &metrics_exporter_prometheus::PrometheusHandle) -> Option<f64> {
        handle
            .render()
            .lines()
            .find_map(|line| line.strip_prefix("gate_rate_limiter_clients "))
            .and_then(|value| value.trim().parse().ok())
    }

    #[test]
    fn test_client_gauge_follows_new_clients() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let limiter = limiter(2.0, 4);

        ::metrics::with_local_recorder(&recorder, || {
            limiter.check("10.0.0.1").unwrap();
            limiter.check("10.0.0.2").unwrap();
            // A returning client does not change the count.
            limiter.check("10.0.0.1").unwrap();
        });

        assert_eq!(rendered_clients(&handle), Some(2.0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sweep_concurrent_with_checks() {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            enabled: true,
            requests_per_second: 1000.0,
            burst_size: 1000,
            sweep_interval_secs: 60,
            idle_timeout_secs: 1,
        }));
        limiter.check("stale").unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let mut workers = Vec::new();
        for i in 0..4 {
            let limiter = limiter.clone();
            workers.push(tokio::spawn(async move {
                for _ in 0..200 {
                    limiter.check(&format!("client-{i}")).unwrap();
                    tokio::task::yield_now().await;
                }
            }));
        }
        let sweeper = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                let mut removed = 0;
                for _ in 0..50 {
                    removed += limiter.sweep();
                    tokio::task::yield_now().await;
                }
                removed
            })
        };

        for worker in workers {
            worker.await.unwrap();
        }
        assert_eq!(sweeper.await.unwrap(), 1);
        assert!(!limiter.is_tracked("stale"));
        for i in 0..4 {
            assert!(limiter.is_tracked(&format!("client-{i}")));
        }
    }
}
