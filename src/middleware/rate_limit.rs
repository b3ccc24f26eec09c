//! Per-client token-bucket admission control.
//!
//! Each client key owns a bucket that starts full at `burst` tokens and
//! refills at `rps` tokens per second up to `burst`. An admitted request
//! takes one token; a denied request takes nothing. All buckets live in one
//! map behind one mutex, shared by admission checks and the idle sweep.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::LimiterConfig;
use crate::error::ApiError;
use crate::lifecycle::BackgroundTasks;

/// Entries idle for longer than this many sweep intervals are dropped
pub const IDLE_SWEEPS: u32 = 3;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub rps: f64,
    pub burst: u32,
    pub sweep_interval: Duration,
}

impl From<&LimiterConfig> for RateLimitConfig {
    fn from(config: &LimiterConfig) -> Self {
        Self {
            enabled: config.enabled,
            rps: config.rps,
            burst: config.burst,
            sweep_interval: config.sweep_interval(),
        }
    }
}

/// Peer IP a bucket is kept for. Admission runs before authentication, so
/// the address is the only identity available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientKey(pub IpAddr);

impl ClientKey {
    /// Peer address recorded by the listener; `None` when the transport gave none
    pub fn from_request(request: &Request) -> Option<Self> {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| ClientKey(addr.ip()))
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ip:{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied { retry_after: Duration },
}

#[derive(Debug)]
struct ClientState {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl ClientState {
    fn full(burst: u32, now: Instant) -> Self {
        Self {
            tokens: burst as f64,
            last_refill: now,
            last_seen: now,
        }
    }

    fn refill(&mut self, now: Instant, rps: f64, burst: u32) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rps).min(burst as f64);
        self.last_refill = now;
    }
}

pub struct RateLimiter {
    config: RateLimitConfig,
    clients: Mutex<HashMap<ClientKey, ClientState>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ClientKey, ClientState>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take one token for `key` if one is available
    pub fn admit(&self, key: &ClientKey) -> Admission {
        if !self.config.enabled {
            return Admission::Allowed;
        }

        let now = Instant::now();
        let mut clients = self.lock();
        let state = clients
            .entry(*key)
            .or_insert_with(|| ClientState::full(self.config.burst, now));

        state.refill(now, self.config.rps, self.config.burst);
        state.last_seen = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Admission::Allowed
        } else {
            let retry_after = if self.config.rps > 0.0 {
                Duration::try_from_secs_f64((1.0 - state.tokens) / self.config.rps).unwrap_or(Duration::MAX)
            } else {
                self.config.sweep_interval
            };
            Admission::Denied { retry_after }
        }
    }

    fn idle_threshold(&self) -> Duration {
        self.config.sweep_interval * IDLE_SWEEPS
    }

    /// Drop clients not seen within the idle threshold; returns how many were dropped
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let idle = self.idle_threshold();

        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|_, state| now.saturating_duration_since(state.last_seen) <= idle);
        before - clients.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    /// Run `sweep` every interval on a tracked task until `shutdown` is cancelled
    pub fn spawn_sweeper(self: &Arc<Self>, tasks: &BackgroundTasks, shutdown: CancellationToken) {
        let limiter = Arc::clone(self);
        let period = self.config.sweep_interval.max(Duration::from_millis(1));

        tasks.spawn("rate-limit-sweep", async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("rate limit sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = limiter.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, remaining = limiter.tracked_clients(), "swept idle rate limit entries");
                        }
                    }
                }
            }
        });
    }
}

/// Admission middleware. Keyed on the peer address.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !limiter.enabled() {
        return Ok(next.run(request).await);
    }

    let key = ClientKey::from_request(&request).ok_or_else(|| {
        tracing::error!(uri = %request.uri(), "cannot derive rate limit key: no peer address");
        ApiError::ServerFault
    })?;

    match limiter.admit(&key) {
        Admission::Allowed => Ok(next.run(request).await),
        Admission::Denied { retry_after } => {
            tracing::debug!(client = %key, retry_after_ms = retry_after.as_millis() as u64, "rate limit exceeded");
            Err(ApiError::RateLimited { retry_after })
        }
    }
}
