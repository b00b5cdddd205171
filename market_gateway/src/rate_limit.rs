//! Sliding-window admission control for gateway requests.
//!
//! A [`RateLimiter`] keeps a log of admission instants over the trailing
//! window and makes callers wait until one more request fits. The gateway
//! enforces a global cap plus tighter caps on a few endpoints, so requests
//! go through [`RateLimiters`], which applies the global limiter first and
//! then the endpoint limiter, if any.

use std::{collections::VecDeque, num::NonZeroU32, time::Duration};

use indexmap::IndexMap;
use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};
use tokio::{
    sync::Mutex,
    time::{Instant, sleep_until},
};
use tracing::trace;

/// Path of the historical bars endpoint.
pub const HISTORY_PATH: &str = "/iserver/marketdata/history";
/// Path of the instrument search endpoint.
pub const SEARCH_PATH: &str = "/iserver/secdef/search";

/// Bounds request count within a trailing window, shared by all callers.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: NonZeroU32,
    window: Duration,
    log: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: NonZeroU32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            log: Mutex::new(VecDeque::with_capacity(max_requests.get() as usize)),
        }
    }

    pub fn max_requests(&self) -> NonZeroU32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Waits until one more request fits in the window, then records it.
    ///
    /// The lock is released while waiting, so the capacity is re-checked
    /// after every wake-up; waiters are not served in arrival order.
    pub async fn admit(&self) {
        loop {
            let oldest = {
                let mut log = self.log.lock().await;
                let now = Instant::now();
                self.prune(&mut log, now);
                if log.len() < self.max_requests.get() as usize {
                    log.push_back(now);
                    return;
                }
                log.front().copied()
            };
            if let Some(oldest) = oldest {
                let ready_at = oldest + self.window;
                trace!(
                    wait_ms = ready_at.saturating_duration_since(Instant::now()).as_millis() as u64,
                    "rate limit reached"
                );
                sleep_until(ready_at).await;
            }
        }
    }

    /// Admissions still inside the trailing window.
    pub async fn in_window(&self) -> usize {
        let mut log = self.log.lock().await;
        self.prune(&mut log, Instant::now());
        log.len()
    }

    fn prune(&self, log: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&front) = log.front() {
            if now.duration_since(front) >= self.window {
                log.pop_front();
            } else {
                break;
            }
        }
    }
}

/// One limit: at most `max_requests` per `window_ms` milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSpec {
    pub max_requests: NonZeroU32,
    pub window_ms: u64,
}

impl RateLimitSpec {
    pub const fn per_second(max_requests: NonZeroU32) -> Self {
        Self {
            max_requests,
            window_ms: 1_000,
        }
    }

    pub fn build(&self) -> RateLimiter {
        RateLimiter::new(self.max_requests, Duration::from_millis(self.window_ms))
    }
}

/// Global and per-endpoint limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub global: RateLimitSpec,
    /// Endpoint path (exact match, without query string) to its limit.
    pub endpoints: IndexMap<String, RateLimitSpec>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut endpoints = IndexMap::new();
        endpoints.insert(
            HISTORY_PATH.to_string(),
            RateLimitSpec::per_second(nonzero!(10u32)),
        );
        endpoints.insert(
            SEARCH_PATH.to_string(),
            RateLimitSpec::per_second(nonzero!(5u32)),
        );
        Self {
            global: RateLimitSpec::per_second(nonzero!(50u32)),
            endpoints,
        }
    }
}

/// The global limiter plus endpoint limiters, keyed by request path.
#[derive(Debug)]
pub struct RateLimiters {
    global: RateLimiter,
    endpoints: IndexMap<String, RateLimiter>,
}

impl RateLimiters {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            global: config.global.build(),
            endpoints: config
                .endpoints
                .iter()
                .map(|(path, spec)| (path.clone(), spec.build()))
                .collect(),
        }
    }

    /// Admits one request to `path`: global limit first, then the endpoint's.
    pub async fn admit(&self, path: &str) {
        self.global.admit().await;
        if let Some(limiter) = self.endpoints.get(path) {
            limiter.admit().await;
        }
    }

    pub fn global(&self) -> &RateLimiter {
        &self.global
    }

    pub fn endpoint(&self, path: &str) -> Option<&RateLimiter> {
        self.endpoints.get(path)
    }
}

impl Default for RateLimiters {
    fn default() -> Self {
        Self::new(&RateLimitConfig::default())
    }
}
