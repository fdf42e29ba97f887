//! Rate limiting primitives for the login flow.

use chrono::{DateTime, Duration, Utc};
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    Login,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    fn check_ip(
        &self,
        ip: Option<&str>,
        action: RateLimitAction,
        now: DateTime<Utc>,
    ) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_ip(
        &self,
        _ip: Option<&str>,
        _action: RateLimitAction,
        _now: DateTime<Utc>,
    ) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

/// Fixed-window counter per client address and action.
///
/// Requests without a known address share one bucket.
#[derive(Debug)]
pub struct WindowRateLimiter {
    limit: u32,
    window: Duration,
    buckets: Mutex<HashMap<(String, RateLimitAction), (DateTime<Utc>, u32)>>,
}

impl WindowRateLimiter {
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::minutes(1))
    }
}

impl RateLimiter for WindowRateLimiter {
    fn check_ip(
        &self,
        ip: Option<&str>,
        action: RateLimitAction,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        // A panic elsewhere leaves the counters intact; keep enforcing them.
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);

        // Drop windows that have closed so the map stays bounded by active clients.
        let window = self.window;
        buckets.retain(|_, (started, _)| now - *started < window);

        let key = (ip.unwrap_or("unknown").to_string(), action);
        let (_, count) = buckets.entry(key).or_insert((now, 0));
        if *count >= self.limit {
            return RateLimitDecision::Limited;
        }
        *count += 1;
        RateLimitDecision::Allowed
    }
}
