//! Per-provider sliding-window rate limiting

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Counts provider calls inside a sliding window
///
/// A call that would exceed the limit is refused rather than delayed; the
/// gateway marks the capability unavailable and moves on.
#[derive(Debug, Default)]
pub struct RateLimiter {
    calls: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a call for `provider` if fewer than `limit` happened within `window`
    pub fn try_acquire(&self, provider: &str, limit: u32, window: Duration) -> bool {
        self.try_acquire_at(provider, limit, window, Instant::now())
    }

    fn try_acquire_at(&self, provider: &str, limit: u32, window: Duration, now: Instant) -> bool {
        let mut calls = self
            .calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let history = calls.entry(provider.to_string()).or_default();

        while let Some(oldest) = history.front() {
            if now.saturating_duration_since(*oldest) >= window {
                history.pop_front();
            } else {
                break;
            }
        }

        if history.len() >= limit as usize {
            tracing::debug!("Rate limit reached for {} ({} per {:?})", provider, limit, window);
            return false;
        }

        history.push_back(now);
        true
    }

    /// Calls still available to `provider` in the current window
    pub fn remaining(&self, provider: &str, limit: u32, window: Duration) -> u32 {
        let calls = self
            .calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        let used = calls
            .get(provider)
            .map(|history| {
                history
                    .iter()
                    .filter(|at| now.saturating_duration_since(**at) < window)
                    .count()
            })
            .unwrap_or(0);
        limit.saturating_sub(used as u32)
    }
}
