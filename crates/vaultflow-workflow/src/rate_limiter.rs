//! Sliding-window admission control for external actions.
//!
//! Each action name gets an hourly quota. Calls are remembered as
//! timestamps, oldest first, and evicted once they fall out of the window.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

/// Length of the sliding window.
pub const WINDOW_SECS: i64 = 3600;

/// Admission decisions consulted before an external side effect.
///
/// The in-process [`RateLimiter`] is the default; a shared-store
/// implementation can be substituted without touching call sites.
pub trait Admission: Send + Sync {
    /// Whether one more call would currently be within quota.
    fn admit(&self, action: &str) -> bool;
    /// Count one call against the quota.
    fn record(&self, action: &str);
    /// Check and record in one step. Returns `false` without recording
    /// when the quota is used up.
    fn try_admit(&self, action: &str) -> bool;
}

/// Per-action sliding-window rate limiter.
pub struct RateLimiter {
    limits: HashMap<String, u32>,
    window: Duration,
    calls: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
}

impl RateLimiter {
    /// Create a limiter from action name -> calls per hour.
    /// Actions without an entry are unlimited.
    pub fn new(limits: HashMap<String, u32>) -> Self {
        Self {
            limits,
            window: Duration::seconds(WINDOW_SECS),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn check_limit(&self, action: &str) -> bool {
        self.check_limit_at(action, Utc::now())
    }

    /// [`RateLimiter::check_limit`] against an explicit clock reading.
    pub fn check_limit_at(&self, action: &str, now: DateTime<Utc>) -> bool {
        let Some(&limit) = self.limits.get(action) else {
            return true;
        };
        let mut calls = self.calls.lock().unwrap();
        let window = calls.entry(action.to_string()).or_default();
        self.evict(window, now);
        (window.len() as u32) < limit
    }

    pub fn record_call(&self, action: &str) {
        self.record_call_at(action, Utc::now());
    }

    pub fn record_call_at(&self, action: &str, now: DateTime<Utc>) {
        let mut calls = self.calls.lock().unwrap();
        calls.entry(action.to_string()).or_default().push_back(now);
    }

    /// Check and record under a single lock acquisition, so concurrent
    /// callers in this process can never exceed the quota.
    pub fn try_acquire(&self, action: &str) -> bool {
        self.try_acquire_at(action, Utc::now())
    }

    pub fn try_acquire_at(&self, action: &str, now: DateTime<Utc>) -> bool {
        let limit = self.limits.get(action).copied();
        let mut calls = self.calls.lock().unwrap();
        let window = calls.entry(action.to_string()).or_default();
        self.evict(window, now);

        if let Some(limit) = limit {
            if window.len() as u32 >= limit {
                warn!(action = %action, limit, "Rate limit exceeded");
                return false;
            }
        }
        window.push_back(now);
        true
    }

    /// Calls left in the current window, or -1 if the action is unlimited.
    pub fn remaining(&self, action: &str) -> i64 {
        self.remaining_at(action, Utc::now())
    }

    pub fn remaining_at(&self, action: &str, now: DateTime<Utc>) -> i64 {
        let Some(&limit) = self.limits.get(action) else {
            return -1;
        };
        let mut calls = self.calls.lock().unwrap();
        let window = calls.entry(action.to_string()).or_default();
        self.evict(window, now);
        (limit as i64 - window.len() as i64).max(0)
    }

    /// When the oldest call in the window expires and capacity frees up.
    /// `now` if the window is empty.
    pub fn reset_time(&self, action: &str) -> DateTime<Utc> {
        self.reset_time_at(action, Utc::now())
    }

    pub fn reset_time_at(&self, action: &str, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut calls = self.calls.lock().unwrap();
        let Some(window) = calls.get_mut(action) else {
            return now;
        };
        self.evict(window, now);
        window
            .front()
            .map(|oldest| *oldest + self.window)
            .unwrap_or(now)
    }

    /// Clear history for one action, or for all actions with `None`.
    pub fn reset(&self, action: Option<&str>) {
        let mut calls = self.calls.lock().unwrap();
        match action {
            Some(action) => {
                calls.remove(action);
            }
            None => calls.clear(),
        }
    }

    fn evict(&self, window: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        while window.front().is_some_and(|t| *t < cutoff) {
            window.pop_front();
        }
    }
}

impl Admission for RateLimiter {
    fn admit(&self, action: &str) -> bool {
        self.check_limit(action)
    }

    fn record(&self, action: &str) {
        self.record_call(action)
    }

    fn try_admit(&self, action: &str) -> bool {
        self.try_acquire(action)
    }
}
