//! Circuit breaker for external integrations.
//!
//! Closed -> Open after `failure_threshold` consecutive failures.
//! Open -> HalfOpen once `timeout` has passed since the last failure; the
//! call that observes this is attempted.
//! HalfOpen -> Closed after `success_threshold` successes, back to Open on
//! any failure.

use std::fmt;
use std::future::Future;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vaultflow_core::config::CircuitBreakerSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout: Duration,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::from(&CircuitBreakerSettings::default())
    }
}

impl From<&CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            timeout: Duration::seconds(settings.timeout_secs as i64),
            success_threshold: settings.success_threshold,
        }
    }
}

/// Error returned by a guarded call.
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    /// Rejected without invoking the wrapped call.
    #[error("Circuit breaker '{name}' is open")]
    Open { name: String },
    /// The wrapped call's own error, unchanged.
    #[error("{0}")]
    Failed(E),
}

/// Outcome bookkeeping behind an injectable seam.
///
/// [`CircuitBreaker`] keeps its counters in process memory; a shared-store
/// tracker can replace it for multi-process deployments.
pub trait OutcomeTracker: Send + Sync {
    fn name(&self) -> &str;
    /// Whether a call may be attempted now.
    fn allow(&self) -> bool;
    fn on_result(&self, success: bool);
}

/// Run `f` through any [`OutcomeTracker`].
pub async fn guarded<T, E, F, Fut>(
    tracker: &dyn OutcomeTracker,
    f: F,
) -> Result<T, BreakerError<E>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if !tracker.allow() {
        return Err(BreakerError::Open {
            name: tracker.name().to_string(),
        });
    }
    let result = f().await;
    tracker.on_result(result.is_ok());
    result.map_err(BreakerError::Failed)
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<DateTime<Utc>>,
}

/// In-process circuit breaker for one integration.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
            }),
        }
    }

    pub async fn call<T, E, F, Fut>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_at(Utc::now(), f).await
    }

    /// [`CircuitBreaker::call`] against an explicit clock reading.
    pub async fn call_at<T, E, F, Fut>(
        &self,
        now: DateTime<Utc>,
        f: F,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.allow_at(now) {
            return Err(BreakerError::Open {
                name: self.name.clone(),
            });
        }
        let result = f().await;
        self.on_result_at(result.is_ok(), now);
        result.map_err(BreakerError::Failed)
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().unwrap().failure_count
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.last_failure = None;
        info!(breaker = %self.name, "Circuit breaker reset");
    }

    fn allow_at(&self, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != CircuitState::Open {
            return true;
        }
        let timed_out = inner
            .last_failure
            .map_or(true, |at| now - at >= self.config.timeout);
        if timed_out {
            inner.state = CircuitState::HalfOpen;
            inner.success_count = 0;
            info!(breaker = %self.name, "Circuit breaker half-open, allowing trial call");
            true
        } else {
            false
        }
    }

    fn on_result_at(&self, success: bool, now: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        if success {
            inner.failure_count = 0;
            if inner.state == CircuitState::HalfOpen {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.success_count = 0;
                    info!(breaker = %self.name, "Circuit breaker closed");
                }
            }
            return;
        }

        inner.failure_count += 1;
        inner.last_failure = Some(now);
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.success_count = 0;
                warn!(breaker = %self.name, "Trial call failed, circuit breaker reopened");
            }
            CircuitState::Closed if inner.failure_count >= self.config.failure_threshold => {
                inner.state = CircuitState::Open;
                warn!(
                    breaker = %self.name,
                    failures = inner.failure_count,
                    "Circuit breaker opened"
                );
            }
            _ => {}
        }
    }
}

impl OutcomeTracker for CircuitBreaker {
    fn name(&self) -> &str {
        &self.name
    }

    fn allow(&self) -> bool {
        self.allow_at(Utc::now())
    }

    fn on_result(&self, success: bool) {
        self.on_result_at(success, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("smtp", CircuitBreakerConfig::default())
    }

    async fn fail(cb: &CircuitBreaker, now: DateTime<Utc>) -> Result<(), BreakerError<String>> {
        cb.call_at(now, || async { Err::<(), _>("boom".to_string()) })
            .await
    }

    async fn succeed(cb: &CircuitBreaker, now: DateTime<Utc>) -> Result<u32, BreakerError<String>> {
        cb.call_at(now, || async { Ok::<_, String>(7) }).await
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "half_open");
        assert_eq!(CircuitState::Closed.to_string(), "closed");
    }

    #[tokio::test]
    async fn test_passes_through_value_and_error() {
        let cb = breaker();
        assert_eq!(succeed(&cb, t0()).await.unwrap(), 7);
        match fail(&cb, t0()).await {
            Err(BreakerError::Failed(e)) => assert_eq!(e, "boom"),
            other => panic!("expected wrapped error, got {:?}", other),
        }
        assert_eq!(cb.failure_count(), 1);
    }

    #[tokio::test]
    async fn test_opens_after_threshold_and_rejects_without_calling() {
        let cb = breaker();
        let now = t0();
        for _ in 0..5 {
            let _ = fail(&cb, now).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        let calls = AtomicU32::new(0);
        let result = cb
            .call_at(now + Duration::seconds(10), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            })
            .await;
        assert!(matches!(result, Err(BreakerError::Open { ref name }) if name == "smtp"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count_when_closed() {
        let cb = breaker();
        let now = t0();
        for _ in 0..4 {
            let _ = fail(&cb, now).await;
        }
        succeed(&cb, now).await.unwrap();
        assert_eq!(cb.failure_count(), 0);
        let _ = fail(&cb, now).await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_after_timeout_then_closes() {
        let cb = breaker();
        let now = t0();
        for _ in 0..5 {
            let _ = fail(&cb, now).await;
        }

        let later = now + Duration::seconds(60);
        succeed(&cb, later).await.unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        succeed(&cb, later).await.unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        succeed(&cb, later).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let cb = breaker();
        let now = t0();
        for _ in 0..5 {
            let _ = fail(&cb, now).await;
        }

        let trial = now + Duration::seconds(61);
        succeed(&cb, trial).await.unwrap();
        let _ = fail(&cb, trial).await;
        assert_eq!(cb.state(), CircuitState::Open);

        // The timeout restarts from the failed trial.
        let result = succeed(&cb, trial + Duration::seconds(30)).await;
        assert!(matches!(result, Err(BreakerError::Open { .. })));

        // Success progress from the earlier half-open period is gone.
        let retry = trial + Duration::seconds(60);
        succeed(&cb, retry).await.unwrap();
        succeed(&cb, retry).await.unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[tokio::test]
    async fn test_reset() {
        let cb = breaker();
        for _ in 0..5 {
            let _ = fail(&cb, t0()).await;
        }
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_guarded_through_trait_object() {
        let cb = CircuitBreaker::new(
            "graph",
            CircuitBreakerConfig {
                failure_threshold: 1,
                ..CircuitBreakerConfig::default()
            },
        );
        let tracker: &dyn OutcomeTracker = &cb;

        let first = guarded(tracker, || async { Err::<(), _>("down") }).await;
        assert!(matches!(first, Err(BreakerError::Failed("down"))));
        assert_eq!(cb.state(), CircuitState::Open);

        let second = guarded(tracker, || async { Ok::<_, &str>(()) }).await;
        assert!(matches!(second, Err(BreakerError::Open { .. })));
    }

    #[test]
    fn test_breaker_error_display() {
        let err: BreakerError<String> = BreakerError::Open {
            name: "smtp".to_string(),
        };
        assert_eq!(err.to_string(), "Circuit breaker 'smtp' is open");
        let err: BreakerError<String> = BreakerError::Failed("timeout".to_string());
        assert_eq!(err.to_string(), "timeout");
    }
}
