//! Condition polling against a remote, asynchronously rendering page.
//!
//! The poller evaluates a predicate until it reports a satisfied
//! [`Observation`] or the budget runs out. Transient evaluation errors count
//! as "not yet"; fatal ones end the wait immediately. The predicate is always
//! evaluated one last time at the deadline, and a single evaluation that hangs
//! is cut off at the deadline as well.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::result::{SmokeError, SmokeResult};

/// Default timeout for wait operations (5 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Default navigation timeout (30 seconds)
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30_000;

const NOTHING_OBSERVED: &str = "nothing observed";

/// What a predicate saw on one evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Whether the condition held
    pub satisfied: bool,
    /// Human-readable snapshot of the observed state
    pub detail: String,
}

impl Observation {
    /// The condition held
    #[must_use]
    pub fn satisfied(detail: impl Into<String>) -> Self {
        Self {
            satisfied: true,
            detail: detail.into(),
        }
    }

    /// The condition did not hold (yet)
    #[must_use]
    pub fn pending(detail: impl Into<String>) -> Self {
        Self {
            satisfied: false,
            detail: detail.into(),
        }
    }

    /// Build from a boolean check
    #[must_use]
    pub fn from_check(satisfied: bool, detail: impl Into<String>) -> Self {
        Self {
            satisfied,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Poll interval as Duration, never longer than the timeout and never zero
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        let interval = self.poll_interval_ms.clamp(1, self.timeout_ms.max(1));
        Duration::from_millis(interval)
    }
}

/// Result of a successful wait
#[derive(Debug, Clone)]
pub struct WaitOutcome {
    /// The satisfying observation
    pub observation: Observation,
    /// Time spent waiting
    pub elapsed: Duration,
    /// Number of predicate evaluations
    pub polls: usize,
}

/// Condition poller
#[derive(Debug, Clone, Copy, Default)]
pub struct Poller {
    options: WaitOptions,
}

impl Poller {
    /// Create a poller with the given options
    #[must_use]
    pub const fn new(options: WaitOptions) -> Self {
        Self { options }
    }

    /// Options in effect
    #[must_use]
    pub const fn options(&self) -> &WaitOptions {
        &self.options
    }

    /// Evaluate `predicate` until it is satisfied or the timeout elapses
    ///
    /// # Errors
    ///
    /// `TimeoutExceeded` with the last observation, or the first fatal or
    /// non-transient error raised by the predicate.
    pub async fn await_condition<F, Fut>(
        &self,
        waited_for: &str,
        mut predicate: F,
    ) -> SmokeResult<WaitOutcome>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SmokeResult<Observation>>,
    {
        let start = Instant::now();
        let deadline = start + self.options.timeout();
        let interval = self.options.poll_interval();
        let mut polls = 0;
        let mut last = NOTHING_OBSERVED.to_string();

        loop {
            polls += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            // A zero budget still gets one evaluation
            let budget = remaining.max(interval);
            match tokio::time::timeout(budget, predicate()).await {
                Ok(Ok(observation)) if observation.satisfied => {
                    tracing::trace!(waited_for, polls, detail = %observation, "condition satisfied");
                    return Ok(WaitOutcome {
                        observation,
                        elapsed: start.elapsed(),
                        polls,
                    });
                }
                Ok(Ok(observation)) => last = observation.detail,
                Ok(Err(err)) if err.is_fatal() => return Err(err),
                Ok(Err(err)) if err.is_transient() => {
                    tracing::trace!(waited_for, error = %err, "transient evaluation error");
                    last = err.to_string();
                }
                Ok(Err(err)) => return Err(err),
                Err(_) => last = format!("evaluation still pending after {}ms", budget.as_millis()),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(SmokeError::TimeoutExceeded {
                    waited_for: waited_for.to_string(),
                    ms: self.options.timeout_ms,
                    last_observation: last,
                });
            }
            tokio::time::sleep(interval.min(deadline - now)).await;
        }
    }
}

/// Wait for a condition with an explicit timeout and poll interval
///
/// # Errors
///
/// See [`Poller::await_condition`].
pub async fn await_condition<F, Fut>(
    waited_for: &str,
    predicate: F,
    timeout: Duration,
    poll_interval: Duration,
) -> SmokeResult<Observation>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SmokeResult<Observation>>,
{
    let options = WaitOptions::new()
        .with_timeout(timeout.as_millis() as u64)
        .with_poll_interval(poll_interval.as_millis() as u64);
    Poller::new(options)
        .await_condition(waited_for, predicate)
        .await
        .map(|outcome| outcome.observation)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast() -> Poller {
        Poller::new(WaitOptions::new().with_timeout(200).with_poll_interval(5))
    }

    mod options_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let opts = WaitOptions::default();
            assert_eq!(opts.timeout_ms, DEFAULT_WAIT_TIMEOUT_MS);
            assert_eq!(opts.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        }

        #[test]
        fn test_interval_clamped_to_timeout() {
            let opts = WaitOptions::new().with_timeout(10).with_poll_interval(1000);
            assert_eq!(opts.poll_interval(), Duration::from_millis(10));
        }

        #[test]
        fn test_zero_interval_becomes_one_ms() {
            let opts = WaitOptions::new().with_poll_interval(0);
            assert_eq!(opts.poll_interval(), Duration::from_millis(1));
        }

        proptest! {
            #[test]
            fn prop_interval_within_bounds(timeout in 0u64..100_000, interval in 0u64..100_000) {
                let opts = WaitOptions::new().with_timeout(timeout).with_poll_interval(interval);
                let got = opts.poll_interval().as_millis() as u64;
                prop_assert!(got >= 1);
                prop_assert!(got <= timeout.max(1));
            }
        }
    }

    mod poller_tests {
        use super::*;

        #[tokio::test]
        async fn test_satisfied_immediately() {
            let outcome = fast()
                .await_condition("ready", || async { Ok(Observation::satisfied("ok")) })
                .await
                .unwrap();
            assert_eq!(outcome.polls, 1);
            assert_eq!(outcome.observation.detail, "ok");
        }

        #[tokio::test]
        async fn test_becomes_true_after_polls() {
            let calls = Arc::new(AtomicUsize::new(0));
            let c = calls.clone();
            let outcome = fast()
                .await_condition("third time", move || {
                    let c = c.clone();
                    async move {
                        let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                        Ok(Observation::from_check(n >= 3, format!("call {n}")))
                    }
                })
                .await
                .unwrap();
            assert_eq!(outcome.polls, 3);
            assert_eq!(calls.load(Ordering::SeqCst), 3);
        }

        #[tokio::test]
        async fn test_timeout_carries_last_observation() {
            let err = fast()
                .await_condition(".leaflet-container visible", || async {
                    Ok(Observation::pending("count=1 visible=false"))
                })
                .await
                .unwrap_err();
            match err {
                SmokeError::TimeoutExceeded {
                    waited_for,
                    ms,
                    last_observation,
                } => {
                    assert_eq!(waited_for, ".leaflet-container visible");
                    assert_eq!(ms, 200);
                    assert_eq!(last_observation, "count=1 visible=false");
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test]
        async fn test_transient_errors_are_swallowed() {
            let calls = Arc::new(AtomicUsize::new(0));
            let c = calls.clone();
            let outcome = fast()
                .await_condition("attached", move || {
                    let c = c.clone();
                    async move {
                        if c.fetch_add(1, Ordering::SeqCst) < 2 {
                            Err(SmokeError::remote("Execution context was destroyed"))
                        } else {
                            Ok(Observation::satisfied("attached"))
                        }
                    }
                })
                .await
                .unwrap();
            assert_eq!(outcome.polls, 3);
        }

        #[tokio::test]
        async fn test_transient_error_becomes_last_observation() {
            let err = fast()
                .await_condition("attached", || async {
                    Err::<Observation, _>(SmokeError::remote("node detached"))
                })
                .await
                .unwrap_err();
            assert!(err.observation().unwrap().contains("node detached"));
        }

        #[tokio::test]
        async fn test_fatal_error_propagates_immediately() {
            let calls = Arc::new(AtomicUsize::new(0));
            let c = calls.clone();
            let poller = Poller::new(WaitOptions::new().with_timeout(5_000).with_poll_interval(5));
            let started = std::time::Instant::now();
            let err = poller
                .await_condition("anything", move || {
                    c.fetch_add(1, Ordering::SeqCst);
                    async { Err::<Observation, _>(SmokeError::fatal("navigation aborted")) }
                })
                .await
                .unwrap_err();
            assert!(err.is_fatal());
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert!(started.elapsed() < Duration::from_secs(1));
        }

        #[tokio::test]
        async fn test_non_transient_error_propagates() {
            let err = fast()
                .await_condition("config", || async {
                    Err::<Observation, _>(SmokeError::config("bad regex"))
                })
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "ConfigError");
        }

        #[tokio::test]
        async fn test_hanging_evaluation_is_bounded() {
            let poller = Poller::new(WaitOptions::new().with_timeout(50).with_poll_interval(10));
            let started = std::time::Instant::now();
            let err = poller
                .await_condition("hang", || async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(Observation::satisfied("never"))
                })
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "TimeoutExceeded");
            assert!(started.elapsed() < Duration::from_secs(2));
        }

        #[tokio::test]
        async fn test_zero_timeout_still_evaluates_once() {
            let poller = Poller::new(WaitOptions::new().with_timeout(0));
            let outcome = poller
                .await_condition("instant", || async { Ok(Observation::satisfied("yes")) })
                .await
                .unwrap();
            assert_eq!(outcome.polls, 1);
        }

        #[tokio::test]
        async fn test_free_function_returns_observation() {
            let obs = await_condition(
                "ok",
                || async { Ok(Observation::satisfied("visible")) },
                Duration::from_millis(100),
                Duration::from_millis(5),
            )
            .await
            .unwrap();
            assert_eq!(obs, Observation::satisfied("visible"));
        }
    }
}
