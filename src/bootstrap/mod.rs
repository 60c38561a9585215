//! Resilient startup
//! This module drives the gateway's bootstrap: repeated attempts to acquire
//! subgraph schemas and bind the listener, with bounded retries, backoff,
//! jitter, and server-supplied retry hints
//!
//! The subsystem splits into three pieces so each is unit-testable without
//! simulating real network failures:
//! - [`classify::is_transient`]: pure failure classification
//! - [`backoff::next_delay`]: pure delay computation
//! - [`StartupOrchestrator`]: the state machine tying them together

pub mod backoff;
pub mod classify;

pub use backoff::{next_delay, parse_retry_hint, JITTER_MAX_MS};
pub use classify::is_transient;

use crate::config::RetryPolicy;
use crate::Result;
use std::future::Future;
use tracing::{info, warn};

/// Drives repeated startup attempts until one succeeds or the policy says
/// stop.
///
/// State machine: `Idle -> Attempting -> {Succeeded, Failed}`. Both
/// terminal states return out of [`StartupOrchestrator::run`]: `Succeeded`
/// yields the built gateway, `Failed` propagates the last error unchanged.
///
/// The orchestrator is intrinsically sequential: no two attempts ever run
/// concurrently, and the next attempt is scheduled only after the prior
/// failure has been fully observed and its delay has elapsed. Each failed
/// attempt's partially constructed gateway is dropped (with everything it
/// owns) before the next attempt begins, so failed attempts leak neither
/// sockets nor refresh timers.
#[derive(Debug, Clone)]
pub struct StartupOrchestrator {
    policy: RetryPolicy,
}

impl StartupOrchestrator {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run `attempt_fn` until it succeeds, fails permanently, or
    /// `max_attempts` is exhausted.
    ///
    /// `attempt_fn` receives the 1-based attempt number and performs one
    /// full initialization pass (schema acquisition, composition, listener
    /// bind). On terminal failure the last error is propagated unchanged.
    pub async fn run<T, F, Fut>(&self, mut attempt_fn: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 1;

        loop {
            info!(
                "🔄 Startup attempt {}/{}",
                attempt, self.policy.max_attempts
            );

            match attempt_fn(attempt).await {
                Ok(value) => {
                    // Terminal: Succeeded
                    info!("✅ Startup succeeded on attempt {}", attempt);
                    return Ok(value);
                }
                Err(error) => {
                    let message = error.to_string();

                    if !is_transient(&message) {
                        // Terminal: Failed (permanent)
                        warn!("⛔ Permanent startup failure: {}", message);
                        return Err(error);
                    }
                    if attempt >= self.policy.max_attempts {
                        // Terminal: Failed (retries exhausted)
                        warn!(
                            "⛔ Startup failed after {} attempts: {}",
                            attempt, message
                        );
                        return Err(error);
                    }

                    let delay = next_delay(attempt, &message, &self.policy);
                    warn!(
                        "⚠️ Transient startup failure (attempt {}/{}): {} - retrying in {}ms",
                        attempt,
                        self.policy.max_attempts,
                        message,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GatewayError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        // Millisecond delays keep the retry path honest without slowing
        // the suite down
        RetryPolicy {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 4,
        }
    }

    fn transient_error() -> GatewayError {
        GatewayError::SchemaFetch {
            name: "products".to_string(),
            detail: "connect ECONNREFUSED 127.0.0.1:4001".to_string(),
        }
    }

    #[tokio::test]
    async fn test_all_transient_failures_exhaust_exactly_max_attempts() {
        let orchestrator = StartupOrchestrator::new(fast_policy(3));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: crate::Result<()> = orchestrator
            .run(|_attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(transient_error()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_success_on_second_attempt_never_runs_a_third() {
        let orchestrator = StartupOrchestrator::new(fast_policy(3));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = orchestrator
            .run(|attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt >= 2 {
                        Ok("bound")
                    } else {
                        Err(transient_error())
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "bound");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_stops_immediately() {
        let orchestrator = StartupOrchestrator::new(fast_policy(5));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: crate::Result<()> = orchestrator
            .run(|_attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(GatewayError::Composition(
                        "duplicate type Foo".to_string(),
                    ))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match result {
            Err(GatewayError::Composition(msg)) => assert!(msg.contains("duplicate type Foo")),
            other => panic!("expected the permanent error unchanged, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_last_transient_error_is_propagated_unchanged() {
        let orchestrator = StartupOrchestrator::new(fast_policy(2));

        let result: crate::Result<()> = orchestrator
            .run(|attempt| async move {
                Err(GatewayError::SchemaFetch {
                    name: "orders".to_string(),
                    detail: format!("503 on attempt {}", attempt),
                })
            })
            .await;

        match result {
            Err(GatewayError::SchemaFetch { detail, .. }) => {
                assert_eq!(detail, "503 on attempt 2");
            }
            other => panic!("expected SchemaFetch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_single_attempt_policy_never_retries() {
        let orchestrator = StartupOrchestrator::new(fast_policy(1));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: crate::Result<()> = orchestrator
            .run(|_attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(transient_error()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
