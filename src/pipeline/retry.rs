//! Retry policy for gateway calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{Backoff, RetryConfig};
use crate::error::{PipelineError, Stage, ValidationError};
use crate::ports::GatewayError;

/// Why a single attempt failed.
#[derive(Debug, Clone)]
pub enum AttemptError {
    /// The gateway call itself failed.
    Gateway(GatewayError),
    /// The gateway answered but the response did not validate.
    Invalid(ValidationError),
}

/// Bounded retry with fixed or exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub delay: Duration,
    /// Growth of the delay between retries.
    pub backoff: Backoff,
    /// Upper bound for exponential delays.
    pub max_delay: Duration,
    /// Whether schema-invalid responses count as retryable.
    pub retry_invalid: bool,
}

impl RetryPolicy {
    /// Builds a policy from configuration.
    #[must_use]
    pub fn from_config(config: &RetryConfig, retry_invalid: bool) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: Duration::from_millis(config.delay_ms),
            backoff: config.backoff,
            max_delay: Duration::from_millis(config.max_delay_ms),
            retry_invalid,
        }
    }

    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1));
                self.delay.saturating_mul(factor).min(self.max_delay)
            }
        }
    }

    fn is_retryable(&self, err: &AttemptError) -> bool {
        match err {
            AttemptError::Gateway(e) => e.is_retryable(),
            AttemptError::Invalid(_) => self.retry_invalid,
        }
    }

    /// Runs `attempt` until it succeeds, fails non-retryably, or the budget
    /// of `max_retries + 1` calls is spent.
    ///
    /// # Errors
    ///
    /// The last failure, tagged with `stage`, or [`PipelineError::Cancelled`]
    /// if `cancel` fires first.
    pub async fn run<T, F, Fut>(
        &self,
        stage: Stage,
        cancel: &CancellationToken,
        mut attempt: F,
    ) -> Result<T, PipelineError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let mut calls = 0;
        loop {
            calls += 1;
            let outcome = tokio::select! {
                () = cancel.cancelled() => return Err(PipelineError::Cancelled { stage }),
                outcome = attempt(calls) => outcome,
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if calls > self.max_retries || !self.is_retryable(&err) {
                return Err(match err {
                    AttemptError::Gateway(e) => PipelineError::gateway(stage, calls, e),
                    AttemptError::Invalid(e) => PipelineError::validation(stage, e),
                });
            }

            let delay = self.delay_for(calls);
            warn!(
                stage = %stage,
                attempt = calls,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = ?err,
                "retrying stage call"
            );
            tokio::select! {
                () = cancel.cancelled() => return Err(PipelineError::Cancelled { stage }),
                () = sleep(delay) => debug!(stage = %stage, "retry delay elapsed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            delay: Duration::from_millis(100),
            backoff: Backoff::Fixed,
            max_delay: Duration::from_secs(1),
            retry_invalid: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_stop_after_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy(3)
            .run(Stage::Analysis, &CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AttemptError::Gateway(GatewayError::Transient("503".into()))) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(matches!(
            result,
            Err(PipelineError::TransientGateway { stage: Stage::Analysis, attempts: 4, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failure() {
        let result = policy(3)
            .run(Stage::Code, &CancellationToken::new(), |n| async move {
                if n < 3 {
                    Err(AttemptError::Gateway(GatewayError::Transient("429".into())))
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_and_invalid_fail_immediately_by_default() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy(3)
            .run(Stage::Structure, &CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AttemptError::Invalid(ValidationError::structural("root", "missing"))) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(PipelineError::StructuralValidation { .. })));

        let result: Result<(), _> = policy(3)
            .run(Stage::Structure, &CancellationToken::new(), |_| async {
                Err(AttemptError::Gateway(GatewayError::Fatal("401".into())))
            })
            .await;
        assert!(matches!(result, Err(PipelineError::FatalGateway { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_responses_retry_when_enabled() {
        let retrying = RetryPolicy { retry_invalid: true, ..policy(2) };
        let calls = AtomicU32::new(0);
        let _: Result<(), _> = retrying
            .run(Stage::Architecture, &CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AttemptError::Invalid(ValidationError::referential("x", "y"))) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let result: Result<(), _> = policy(5)
            .run(Stage::Code, &cancel, |_| {
                trigger.cancel();
                async { Err(AttemptError::Gateway(GatewayError::Transient("timeout".into()))) }
            })
            .await;
        assert!(matches!(result, Err(PipelineError::Cancelled { stage: Stage::Code })));
    }

    #[test]
    fn exponential_delay_doubles_and_caps() {
        let p = RetryPolicy { backoff: Backoff::Exponential, ..policy(5) };
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(400));
        assert_eq!(p.delay_for(10), Duration::from_secs(1));
        assert_eq!(policy(5).delay_for(4), Duration::from_millis(100));
    }
}
