//! Retry strategies

use crate::types::{AttemptRecord, BackoffMode, FailureReason, OrchestratorConfig};
use std::time::Duration;
use tracing::{info, warn};

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Run another attempt after the backoff
    Retry { attempt: u32, backoff: Duration },

    /// The same reason repeated up to the cap; retrying is pointless
    SameReasonExhausted { reason: FailureReason, count: u32 },

    /// Attempt budget spent with mixed reasons
    BudgetExhausted { attempts: u32 },
}

/// Retry policy trait
pub trait RetryPolicy: Send + Sync {
    /// Decide on the next step given the failure history so far
    fn decide(&self, history: &[AttemptRecord]) -> RetryDecision;

    /// Delay before attempt number `next_attempt`
    fn calculate_backoff(&self, next_attempt: u32) -> Duration;
}

/// Default retry policy driven by `OrchestratorConfig`
#[derive(Debug, Clone)]
pub struct DefaultRetryPolicy {
    max_attempts: u32,
    same_reason_cap: u32,
    backoff_ms: u64,
    max_backoff_ms: u64,
    mode: BackoffMode,
}

impl DefaultRetryPolicy {
    pub fn new(config: &OrchestratorConfig) -> Self {
        Self {
            max_attempts: config.max_attempts_per_item.max(1),
            same_reason_cap: config.same_reason_cap().max(1),
            backoff_ms: config.attempt_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
            mode: config.backoff_mode,
        }
    }
}

/// Length of the run of identical failure reasons at the end of `history`
pub fn trailing_same_reason(history: &[AttemptRecord]) -> Option<(FailureReason, u32)> {
    let last = history.last()?.failure_reason?;
    let count = history
        .iter()
        .rev()
        .take_while(|record| record.failure_reason == Some(last))
        .count() as u32;
    Some((last, count))
}

impl RetryPolicy for DefaultRetryPolicy {
    fn decide(&self, history: &[AttemptRecord]) -> RetryDecision {
        let attempts = history.len() as u32;

        if let Some((reason, count)) = trailing_same_reason(history) {
            if count >= self.same_reason_cap {
                warn!(
                    reason = %reason,
                    count,
                    "Same failure repeated, ending deterministic retries"
                );
                return RetryDecision::SameReasonExhausted { reason, count };
            }
        }

        if attempts >= self.max_attempts {
            warn!(attempts, "Attempt budget exhausted");
            return RetryDecision::BudgetExhausted { attempts };
        }

        let backoff = self.calculate_backoff(attempts + 1);
        info!(
            next_attempt = attempts + 1,
            backoff_ms = backoff.as_millis() as u64,
            "Scheduling retry"
        );
        RetryDecision::Retry {
            attempt: attempts + 1,
            backoff,
        }
    }

    fn calculate_backoff(&self, next_attempt: u32) -> Duration {
        match self.mode {
            BackoffMode::Fixed => Duration::from_millis(self.backoff_ms.min(self.max_backoff_ms)),
            BackoffMode::Exponential => {
                // backoff_ms * 2^(retry-1), where the first retry is attempt 2
                let exponent = next_attempt.saturating_sub(2).min(32);
                let multiplier = 2u64.saturating_pow(exponent);
                let total_ms = self.backoff_ms.saturating_mul(multiplier);
                Duration::from_millis(total_ms.min(self.max_backoff_ms))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(attempt: u32, reason: FailureReason) -> AttemptRecord {
        AttemptRecord::new(attempt).fail(reason, reason.to_string(), Duration::ZERO)
    }

    fn policy(max_attempts: u32, same_reason: u32, mode: BackoffMode) -> DefaultRetryPolicy {
        DefaultRetryPolicy::new(&OrchestratorConfig {
            max_attempts_per_item: max_attempts,
            max_same_reason_failures: Some(same_reason),
            attempt_backoff_ms: 1000,
            backoff_mode: mode,
            max_backoff_ms: 5000,
            ..OrchestratorConfig::default()
        })
    }

    #[test]
    fn test_retry_until_budget() {
        let policy = policy(3, 3, BackoffMode::Fixed);
        let mut history = vec![failed(1, FailureReason::NavigationFailed)];
        assert!(matches!(
            policy.decide(&history),
            RetryDecision::Retry { attempt: 2, .. }
        ));

        history.push(failed(2, FailureReason::ElementNotFound));
        history.push(failed(3, FailureReason::ModalStuck));
        assert_eq!(
            policy.decide(&history),
            RetryDecision::BudgetExhausted { attempts: 3 }
        );
    }

    #[test]
    fn test_same_reason_cap() {
        let policy = policy(5, 2, BackoffMode::Fixed);
        let history = vec![
            failed(1, FailureReason::ModalStuck),
            failed(2, FailureReason::SilentFailure),
            failed(3, FailureReason::SilentFailure),
        ];
        assert_eq!(
            policy.decide(&history),
            RetryDecision::SameReasonExhausted {
                reason: FailureReason::SilentFailure,
                count: 2
            }
        );
    }

    #[test]
    fn test_single_attempt_goes_straight_to_cap() {
        let policy = policy(1, 2, BackoffMode::Fixed);
        let history = vec![failed(1, FailureReason::SilentFailure)];
        assert!(matches!(
            policy.decide(&history),
            RetryDecision::SameReasonExhausted { count: 1, .. }
        ));
    }

    #[test]
    fn test_calculate_backoff() {
        let fixed = policy(5, 5, BackoffMode::Fixed);
        assert_eq!(fixed.calculate_backoff(2).as_millis(), 1000);
        assert_eq!(fixed.calculate_backoff(4).as_millis(), 1000);

        let exponential = policy(10, 10, BackoffMode::Exponential);
        assert_eq!(exponential.calculate_backoff(2).as_millis(), 1000);
        assert_eq!(exponential.calculate_backoff(3).as_millis(), 2000);
        assert_eq!(exponential.calculate_backoff(4).as_millis(), 4000);

        // Capped at max_backoff_ms
        assert_eq!(exponential.calculate_backoff(9).as_millis(), 5000);
    }
}
