//! Declarative retry policy applied per activity invocation.

use std::time::Duration;

/// Error returned when [`RetryPolicy`] configuration is invalid.
///
/// # Examples
///
/// ```
/// use metricflow_core::RetryPolicy;
/// use std::time::Duration;
///
/// // Invalid: zero attempts would never invoke the activity
/// let result = RetryPolicy::new(
///     0,
///     Duration::from_secs(2),
///     2,
///     Duration::from_secs(30),
///     Duration::from_secs(60),
/// );
/// assert!(result.is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicyError(pub &'static str);

impl std::fmt::Display for RetryPolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for RetryPolicyError {}

/// Retry parameters for one activity invocation.
///
/// The policy is advisory configuration consumed by the durable-execution
/// engine: on a retryable failure the engine re-invokes the same activity
/// after the computed backoff. The backoff after attempt *n* (1-indexed) is
/// `min(initial_interval * backoff_coefficient^(n-1), maximum_interval)`.
/// Attempts beyond `maximum_attempts` are not retried and the invocation
/// fails terminally.
///
/// # Examples
///
/// ```
/// use metricflow_core::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.maximum_attempts(), 3);
/// assert_eq!(policy.backoff_for_attempt(1), Duration::from_secs(2));
/// assert_eq!(policy.backoff_for_attempt(2), Duration::from_secs(4));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    maximum_attempts: u32,
    initial_interval: Duration,
    backoff_coefficient: u32,
    maximum_interval: Duration,
    attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Creates a validated retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`RetryPolicyError`] if:
    /// - `maximum_attempts` is 0 (the first attempt counts as attempt 1)
    /// - `backoff_coefficient` is 0 (would shrink the backoff to nothing)
    /// - `backoff_coefficient` is greater than 10 (risk of overflow)
    /// - `maximum_interval` is less than `initial_interval`
    pub fn new(
        maximum_attempts: u32,
        initial_interval: Duration,
        backoff_coefficient: u32,
        maximum_interval: Duration,
        attempt_timeout: Duration,
    ) -> Result<Self, RetryPolicyError> {
        if maximum_attempts == 0 {
            return Err(RetryPolicyError("maximum_attempts must be at least 1"));
        }
        if backoff_coefficient == 0 {
            return Err(RetryPolicyError(
                "backoff_coefficient must be greater than 0",
            ));
        }
        if backoff_coefficient > 10 {
            return Err(RetryPolicyError(
                "backoff_coefficient must be 10 or less to avoid overflow",
            ));
        }
        if maximum_interval < initial_interval {
            return Err(RetryPolicyError(
                "maximum_interval must be >= initial_interval",
            ));
        }
        Ok(Self {
            maximum_attempts,
            initial_interval,
            backoff_coefficient,
            maximum_interval,
            attempt_timeout,
        })
    }

    /// Returns the maximum number of attempts, including the first.
    pub fn maximum_attempts(&self) -> u32 {
        self.maximum_attempts
    }

    /// Returns the per-attempt timeout.
    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Returns `true` if another attempt is allowed after `attempts_used`
    /// attempts have already failed.
    pub fn allows_retry(&self, attempts_used: u32) -> bool {
        attempts_used < self.maximum_attempts
    }

    /// Calculates the backoff to wait after the given attempt.
    ///
    /// Attempts are 1-indexed: `backoff_for_attempt(1)` is the delay between
    /// the first failure and the second attempt.
    ///
    /// # Examples
    ///
    /// ```
    /// use metricflow_core::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::new(
    ///     5,
    ///     Duration::from_secs(2),
    ///     2,
    ///     Duration::from_secs(30),
    ///     Duration::from_secs(60),
    /// )?;
    ///
    /// // Delays: 2s, 4s, 8s, 16s, then capped at 30s
    /// assert_eq!(policy.backoff_for_attempt(4), Duration::from_secs(16));
    /// assert_eq!(policy.backoff_for_attempt(5), Duration::from_secs(30));
    /// # Ok::<(), metricflow_core::RetryPolicyError>(())
    /// ```
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let initial = self.initial_interval.as_millis() as u64;
        let millis = match (self.backoff_coefficient as u64).checked_pow(exponent) {
            Some(factor) => initial.saturating_mul(factor),
            None => u64::MAX,
        };
        Duration::from_millis(millis.min(self.maximum_interval.as_millis() as u64))
    }
}

impl Default for RetryPolicy {
    /// The pipeline's standard policy: 3 attempts, 2s initial backoff
    /// doubling up to 30s, 60s per-attempt timeout.
    fn default() -> Self {
        Self {
            maximum_attempts: 3,
            initial_interval: Duration::from_secs(2),
            backoff_coefficient: 2,
            maximum_interval: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(60),
        }
    }
}
