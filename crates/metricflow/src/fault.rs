//! Injectable fault strategy for the fetch stage.
//!
//! Failure injection is a capability handed to the activity at construction,
//! so tests control it deterministically instead of poking hidden mutable
//! state.

use metricflow_core::ActivityError;
use std::sync::atomic::{AtomicU32, Ordering};

/// Decides, per invocation, whether the fetch stage should fail.
pub trait FaultPlan: Send + Sync {
    /// Consulted once per invocation; `Some` makes that invocation fail.
    fn next_fault(&self) -> Option<ActivityError>;
}

/// Never injects a fault.
#[derive(Debug, Default)]
pub struct NoFaults;

impl FaultPlan for NoFaults {
    fn next_fault(&self) -> Option<ActivityError> {
        None
    }
}

/// Fails the first `n` invocations with a transient error, then succeeds.
///
/// # Examples
///
/// ```
/// use metricflow::fault::{FailFirst, FaultPlan};
///
/// let plan = FailFirst::new(1);
/// assert!(plan.next_fault().is_some());
/// assert!(plan.next_fault().is_none());
/// ```
#[derive(Debug)]
pub struct FailFirst {
    remaining: AtomicU32,
}

impl FailFirst {
    /// A plan that fails the first `n` invocations.
    pub fn new(n: u32) -> Self {
        Self {
            remaining: AtomicU32::new(n),
        }
    }
}

impl FaultPlan for FailFirst {
    fn next_fault(&self) -> Option<ActivityError> {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .ok()
            .map(|_| ActivityError::transient("simulated transient API failure"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_faults() {
        let plan = NoFaults;
        assert!(plan.next_fault().is_none());
        assert!(plan.next_fault().is_none());
    }

    #[test]
    fn test_fail_first_exhausts() {
        let plan = FailFirst::new(2);
        assert!(plan.next_fault().is_some());
        assert!(plan.next_fault().is_some());
        assert!(plan.next_fault().is_none());
        assert!(plan.next_fault().is_none());
    }

    #[test]
    fn test_injected_fault_is_transient() {
        let plan = FailFirst::new(1);
        let fault = plan.next_fault().expect("fault injected");
        assert!(fault.is_retryable());
        assert_eq!(fault.retry_reason(), "transient");
    }
}
