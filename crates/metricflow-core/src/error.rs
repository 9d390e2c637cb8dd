//! Error taxonomy for activities, the pipeline and the engine boundary.

use crate::activity::ActivityName;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single activity attempt.
///
/// Transient failures and timeouts are retryable under the configured
/// [`RetryPolicy`](crate::RetryPolicy); permanent failures are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActivityError {
    /// An explicitly retryable failure (network blip, simulated outage).
    #[error("transient failure: {details}")]
    Transient {
        /// Details about the failure.
        details: String,
    },

    /// A non-retryable failure (malformed input, logic error).
    #[error("permanent failure: {details}")]
    Permanent {
        /// Details about the failure.
        details: String,
    },

    /// The attempt exceeded its per-attempt timeout. Treated as retryable.
    #[error("attempt exceeded its {timeout:?} timeout")]
    Timeout {
        /// The per-attempt timeout that was exceeded.
        timeout: Duration,
    },
}

impl ActivityError {
    /// Creates a transient (retryable) failure.
    pub fn transient(details: impl Into<String>) -> Self {
        Self::Transient {
            details: details.into(),
        }
    }

    /// Creates a permanent (non-retryable) failure.
    pub fn permanent(details: impl Into<String>) -> Self {
        Self::Permanent {
            details: details.into(),
        }
    }

    /// Returns `true` if the engine may re-invoke the activity.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent { .. })
    }

    /// The retry reason tag recorded by the instrumentation layer.
    pub fn retry_reason(&self) -> &'static str {
        match self {
            Self::Transient { .. } => "transient",
            Self::Permanent { .. } => "permanent",
            Self::Timeout { .. } => "timeout",
        }
    }
}

/// Terminal failure of one pipeline run.
///
/// Carries the failing stage and whether its retries were exhausted, so the
/// invoking client sees a structured failure rather than a bare message.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PipelineError {
    /// A stage kept failing retryably until the policy was used up.
    #[error("activity '{activity}' exhausted its retry policy after {attempts} attempts: {details}")]
    PolicyExhausted {
        /// The stage whose retries ran out.
        activity: ActivityName,
        /// How many attempts were made.
        attempts: u32,
        /// Details of the final failure.
        details: String,
    },

    /// A stage failed with a non-retryable error.
    #[error("activity '{activity}' failed permanently: {details}")]
    ActivityFailed {
        /// The stage that failed.
        activity: ActivityName,
        /// Details about the failure.
        details: String,
    },

    /// The engine boundary failed before or during the run.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl PipelineError {
    /// Returns the failing stage, if the failure is attributable to one.
    pub fn failing_activity(&self) -> Option<&ActivityName> {
        match self {
            Self::PolicyExhausted { activity, .. } | Self::ActivityFailed { activity, .. } => {
                Some(activity)
            }
            Self::Engine(_) => None,
        }
    }

    /// Returns `true` if the failure came from an exhausted retry policy.
    pub fn retries_exhausted(&self) -> bool {
        matches!(self, Self::PolicyExhausted { .. })
    }
}

/// Failure at the durable-execution engine boundary.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EngineError {
    /// Connecting to the engine failed.
    #[error("failed to connect to engine at '{address}': {details}")]
    Connection {
        /// The engine address that was dialed.
        address: String,
        /// Details about the failure.
        details: String,
    },

    /// Registering the worker on its task queue failed.
    #[error("failed to register on task queue '{task_queue}': {details}")]
    Registration {
        /// The task queue the worker tried to register on.
        task_queue: String,
        /// Details about the failure.
        details: String,
    },

    /// No ready worker is registered for the task queue.
    #[error("no ready worker on task queue '{task_queue}'")]
    WorkerUnavailable {
        /// The task queue the dispatch targeted.
        task_queue: String,
    },

    /// The requested workflow is not registered with the engine.
    #[error("unknown workflow '{workflow}'")]
    UnknownWorkflow {
        /// The requested workflow name.
        workflow: String,
    },

    /// The workflow's terminal result was lost before it could be observed.
    #[error("result of workflow '{workflow_id}' was lost before completion")]
    ResultLost {
        /// The workflow instance identifier.
        workflow_id: String,
    },

    /// The worker run loop failed unrecoverably.
    #[error("worker run loop failed: {details}")]
    RunLoop {
        /// Details about the failure.
        details: String,
    },
}
