//! Pipeline orchestration: deterministic fetch→transform→save sequencing.

use crate::engine::execute_with_retry;
use metricflow_core::{
    ActivityName, ActivitySet, FetchActivity, PipelineError, RetryPolicy, SaveActivity,
    TransformActivity,
};
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// Terminal marker returned by a completed pipeline run.
pub const TERMINAL_SUCCESS: &str = "done";

/// Progress of one orchestration instance.
///
/// Advances `Idle → Fetching → Transforming → Saving → Completed`;
/// `Failed` absorbs from any non-terminal state once a stage's retries are
/// exhausted or it fails permanently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Not started.
    Idle,
    /// The fetch stage is in flight.
    Fetching,
    /// The transform stage is in flight.
    Transforming,
    /// The save stage is in flight.
    Saving,
    /// All stages completed.
    Completed,
    /// A stage failed terminally.
    Failed,
}

/// Sequences the three stages of one workflow instance.
///
/// The orchestration logic is replay-safe: it reads no wall clock and draws
/// no randomness; stage results flow unchanged into the next stage. Failed
/// stages are not compensated, there is nothing to roll back.
pub struct PipelineOrchestrator {
    activities: ActivitySet,
    policy: RetryPolicy,
    state: Mutex<PipelineState>,
}

impl PipelineOrchestrator {
    /// Creates an idle orchestrator over the given activities and policy.
    pub fn new(activities: ActivitySet, policy: RetryPolicy) -> Self {
        Self {
            activities,
            policy,
            state: Mutex::new(PipelineState::Idle),
        }
    }

    /// Returns the current pipeline state.
    pub fn state(&self) -> PipelineState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn advance(&self, next: PipelineState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Runs the pipeline to its terminal state.
    ///
    /// Returns [`TERMINAL_SUCCESS`] once the save stage completes; surfaces
    /// the failing stage's terminal error otherwise.
    pub async fn run(&self) -> Result<String, PipelineError> {
        match self.run_stages().await {
            Ok(done) => {
                self.advance(PipelineState::Completed);
                info!("pipeline completed");
                Ok(done)
            }
            Err(error) => {
                self.advance(PipelineState::Failed);
                Err(error)
            }
        }
    }

    async fn run_stages(&self) -> Result<String, PipelineError> {
        self.advance(PipelineState::Fetching);
        let fetch = self.activities.fetch.clone();
        let data = execute_with_retry(&self.policy, &ActivityName::fetch(), || {
            let fetch = fetch.clone();
            async move { fetch.fetch().await }
        })
        .await?;

        self.advance(PipelineState::Transforming);
        let transform = self.activities.transform.clone();
        let transformed = execute_with_retry(&self.policy, &ActivityName::transform(), || {
            let transform = transform.clone();
            let input = data.clone();
            async move { transform.transform(input).await }
        })
        .await?;

        self.advance(PipelineState::Saving);
        let save = self.activities.save.clone();
        execute_with_retry(&self.policy, &ActivityName::save(), || {
            let save = save.clone();
            let input = transformed.clone();
            async move { save.save(input).await }
        })
        .await?;

        Ok(TERMINAL_SUCCESS.to_string())
    }
}
