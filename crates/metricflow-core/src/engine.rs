//! Capability traits onto the external durable-execution engine.
//!
//! The engine persists workflow progress, replays history and drives
//! retries; none of that is implemented here. These traits are the surface
//! the pipeline consumes, so the orchestration logic and its tests work
//! against any engine implementation, including an in-process test double.

use crate::activity::ActivitySet;
use crate::error::{EngineError, PipelineError};
use crate::health::WorkerHealthState;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::sync::Arc;

/// Registration identifier of the pipeline workflow.
pub const PIPELINE_WORKFLOW: &str = "fetchTransformSaveWorkflow";
/// The task queue the worker and the workflow are keyed to.
pub const DEMO_TASK_QUEUE: &str = "demo-task-queue";

/// Options for starting one workflow instance.
#[derive(Debug, Clone)]
pub struct StartOptions {
    /// Task queue the workflow's activities are dispatched to.
    pub task_queue: String,
    /// Unique identifier of this workflow instance.
    pub workflow_id: String,
    /// Retry policy applied to every activity invocation of the run.
    pub retry_policy: RetryPolicy,
}

impl StartOptions {
    /// Options targeting [`DEMO_TASK_QUEUE`] with the default retry policy.
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            task_queue: DEMO_TASK_QUEUE.to_string(),
            workflow_id: workflow_id.into(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Replaces the task queue.
    pub fn with_task_queue(mut self, task_queue: impl Into<String>) -> Self {
        self.task_queue = task_queue.into();
        self
    }
}

/// Dials the engine.
#[async_trait]
pub trait EngineConnector: Send + Sync {
    /// Connects to the engine at `address`.
    async fn connect(&self, address: &str) -> Result<Box<dyn EngineConnection>, EngineError>;
}

/// An established engine connection.
#[async_trait]
pub trait EngineConnection: Send + Sync {
    /// Registers the activity set on a task queue, handing the engine the
    /// worker's readiness gate to consult before dispatching work.
    async fn register(
        &self,
        task_queue: &str,
        activities: ActivitySet,
        health: Arc<WorkerHealthState>,
    ) -> Result<Box<dyn EngineWorker>, EngineError>;

    /// Starts one workflow instance and returns a handle to its result.
    async fn start_workflow(
        &self,
        workflow: &str,
        options: StartOptions,
    ) -> Result<Box<dyn WorkflowHandle>, EngineError>;
}

/// A registered worker's run loop.
#[async_trait]
pub trait EngineWorker: Send + Sync {
    /// Runs until shutdown is requested or a fatal error occurs.
    async fn run(&self) -> Result<(), EngineError>;

    /// Requests a graceful stop of the run loop.
    fn shutdown(&self);
}

/// Handle to a started workflow instance.
#[async_trait]
pub trait WorkflowHandle: Send + Sync {
    /// The workflow instance identifier.
    fn workflow_id(&self) -> &str;

    /// Awaits the terminal value of the run. May be awaited once.
    async fn result(&self) -> Result<String, PipelineError>;
}
