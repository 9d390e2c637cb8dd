//! Core contracts for the metricflow pipeline.
//!
//! This crate provides minimal abstractions without runtime dependencies.
//! The runtime crate (`metricflow`) implements the activities, the
//! instrumentation layer and an in-process engine on top of these contracts.
//!
//! # Core Types
//!
//! - [`FetchResult`] - The payload flowing through the pipeline stages
//! - [`FetchActivity`], [`TransformActivity`], [`SaveActivity`] - The three
//!   stage contracts, bundled by [`ActivitySet`]
//! - [`RetryPolicy`] - Declarative retry/backoff configuration consumed by
//!   the durable-execution engine
//! - [`ActivityError`], [`PipelineError`], [`EngineError`] - Error taxonomy
//! - [`WorkerHealthState`] - Readiness/liveness state gating new work
//!
//! # Engine Boundary
//!
//! The durable-execution engine is an external collaborator. Its surface is
//! captured by the capability traits in [`engine`]: [`EngineConnector`],
//! [`EngineConnection`], [`EngineWorker`] and [`WorkflowHandle`]. The
//! orchestration logic and its tests depend only on these traits, never on a
//! concrete engine.

mod activity;
mod engine;
mod error;
mod health;
mod payload;
mod retry;

pub use activity::{
    ActivityName, ActivitySet, FetchActivity, SaveActivity, TransformActivity, FETCH_ACTIVITY,
    SAVE_ACTIVITY, TRANSFORM_ACTIVITY,
};
pub use engine::{
    EngineConnection, EngineConnector, EngineWorker, StartOptions, WorkflowHandle,
    DEMO_TASK_QUEUE, PIPELINE_WORKFLOW,
};
pub use error::{ActivityError, EngineError, PipelineError};
pub use health::{WorkerHealth, WorkerHealthState};
pub use payload::FetchResult;
pub use retry::{RetryPolicy, RetryPolicyError};
