//! Durable fetch→transform→save pipeline worker.
//!
//! The pipeline runs three activities in sequence on top of a
//! durable-execution engine: fetch a payload, derive a transformed value
//! from it, persist the result. Every activity invocation is retried under
//! a declarative [`RetryPolicy`], wrapped in a metrics observation boundary,
//! and dispatched only while the worker reports itself ready.
//!
//! # Example
//!
//! ```rust,no_run
//! use metricflow::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), EngineError> {
//!     let metrics = Arc::new(MetricsRegistry::new());
//!     let engine = LocalEngine::new(metrics.clone());
//!
//!     let activities = metricflow::activities::standard_set(
//!         Arc::new(SystemClock),
//!         Arc::new(NoFaults),
//!         Arc::new(ShardedStore::new()),
//!     );
//!     let worker = Arc::new(Worker::new(
//!         WorkerConfig::default(),
//!         Arc::new(engine.clone()),
//!         activities,
//!     ));
//!     tokio::spawn({
//!         let worker = worker.clone();
//!         async move { worker.run().await }
//!     });
//!
//!     // ... wait for readiness, then start workflows through the engine
//!     Ok(())
//! }
//! ```

pub mod activities;
pub mod clock;
pub mod config;
pub mod engine;
pub mod fault;
pub mod instrument;
pub mod metrics;
pub mod pipeline;
pub mod store;
pub mod worker;

// Re-export core contracts
pub use metricflow_core::*;

pub use config::WorkerConfig;
pub use engine::LocalEngine;
pub use metrics::MetricsRegistry;
pub use pipeline::{PipelineOrchestrator, PipelineState, TERMINAL_SUCCESS};
pub use worker::Worker;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::fault::{FailFirst, FaultPlan, NoFaults};
    pub use crate::store::ShardedStore;
    pub use crate::{
        ActivityError, ActivityName, ActivitySet, EngineConnection, EngineConnector, EngineError,
        FetchResult, LocalEngine, MetricsRegistry, PipelineError, PipelineOrchestrator,
        PipelineState, RetryPolicy, StartOptions, Worker, WorkerConfig, WorkerHealth,
        WorkerHealthState, WorkflowHandle, DEMO_TASK_QUEUE, PIPELINE_WORKFLOW, TERMINAL_SUCCESS,
    };
}
