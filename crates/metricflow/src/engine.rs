//! In-process durable-execution engine.
//!
//! [`LocalEngine`] implements the core engine capability traits for a single
//! process: workflows run as tokio tasks, retries are driven by the
//! configured [`RetryPolicy`], and dispatch is gated on the registered
//! worker's health. It stands in for the external engine in demos and tests;
//! nothing outside this module depends on it being local.

use crate::instrument::instrument_set;
use crate::metrics::MetricsRegistry;
use crate::pipeline::PipelineOrchestrator;
use async_trait::async_trait;
use metricflow_core::{
    ActivityError, ActivityName, ActivitySet, EngineConnection, EngineConnector, EngineError,
    EngineWorker, PipelineError, RetryPolicy, StartOptions, WorkerHealthState, WorkflowHandle,
    PIPELINE_WORKFLOW,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::{oneshot, Notify};
use tracing::{debug, info, warn};

/// Invokes one activity under the retry policy until it succeeds or fails
/// terminally.
///
/// Retryable failures are re-invoked after the policy's backoff for the
/// failed attempt; a permanent failure or an exhausted policy surfaces as
/// the stage's terminal error.
pub(crate) async fn execute_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    activity: &ActivityName,
    mut invoke: F,
) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<T, ActivityError>> + Send,
{
    let mut attempt = 1u32;
    loop {
        match invoke().await {
            Ok(value) => {
                debug!(activity = %activity, attempt, "activity completed");
                return Ok(value);
            }
            Err(error) if error.is_retryable() && policy.allows_retry(attempt) => {
                let backoff = policy.backoff_for_attempt(attempt);
                warn!(
                    activity = %activity,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "activity failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(error) if error.is_retryable() => {
                return Err(PipelineError::PolicyExhausted {
                    activity: activity.clone(),
                    attempts: attempt,
                    details: error.to_string(),
                });
            }
            Err(error) => {
                return Err(PipelineError::ActivityFailed {
                    activity: activity.clone(),
                    details: error.to_string(),
                });
            }
        }
    }
}

#[derive(Clone)]
struct Registration {
    activities: ActivitySet,
    health: Arc<WorkerHealthState>,
}

struct Shared {
    metrics: Arc<MetricsRegistry>,
    queues: Mutex<HashMap<String, Registration>>,
}

impl Shared {
    fn registration(&self, task_queue: &str) -> Option<Registration> {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(task_queue)
            .cloned()
    }
}

/// Single-process engine driving workflows on the tokio runtime.
#[derive(Clone)]
pub struct LocalEngine {
    shared: Arc<Shared>,
}

impl LocalEngine {
    /// Creates an engine emitting into the given registry.
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            shared: Arc::new(Shared {
                metrics,
                queues: Mutex::new(HashMap::new()),
            }),
        }
    }
}

#[async_trait]
impl EngineConnector for LocalEngine {
    async fn connect(&self, address: &str) -> Result<Box<dyn EngineConnection>, EngineError> {
        debug!(address, "connected to in-process engine");
        Ok(Box::new(LocalConnection {
            shared: self.shared.clone(),
        }))
    }
}

struct LocalConnection {
    shared: Arc<Shared>,
}

#[async_trait]
impl EngineConnection for LocalConnection {
    async fn register(
        &self,
        task_queue: &str,
        activities: ActivitySet,
        health: Arc<WorkerHealthState>,
    ) -> Result<Box<dyn EngineWorker>, EngineError> {
        let mut queues = self
            .shared
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if queues.contains_key(task_queue) {
            return Err(EngineError::Registration {
                task_queue: task_queue.to_string(),
                details: "task queue already has a registered worker".to_string(),
            });
        }
        queues.insert(
            task_queue.to_string(),
            Registration { activities, health },
        );
        Ok(Box::new(LocalWorker {
            shared: self.shared.clone(),
            task_queue: task_queue.to_string(),
            stop: Notify::new(),
        }))
    }

    async fn start_workflow(
        &self,
        workflow: &str,
        options: StartOptions,
    ) -> Result<Box<dyn WorkflowHandle>, EngineError> {
        if workflow != PIPELINE_WORKFLOW {
            return Err(EngineError::UnknownWorkflow {
                workflow: workflow.to_string(),
            });
        }
        let registration = match self.shared.registration(&options.task_queue) {
            Some(registration) if registration.health.is_ready() => registration,
            _ => {
                return Err(EngineError::WorkerUnavailable {
                    task_queue: options.task_queue,
                })
            }
        };

        let metrics = self.shared.metrics.clone();
        let instrumented = instrument_set(
            &registration.activities,
            options.retry_policy.attempt_timeout(),
            &metrics,
        );
        let orchestrator = PipelineOrchestrator::new(instrumented, options.retry_policy.clone());
        let workflow_id = options.workflow_id.clone();
        let (sender, receiver) = oneshot::channel();

        tokio::spawn(async move {
            metrics.workflow_started(PIPELINE_WORKFLOW);
            metrics.workflow_active_inc(PIPELINE_WORKFLOW);
            let started = Instant::now();
            let result = orchestrator.run().await;
            match &result {
                Ok(_) => {
                    metrics.workflow_succeeded(PIPELINE_WORKFLOW, started.elapsed());
                    info!(workflow_id = %workflow_id, "workflow completed");
                }
                Err(error) => {
                    metrics.workflow_failed(PIPELINE_WORKFLOW);
                    warn!(workflow_id = %workflow_id, error = %error, "workflow failed");
                }
            }
            metrics.workflow_active_dec(PIPELINE_WORKFLOW);
            let _ = sender.send(result);
        });

        Ok(Box::new(LocalWorkflowHandle {
            workflow_id: options.workflow_id,
            receiver: Mutex::new(Some(receiver)),
        }))
    }
}

struct LocalWorker {
    shared: Arc<Shared>,
    task_queue: String,
    stop: Notify,
}

#[async_trait]
impl EngineWorker for LocalWorker {
    async fn run(&self) -> Result<(), EngineError> {
        info!(task_queue = %self.task_queue, "worker run loop started");
        self.stop.notified().await;
        self.shared
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.task_queue);
        info!(task_queue = %self.task_queue, "worker run loop stopped");
        Ok(())
    }

    fn shutdown(&self) {
        self.stop.notify_one();
    }
}

struct LocalWorkflowHandle {
    workflow_id: String,
    receiver: Mutex<Option<oneshot::Receiver<Result<String, PipelineError>>>>,
}

#[async_trait]
impl WorkflowHandle for LocalWorkflowHandle {
    fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    async fn result(&self) -> Result<String, PipelineError> {
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match receiver {
            Some(receiver) => match receiver.await {
                Ok(result) => result,
                Err(_) => Err(EngineError::ResultLost {
                    workflow_id: self.workflow_id.clone(),
                }
                .into()),
            },
            None => Err(EngineError::ResultLost {
                workflow_id: self.workflow_id.clone(),
            }
            .into()),
        }
    }
}
