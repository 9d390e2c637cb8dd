//! Worker lifecycle: connect, register, run, shut down.

use crate::config::WorkerConfig;
use metricflow_core::{
    ActivitySet, EngineConnection, EngineConnector, EngineError, EngineWorker, WorkerHealth,
    WorkerHealthState,
};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info};

/// Long-running worker process driving one task queue.
///
/// The worker starts `NotReady`, becomes `Ready` once the engine connection
/// and activity registration succeed, returns to `NotReady` on graceful
/// shutdown and drops to `Degraded` on an unrecoverable run-loop error.
/// Health and liveness queries are synchronous and never block on in-flight
/// activity work.
pub struct Worker {
    config: WorkerConfig,
    connector: Arc<dyn EngineConnector>,
    activities: ActivitySet,
    health: Arc<WorkerHealthState>,
    engine_worker: Mutex<Option<Arc<dyn EngineWorker>>>,
}

impl Worker {
    /// Creates a worker over the given engine connector and activity set.
    pub fn new(
        config: WorkerConfig,
        connector: Arc<dyn EngineConnector>,
        activities: ActivitySet,
    ) -> Self {
        Self {
            config,
            connector,
            activities,
            health: Arc::new(WorkerHealthState::new()),
            engine_worker: Mutex::new(None),
        }
    }

    /// Current readiness.
    pub fn health(&self) -> WorkerHealth {
        self.health.health()
    }

    /// Whether the run loop is active.
    pub fn is_live(&self) -> bool {
        self.health.is_live()
    }

    /// Shared handle to the health state.
    pub fn health_state(&self) -> Arc<WorkerHealthState> {
        self.health.clone()
    }

    /// Connects, registers and runs until shutdown or a fatal error.
    pub async fn run(&self) -> Result<(), EngineError> {
        let connection = self
            .connector
            .connect(&self.config.engine_address)
            .await
            .map_err(|err| {
                // connection never succeeded: the worker stays NotReady
                error!(
                    engine_address = %self.config.engine_address,
                    error = %err,
                    "failed to connect to engine"
                );
                err
            })?;

        let engine_worker: Arc<dyn EngineWorker> = Arc::from(
            connection
                .register(
                    &self.config.task_queue,
                    self.activities.clone(),
                    self.health.clone(),
                )
                .await?,
        );
        *self
            .engine_worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(engine_worker.clone());

        self.health.mark_ready();
        info!(
            task_queue = %self.config.task_queue,
            engine_address = %self.config.engine_address,
            "worker registered and ready"
        );

        match engine_worker.run().await {
            Ok(()) => {
                self.health.mark_stopped();
                info!("worker stopped");
                Ok(())
            }
            Err(err) => {
                self.health.mark_degraded();
                error!(error = %err, "worker run loop failed");
                Err(err)
            }
        }
    }

    /// Requests a graceful stop of the run loop.
    pub fn shutdown(&self) {
        let engine_worker = self
            .engine_worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(engine_worker) = engine_worker {
            engine_worker.shutdown();
        }
    }
}
