//! Metricflow worker binary.
//!
//! Runs a worker against the in-process engine, starts one demonstration
//! workflow (with a single injected transient failure to exercise the retry
//! path), prints the metrics exposition and waits for ctrl-c.

use metricflow::activities;
use metricflow::clock::{Clock, SystemClock};
use metricflow::fault::FailFirst;
use metricflow::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,metricflow=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    tracing::info!(
        engine_address = %config.engine_address,
        task_queue = %config.task_queue,
        "starting metricflow worker"
    );

    let metrics = Arc::new(MetricsRegistry::new());
    let engine = LocalEngine::new(metrics.clone());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(ShardedStore::new());

    // fail the first fetch so the demo run shows a retried transient failure
    let activities = activities::standard_set(
        clock.clone(),
        Arc::new(FailFirst::new(1)),
        store.clone(),
    );

    let worker = Arc::new(Worker::new(
        config.clone(),
        Arc::new(engine.clone()),
        activities,
    ));
    let worker_task = tokio::spawn({
        let worker = worker.clone();
        async move { worker.run().await }
    });

    while worker.health() != WorkerHealth::Ready {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let connection = engine.connect(&config.engine_address).await?;
    let workflow_id = format!("workflow-{}", clock.now_millis());
    let handle = connection
        .start_workflow(PIPELINE_WORKFLOW, StartOptions::new(workflow_id))
        .await?;
    tracing::info!(workflow_id = %handle.workflow_id(), "workflow started");

    match handle.result().await {
        Ok(result) => tracing::info!(
            result = %result,
            records = store.len(),
            "workflow completed"
        ),
        Err(error) => tracing::error!(error = %error, "workflow failed"),
    }
    println!("{}", metrics.render());

    tracing::info!("worker running, press ctrl-c to stop");
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "failed to install shutdown handler");
    }
    tracing::info!("shutdown signal received");
    worker.shutdown();
    let _ = worker_task.await;
    tracing::info!("worker stopped");
    Ok(())
}
