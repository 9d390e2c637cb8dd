//! Fault injection: watch the retry policy absorb transient failures.
//!
//! The fetch stage is wired with a plan that fails its first two
//! invocations. With three attempts allowed, the pipeline still completes;
//! the printed metrics show the failed attempts and the tagged retries.
//!
//! ```sh
//! cargo run --example fault_injection
//! ```

use metricflow::activities;
use metricflow::clock::SystemClock;
use metricflow::fault::FailFirst;
use metricflow::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    tracing_subscriber::fmt()
        .with_env_filter("info,metricflow=debug")
        .init();

    let metrics = Arc::new(MetricsRegistry::new());
    let engine = LocalEngine::new(metrics.clone());
    let store = Arc::new(ShardedStore::new());
    let activities = activities::standard_set(
        Arc::new(SystemClock),
        Arc::new(FailFirst::new(2)),
        store.clone(),
    );

    let worker = Arc::new(Worker::new(
        WorkerConfig::default(),
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

    // short backoffs keep the demo snappy
    let policy = RetryPolicy::new(
        3,
        Duration::from_millis(100),
        2,
        Duration::from_secs(1),
        Duration::from_secs(10),
    )
    .expect("valid policy");

    let connection = engine.connect("localhost:7233").await?;
    let handle = connection
        .start_workflow(
            PIPELINE_WORKFLOW,
            StartOptions::new("workflow-fault-demo").with_retry_policy(policy),
        )
        .await?;

    match handle.result().await {
        Ok(result) => println!("pipeline result: {result}, {} record(s) stored", store.len()),
        Err(error) => println!("pipeline failed: {error}"),
    }
    println!("{}", metrics.render());

    worker.shutdown();
    let _ = worker_task.await;
    Ok(())
}
