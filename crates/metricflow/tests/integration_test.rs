use metricflow::activities::{self, TRANSFORMED_AT, TRANSFORMED_PROP};
use metricflow::clock::ManualClock;
use metricflow::fault::{FailFirst, FaultPlan, NoFaults};
use metricflow::metrics::{STATUS_FAILED, STATUS_STARTED, STATUS_SUCCEEDED};
use metricflow::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const EPOCH: u64 = 1_700_000_000_000;

struct Harness {
    engine: LocalEngine,
    metrics: Arc<MetricsRegistry>,
    store: Arc<ShardedStore>,
    clock: Arc<ManualClock>,
    worker: Arc<Worker>,
    worker_task: tokio::task::JoinHandle<Result<(), EngineError>>,
}

impl Harness {
    /// Spins up an engine and a worker, and waits until the worker is ready.
    async fn start(faults: Arc<dyn FaultPlan>) -> Self {
        let metrics = Arc::new(MetricsRegistry::new());
        let engine = LocalEngine::new(metrics.clone());
        let store = Arc::new(ShardedStore::new());
        let clock = Arc::new(ManualClock::new(EPOCH));
        let activities = activities::standard_set(clock.clone(), faults, store.clone());

        let worker = Arc::new(Worker::new(
            WorkerConfig::default(),
            Arc::new(engine.clone()),
            activities,
        ));
        let worker_task = tokio::spawn({
            let worker = worker.clone();
            async move { worker.run().await }
        });
        for _ in 0..500 {
            if worker.health() == WorkerHealth::Ready {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(worker.health(), WorkerHealth::Ready);

        Self {
            engine,
            metrics,
            store,
            clock,
            worker,
            worker_task,
        }
    }

    async fn start_pipeline(&self, workflow_id: &str) -> Result<String, PipelineError> {
        let connection = self
            .engine
            .connect("localhost:7233")
            .await
            .expect("local connect");
        let options = StartOptions::new(workflow_id).with_retry_policy(fast_policy(3));
        let handle = connection
            .start_workflow(PIPELINE_WORKFLOW, options)
            .await?;
        handle.result().await
    }

    async fn stop(self) {
        self.worker.shutdown();
        let result = self.worker_task.await.expect("worker task joins");
        assert!(result.is_ok());
        assert_eq!(self.worker.health(), WorkerHealth::NotReady);
    }

    fn assert_started_counts_are_terminal(&self) {
        for activity in ["fetchActivity", "transformActivity", "saveActivity"] {
            let started = self.metrics.activity_executions(activity, STATUS_STARTED);
            let terminal = self.metrics.activity_executions(activity, STATUS_SUCCEEDED)
                + self.metrics.activity_executions(activity, STATUS_FAILED);
            assert_eq!(started, terminal, "dangling in-flight count for {activity}");
        }
    }
}

fn fast_policy(attempts: u32) -> RetryPolicy {
    RetryPolicy::new(
        attempts,
        Duration::from_millis(2),
        2,
        Duration::from_millis(16),
        Duration::from_secs(5),
    )
    .expect("valid policy")
}

#[tokio::test]
async fn test_pipeline_end_to_end() {
    let harness = Harness::start(Arc::new(NoFaults)).await;

    let result = harness
        .start_pipeline("workflow-1")
        .await
        .expect("pipeline completes");
    assert_eq!(result, TERMINAL_SUCCESS);

    // one record, holding the transformed payload
    let records = harness.store.records();
    assert_eq!(records.len(), 1);
    let (_, value) = &records[0];
    assert_eq!(value["name"], "Tani");
    assert_eq!(value["timestamp"], EPOCH);
    assert!(value[TRANSFORMED_AT].as_u64().expect("timestamp field") >= EPOCH);

    let original = json!({"name": "Tani", "timestamp": EPOCH});
    let rendered = serde_json::to_string(&original).expect("renderable");
    let marker = value[TRANSFORMED_PROP].as_str().expect("marker field");
    assert_eq!(marker, format!("New ({rendered})"));

    // every stage ran exactly once and the workflow terminated cleanly
    for activity in ["fetchActivity", "transformActivity", "saveActivity"] {
        assert_eq!(
            harness.metrics.activity_executions(activity, STATUS_SUCCEEDED),
            1
        );
        assert_eq!(harness.metrics.activity_duration_count(activity), 1);
    }
    assert_eq!(
        harness
            .metrics
            .workflow_executions(PIPELINE_WORKFLOW, STATUS_SUCCEEDED),
        1
    );
    assert_eq!(harness.metrics.workflow_duration_count(PIPELINE_WORKFLOW), 1);
    assert_eq!(harness.metrics.active_workflows(PIPELINE_WORKFLOW), 0);
    harness.assert_started_counts_are_terminal();

    harness.stop().await;
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let harness = Harness::start(Arc::new(FailFirst::new(1))).await;

    let result = harness
        .start_pipeline("workflow-retry")
        .await
        .expect("pipeline recovers");
    assert_eq!(result, TERMINAL_SUCCESS);

    assert_eq!(
        harness
            .metrics
            .activity_executions("fetchActivity", STATUS_STARTED),
        2
    );
    assert_eq!(
        harness
            .metrics
            .activity_executions("fetchActivity", STATUS_FAILED),
        1
    );
    assert_eq!(
        harness
            .metrics
            .activity_executions("fetchActivity", STATUS_SUCCEEDED),
        1
    );
    assert_eq!(
        harness.metrics.activity_retries("fetchActivity", "transient"),
        1
    );
    harness.assert_started_counts_are_terminal();

    harness.stop().await;
}

#[tokio::test]
async fn test_exhausted_retries_fail_the_pipeline() {
    let harness = Harness::start(Arc::new(FailFirst::new(5))).await;

    let error = harness
        .start_pipeline("workflow-exhausted")
        .await
        .unwrap_err();
    assert!(error.retries_exhausted());
    assert_eq!(error.failing_activity(), Some(&ActivityName::fetch()));
    assert!(matches!(
        error,
        PipelineError::PolicyExhausted { attempts: 3, .. }
    ));

    // exactly three attempts, never a fourth
    assert_eq!(
        harness
            .metrics
            .activity_executions("fetchActivity", STATUS_STARTED),
        3
    );
    assert_eq!(
        harness
            .metrics
            .activity_executions("fetchActivity", STATUS_SUCCEEDED),
        0
    );
    assert_eq!(
        harness
            .metrics
            .workflow_executions(PIPELINE_WORKFLOW, STATUS_FAILED),
        1
    );
    assert!(harness.store.is_empty());
    harness.assert_started_counts_are_terminal();

    harness.stop().await;
}

#[tokio::test]
async fn test_identical_runs_overwrite_while_distinct_runs_append() {
    let harness = Harness::start(Arc::new(NoFaults)).await;

    // the clock is frozen, so a second run produces a byte-identical record
    // and lands on the same key
    harness
        .start_pipeline("workflow-a")
        .await
        .expect("first run");
    harness
        .start_pipeline("workflow-b")
        .await
        .expect("identical second run");
    assert_eq!(harness.store.len(), 1);

    // once time moves, the next run persists under a fresh key
    harness.clock.advance(1);
    harness
        .start_pipeline("workflow-c")
        .await
        .expect("third run");
    assert_eq!(harness.store.len(), 2);

    harness.stop().await;
}

#[tokio::test]
async fn test_concurrent_pipelines_both_complete() {
    let harness = Harness::start(Arc::new(NoFaults)).await;

    let connection = harness
        .engine
        .connect("localhost:7233")
        .await
        .expect("local connect");
    let first = connection
        .start_workflow(
            PIPELINE_WORKFLOW,
            StartOptions::new("workflow-1").with_retry_policy(fast_policy(3)),
        )
        .await
        .expect("first start");
    let second = connection
        .start_workflow(
            PIPELINE_WORKFLOW,
            StartOptions::new("workflow-2").with_retry_policy(fast_policy(3)),
        )
        .await
        .expect("second start");

    let (one, two) = tokio::join!(first.result(), second.result());
    assert_eq!(one.expect("first completes"), TERMINAL_SUCCESS);
    assert_eq!(two.expect("second completes"), TERMINAL_SUCCESS);

    assert_eq!(
        harness
            .metrics
            .workflow_executions(PIPELINE_WORKFLOW, STATUS_SUCCEEDED),
        2
    );
    assert_eq!(harness.metrics.active_workflows(PIPELINE_WORKFLOW), 0);
    harness.assert_started_counts_are_terminal();

    harness.stop().await;
}

#[tokio::test]
async fn test_workflow_refused_without_ready_worker() {
    let metrics = Arc::new(MetricsRegistry::new());
    let engine = LocalEngine::new(metrics);
    let connection = engine
        .connect("localhost:7233")
        .await
        .expect("local connect");

    let error = connection
        .start_workflow(PIPELINE_WORKFLOW, StartOptions::new("workflow-1"))
        .await
        .err()
        .expect("dispatch refused");
    assert!(matches!(error, EngineError::WorkerUnavailable { .. }));
}

#[tokio::test]
async fn test_degraded_worker_stops_accepting_dispatches() {
    let harness = Harness::start(Arc::new(NoFaults)).await;

    harness
        .start_pipeline("workflow-1")
        .await
        .expect("pipeline completes while ready");

    // simulate an unrecoverable run-loop error
    harness.worker.health_state().mark_degraded();
    assert_eq!(harness.worker.health(), WorkerHealth::Degraded);

    let error = harness.start_pipeline("workflow-2").await.unwrap_err();
    assert!(matches!(
        error,
        PipelineError::Engine(EngineError::WorkerUnavailable { .. })
    ));

    // degraded is absorbing until process restart
    assert!(!harness.worker.health_state().mark_ready());
    assert_eq!(harness.worker.health(), WorkerHealth::Degraded);

    harness.worker.shutdown();
    let _ = harness.worker_task.await;
}
