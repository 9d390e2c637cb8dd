//! Process-wide metrics registry.
//!
//! An explicitly constructed registry object, passed by `Arc` into the
//! engine, the instrumentation layer and the worker. Counter and histogram
//! updates are append-only and never fail, so the observation path can never
//! mask a real activity outcome.

use metricflow_core::ActivityName;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Outcome label for a started invocation.
pub const STATUS_STARTED: &str = "started";
/// Outcome label for a successful invocation.
pub const STATUS_SUCCEEDED: &str = "succeeded";
/// Outcome label for a failed invocation.
pub const STATUS_FAILED: &str = "failed";

const ACTIVITY_BUCKETS: &[f64] = &[0.01, 0.1, 0.5, 1.0, 5.0, 10.0];
const WORKFLOW_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0];

struct CounterVec {
    name: &'static str,
    help: &'static str,
    labels: [&'static str; 2],
    samples: Mutex<BTreeMap<(String, String), u64>>,
}

impl CounterVec {
    fn new(name: &'static str, help: &'static str, labels: [&'static str; 2]) -> Self {
        Self {
            name,
            help,
            labels,
            samples: Mutex::new(BTreeMap::new()),
        }
    }

    fn inc(&self, first: &str, second: &str) {
        let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        *samples
            .entry((first.to_string(), second.to_string()))
            .or_insert(0) += 1;
    }

    fn value(&self, first: &str, second: &str) -> u64 {
        let samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        samples
            .get(&(first.to_string(), second.to_string()))
            .copied()
            .unwrap_or(0)
    }

    fn render_into(&self, out: &mut String) {
        out.push_str(&format!("# HELP {} {}\n", self.name, self.help));
        out.push_str(&format!("# TYPE {} counter\n", self.name));
        let samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        for ((first, second), value) in samples.iter() {
            out.push_str(&format!(
                "{}{{{}=\"{}\",{}=\"{}\"}} {}\n",
                self.name, self.labels[0], first, self.labels[1], second, value
            ));
        }
    }
}

#[derive(Default)]
struct HistogramSample {
    bucket_counts: Vec<u64>,
    sum: f64,
    count: u64,
}

struct HistogramVec {
    name: &'static str,
    help: &'static str,
    label: &'static str,
    buckets: &'static [f64],
    samples: Mutex<BTreeMap<String, HistogramSample>>,
}

impl HistogramVec {
    fn new(
        name: &'static str,
        help: &'static str,
        label: &'static str,
        buckets: &'static [f64],
    ) -> Self {
        Self {
            name,
            help,
            label,
            buckets,
            samples: Mutex::new(BTreeMap::new()),
        }
    }

    fn observe(&self, label: &str, value: f64) {
        let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        let sample = samples.entry(label.to_string()).or_insert_with(|| {
            HistogramSample {
                bucket_counts: vec![0; self.buckets.len()],
                sum: 0.0,
                count: 0,
            }
        });
        for (index, bound) in self.buckets.iter().enumerate() {
            if value <= *bound {
                sample.bucket_counts[index] += 1;
            }
        }
        sample.sum += value;
        sample.count += 1;
    }

    fn count(&self, label: &str) -> u64 {
        let samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        samples.get(label).map(|sample| sample.count).unwrap_or(0)
    }

    fn render_into(&self, out: &mut String) {
        out.push_str(&format!("# HELP {} {}\n", self.name, self.help));
        out.push_str(&format!("# TYPE {} histogram\n", self.name));
        let samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        for (label, sample) in samples.iter() {
            for (index, bound) in self.buckets.iter().enumerate() {
                out.push_str(&format!(
                    "{}_bucket{{{}=\"{}\",le=\"{}\"}} {}\n",
                    self.name, self.label, label, bound, sample.bucket_counts[index]
                ));
            }
            out.push_str(&format!(
                "{}_bucket{{{}=\"{}\",le=\"+Inf\"}} {}\n",
                self.name, self.label, label, sample.count
            ));
            out.push_str(&format!(
                "{}_sum{{{}=\"{}\"}} {}\n",
                self.name, self.label, label, sample.sum
            ));
            out.push_str(&format!(
                "{}_count{{{}=\"{}\"}} {}\n",
                self.name, self.label, label, sample.count
            ));
        }
    }
}

struct GaugeVec {
    name: &'static str,
    help: &'static str,
    label: &'static str,
    samples: Mutex<BTreeMap<String, i64>>,
}

impl GaugeVec {
    fn new(name: &'static str, help: &'static str, label: &'static str) -> Self {
        Self {
            name,
            help,
            label,
            samples: Mutex::new(BTreeMap::new()),
        }
    }

    fn add(&self, label: &str, delta: i64) {
        let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        *samples.entry(label.to_string()).or_insert(0) += delta;
    }

    fn value(&self, label: &str) -> i64 {
        let samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        samples.get(label).copied().unwrap_or(0)
    }

    fn render_into(&self, out: &mut String) {
        out.push_str(&format!("# HELP {} {}\n", self.name, self.help));
        out.push_str(&format!("# TYPE {} gauge\n", self.name));
        let samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        for (label, value) in samples.iter() {
            out.push_str(&format!(
                "{}{{{}=\"{}\"}} {}\n",
                self.name, self.label, label, value
            ));
        }
    }
}

/// Thread-safe registry for the pipeline's counters, histograms and gauges.
///
/// Every `started` increment for an invocation is matched by exactly one
/// `succeeded` or `failed` increment; durations are observed only on the
/// success path so truncated work cannot skew the latency histograms.
pub struct MetricsRegistry {
    activity_executions: CounterVec,
    activity_retries: CounterVec,
    workflow_executions: CounterVec,
    workflow_retries: CounterVec,
    activity_duration: HistogramVec,
    workflow_duration: HistogramVec,
    active_workflows: GaugeVec,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            activity_executions: CounterVec::new(
                "activity_executions_total",
                "Total number of activity executions",
                ["activity", "status"],
            ),
            activity_retries: CounterVec::new(
                "activity_retries_total",
                "Total number of activity retries",
                ["activity", "reason"],
            ),
            workflow_executions: CounterVec::new(
                "workflow_executions_total",
                "Total number of workflow executions",
                ["workflow", "status"],
            ),
            workflow_retries: CounterVec::new(
                "workflow_retries_total",
                "Total number of workflow retries",
                ["workflow", "reason"],
            ),
            activity_duration: HistogramVec::new(
                "activity_duration_seconds",
                "Activity execution duration in seconds",
                "activity",
                ACTIVITY_BUCKETS,
            ),
            workflow_duration: HistogramVec::new(
                "workflow_duration_seconds",
                "Workflow execution duration in seconds",
                "workflow",
                WORKFLOW_BUCKETS,
            ),
            active_workflows: GaugeVec::new(
                "active_workflows",
                "Number of currently active workflows",
                "workflow",
            ),
        }
    }

    /// Records the start of an activity invocation.
    pub fn activity_started(&self, activity: &ActivityName) {
        self.activity_executions.inc(activity.as_str(), STATUS_STARTED);
    }

    /// Records a successful activity invocation and its duration.
    pub fn activity_succeeded(&self, activity: &ActivityName, duration: Duration) {
        self.activity_executions
            .inc(activity.as_str(), STATUS_SUCCEEDED);
        self.activity_duration
            .observe(activity.as_str(), duration.as_secs_f64());
    }

    /// Records a failed activity invocation. No duration is observed.
    pub fn activity_failed(&self, activity: &ActivityName) {
        self.activity_executions.inc(activity.as_str(), STATUS_FAILED);
    }

    /// Records a retry-triggering failure, tagged by reason.
    pub fn activity_retry(&self, activity: &ActivityName, reason: &str) {
        self.activity_retries.inc(activity.as_str(), reason);
    }

    /// Records the start of a workflow run.
    pub fn workflow_started(&self, workflow: &str) {
        self.workflow_executions.inc(workflow, STATUS_STARTED);
    }

    /// Records a successful workflow run and its duration.
    pub fn workflow_succeeded(&self, workflow: &str, duration: Duration) {
        self.workflow_executions.inc(workflow, STATUS_SUCCEEDED);
        self.workflow_duration.observe(workflow, duration.as_secs_f64());
    }

    /// Records a failed workflow run. No duration is observed.
    pub fn workflow_failed(&self, workflow: &str) {
        self.workflow_executions.inc(workflow, STATUS_FAILED);
    }

    /// Records a workflow-level retry, tagged by reason.
    pub fn workflow_retry(&self, workflow: &str, reason: &str) {
        self.workflow_retries.inc(workflow, reason);
    }

    /// Marks one more workflow as in flight.
    pub fn workflow_active_inc(&self, workflow: &str) {
        self.active_workflows.add(workflow, 1);
    }

    /// Marks one workflow as no longer in flight.
    pub fn workflow_active_dec(&self, workflow: &str) {
        self.active_workflows.add(workflow, -1);
    }

    /// Current value of `activity_executions_total` for an activity/status.
    pub fn activity_executions(&self, activity: &str, status: &str) -> u64 {
        self.activity_executions.value(activity, status)
    }

    /// Current value of `activity_retries_total` for an activity/reason.
    pub fn activity_retries(&self, activity: &str, reason: &str) -> u64 {
        self.activity_retries.value(activity, reason)
    }

    /// Current value of `workflow_executions_total` for a workflow/status.
    pub fn workflow_executions(&self, workflow: &str, status: &str) -> u64 {
        self.workflow_executions.value(workflow, status)
    }

    /// Current value of `workflow_retries_total` for a workflow/reason.
    pub fn workflow_retries(&self, workflow: &str, reason: &str) -> u64 {
        self.workflow_retries.value(workflow, reason)
    }

    /// Number of duration samples recorded for an activity.
    pub fn activity_duration_count(&self, activity: &str) -> u64 {
        self.activity_duration.count(activity)
    }

    /// Number of duration samples recorded for a workflow.
    pub fn workflow_duration_count(&self, workflow: &str) -> u64 {
        self.workflow_duration.count(workflow)
    }

    /// Number of currently active runs of a workflow.
    pub fn active_workflows(&self, workflow: &str) -> i64 {
        self.active_workflows.value(workflow)
    }

    /// Renders all families in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.activity_executions.render_into(&mut out);
        self.activity_retries.render_into(&mut out);
        self.workflow_executions.render_into(&mut out);
        self.workflow_retries.render_into(&mut out);
        self.activity_duration.render_into(&mut out);
        self.workflow_duration.render_into(&mut out);
        self.active_workflows.render_into(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_counters() {
        let registry = MetricsRegistry::new();
        let fetch = ActivityName::fetch();

        registry.activity_started(&fetch);
        registry.activity_started(&fetch);
        registry.activity_failed(&fetch);
        registry.activity_succeeded(&fetch, Duration::from_millis(20));

        assert_eq!(registry.activity_executions("fetchActivity", STATUS_STARTED), 2);
        assert_eq!(registry.activity_executions("fetchActivity", STATUS_FAILED), 1);
        assert_eq!(
            registry.activity_executions("fetchActivity", STATUS_SUCCEEDED),
            1
        );
        // started counts are fully accounted for by terminal outcomes
        assert_eq!(
            registry.activity_executions("fetchActivity", STATUS_STARTED),
            registry.activity_executions("fetchActivity", STATUS_SUCCEEDED)
                + registry.activity_executions("fetchActivity", STATUS_FAILED)
        );
    }

    #[test]
    fn test_duration_recorded_per_success() {
        let registry = MetricsRegistry::new();
        let save = ActivityName::save();

        registry.activity_succeeded(&save, Duration::from_millis(5));
        registry.activity_failed(&save);

        assert_eq!(registry.activity_duration_count("saveActivity"), 1);
    }

    #[test]
    fn test_retry_reason_tagging() {
        let registry = MetricsRegistry::new();
        let fetch = ActivityName::fetch();

        registry.activity_retry(&fetch, "transient");
        registry.activity_retry(&fetch, "transient");
        registry.activity_retry(&fetch, "timeout");

        assert_eq!(registry.activity_retries("fetchActivity", "transient"), 2);
        assert_eq!(registry.activity_retries("fetchActivity", "timeout"), 1);
        assert_eq!(registry.activity_retries("fetchActivity", "permanent"), 0);
    }

    #[test]
    fn test_active_workflow_gauge() {
        let registry = MetricsRegistry::new();
        registry.workflow_active_inc("fetchTransformSaveWorkflow");
        registry.workflow_active_inc("fetchTransformSaveWorkflow");
        registry.workflow_active_dec("fetchTransformSaveWorkflow");
        assert_eq!(registry.active_workflows("fetchTransformSaveWorkflow"), 1);
    }

    #[test]
    fn test_render_exposition() {
        let registry = MetricsRegistry::new();
        registry.activity_started(&ActivityName::fetch());
        registry.workflow_succeeded("fetchTransformSaveWorkflow", Duration::from_millis(150));

        let rendered = registry.render();
        assert!(rendered.contains("# TYPE activity_executions_total counter"));
        assert!(rendered
            .contains("activity_executions_total{activity=\"fetchActivity\",status=\"started\"} 1"));
        assert!(rendered.contains("# TYPE workflow_duration_seconds histogram"));
        assert!(rendered.contains(
            "workflow_duration_seconds_count{workflow=\"fetchTransformSaveWorkflow\"} 1"
        ));
        assert!(rendered
            .contains("workflow_duration_seconds_bucket{workflow=\"fetchTransformSaveWorkflow\",le=\"+Inf\"} 1"));
        assert!(rendered.contains("# TYPE active_workflows gauge"));
    }

    #[test]
    fn test_concurrent_increments() {
        let registry = std::sync::Arc::new(MetricsRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    registry.activity_started(&ActivityName::transform());
                }
            }));
        }
        for handle in handles {
            let _ = handle.join();
        }
        assert_eq!(
            registry.activity_executions("transformActivity", STATUS_STARTED),
            800
        );
    }
}
