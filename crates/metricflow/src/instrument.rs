//! Observation boundary around raw activities.

use crate::metrics::MetricsRegistry;
use async_trait::async_trait;
use metricflow_core::{
    ActivityError, ActivityName, ActivitySet, FetchActivity, FetchResult, SaveActivity,
    TransformActivity,
};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Wraps a raw activity with metrics observation and the per-attempt timeout.
///
/// Each invocation emits a `started` event, then exactly one terminal
/// `succeeded` or `failed` event. Durations are observed only on the success
/// path, and failures additionally bump the retry counter tagged with the
/// retry reason. The underlying error is re-raised unchanged; the
/// observation path itself cannot fail.
pub struct Instrumented<A: ?Sized> {
    activity: ActivityName,
    attempt_timeout: Duration,
    metrics: Arc<MetricsRegistry>,
    inner: Arc<A>,
}

impl<A: ?Sized> Instrumented<A> {
    /// Wraps `inner`, observing it under `activity`.
    pub fn new(
        activity: ActivityName,
        inner: Arc<A>,
        attempt_timeout: Duration,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            activity,
            attempt_timeout,
            metrics,
            inner,
        }
    }

    async fn observe<T, Fut>(&self, work: Fut) -> Result<T, ActivityError>
    where
        Fut: Future<Output = Result<T, ActivityError>> + Send,
    {
        self.metrics.activity_started(&self.activity);
        let started = Instant::now();
        let outcome = match tokio::time::timeout(self.attempt_timeout, work).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ActivityError::Timeout {
                timeout: self.attempt_timeout,
            }),
        };
        match outcome {
            Ok(value) => {
                self.metrics
                    .activity_succeeded(&self.activity, started.elapsed());
                Ok(value)
            }
            Err(error) => {
                self.metrics.activity_failed(&self.activity);
                self.metrics
                    .activity_retry(&self.activity, error.retry_reason());
                tracing::warn!(
                    activity = %self.activity,
                    error = %error,
                    "activity attempt failed"
                );
                Err(error)
            }
        }
    }
}

#[async_trait]
impl<A: FetchActivity + ?Sized> FetchActivity for Instrumented<A> {
    async fn fetch(&self) -> Result<FetchResult, ActivityError> {
        self.observe(self.inner.fetch()).await
    }
}

#[async_trait]
impl<A: TransformActivity + ?Sized> TransformActivity for Instrumented<A> {
    async fn transform(&self, input: FetchResult) -> Result<FetchResult, ActivityError> {
        self.observe(self.inner.transform(input)).await
    }
}

#[async_trait]
impl<A: SaveActivity + ?Sized> SaveActivity for Instrumented<A> {
    async fn save(&self, input: FetchResult) -> Result<(), ActivityError> {
        self.observe(self.inner.save(input)).await
    }
}

/// Wraps every activity of `set` under its registration identifier.
pub fn instrument_set(
    set: &ActivitySet,
    attempt_timeout: Duration,
    metrics: &Arc<MetricsRegistry>,
) -> ActivitySet {
    ActivitySet::new(
        Arc::new(Instrumented::new(
            ActivityName::fetch(),
            set.fetch.clone(),
            attempt_timeout,
            metrics.clone(),
        )),
        Arc::new(Instrumented::new(
            ActivityName::transform(),
            set.transform.clone(),
            attempt_timeout,
            metrics.clone(),
        )),
        Arc::new(Instrumented::new(
            ActivityName::save(),
            set.save.clone(),
            attempt_timeout,
            metrics.clone(),
        )),
    )
}
