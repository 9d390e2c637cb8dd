//! Fetch stage: produces a payload from the (simulated) upstream API.

use crate::clock::Clock;
use crate::fault::FaultPlan;
use async_trait::async_trait;
use metricflow_core::{ActivityError, FetchActivity, FetchResult};
use serde_json::json;
use std::sync::Arc;

/// Simulated upstream fetch.
///
/// A real implementation would call an external API; this one fabricates the
/// payload from the injected clock. The fault plan decides per invocation
/// whether to fail instead, which is how tests and demos exercise the retry
/// path deterministically.
pub struct SimulatedFetch {
    clock: Arc<dyn Clock>,
    faults: Arc<dyn FaultPlan>,
}

impl SimulatedFetch {
    /// Creates the fetch stage over the given capabilities.
    pub fn new(clock: Arc<dyn Clock>, faults: Arc<dyn FaultPlan>) -> Self {
        Self { clock, faults }
    }
}

#[async_trait]
impl FetchActivity for SimulatedFetch {
    async fn fetch(&self) -> Result<FetchResult, ActivityError> {
        if let Some(fault) = self.faults.next_fault() {
            tracing::warn!(error = %fault, "error fetching data");
            return Err(fault);
        }
        Ok(FetchResult::new(
            "simulated api",
            json!({
                "name": "Tani",
                "timestamp": self.clock.now_millis(),
            }),
        ))
    }
}
