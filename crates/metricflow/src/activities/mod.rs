//! The three pipeline stage implementations.

mod fetch;
mod save;
mod transform;

pub use fetch::SimulatedFetch;
pub use save::StoreSave;
pub use transform::{DeriveTransform, TRANSFORMED_AT, TRANSFORMED_PROP};

use crate::clock::Clock;
use crate::fault::FaultPlan;
use crate::store::ShardedStore;
use metricflow_core::ActivitySet;
use std::sync::Arc;

/// Bundles the standard stage implementations over shared capabilities.
pub fn standard_set(
    clock: Arc<dyn Clock>,
    faults: Arc<dyn FaultPlan>,
    store: Arc<ShardedStore>,
) -> ActivitySet {
    ActivitySet::new(
        Arc::new(SimulatedFetch::new(clock.clone(), faults)),
        Arc::new(DeriveTransform::new(clock.clone())),
        Arc::new(StoreSave::new(store, clock)),
    )
}
