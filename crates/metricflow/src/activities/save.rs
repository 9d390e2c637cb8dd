//! Save stage: persists the payload to the sharded store.

use crate::clock::Clock;
use crate::store::ShardedStore;
use async_trait::async_trait;
use metricflow_core::{ActivityError, FetchResult, SaveActivity};
use std::sync::Arc;

/// Persists payloads under timestamp-derived keys.
///
/// Idempotent under retry: re-saving a byte-identical payload overwrites the
/// same record instead of corrupting state.
pub struct StoreSave {
    store: Arc<ShardedStore>,
    clock: Arc<dyn Clock>,
}

impl StoreSave {
    /// Creates the save stage over the given store and clock.
    pub fn new(store: Arc<ShardedStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

#[async_trait]
impl SaveActivity for StoreSave {
    async fn save(&self, input: FetchResult) -> Result<(), ActivityError> {
        let key = self.store.insert(self.clock.now_millis(), &input.value);
        tracing::debug!(key = %key, source = %input.source, "record persisted");
        Ok(())
    }
}
