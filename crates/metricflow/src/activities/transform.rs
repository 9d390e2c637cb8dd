//! Transform stage: derives a fresh payload from the fetched one.

use crate::clock::Clock;
use async_trait::async_trait;
use metricflow_core::{ActivityError, FetchResult, TransformActivity};
use serde_json::Value;
use std::sync::Arc;

/// Field holding the transform timestamp, in epoch milliseconds.
pub const TRANSFORMED_AT: &str = "transformedAt";
/// Field holding the transform marker with the rendered original value.
pub const TRANSFORMED_PROP: &str = "transformedProp";

/// Pure payload derivation.
///
/// Produces a new value merging the original fields with the transform
/// timestamp and a marker embedding the JSON rendering of the original
/// value. Deterministic for a fixed input and a fixed clock reading; the
/// input is never mutated.
pub struct DeriveTransform {
    clock: Arc<dyn Clock>,
}

impl DeriveTransform {
    /// Creates the transform stage over the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl TransformActivity for DeriveTransform {
    async fn transform(&self, input: FetchResult) -> Result<FetchResult, ActivityError> {
        let Value::Object(fields) = &input.value else {
            return Err(ActivityError::permanent(
                "transform input value must be a JSON object",
            ));
        };
        let rendered = serde_json::to_string(&input.value).map_err(|error| {
            ActivityError::permanent(format!("input value is not renderable: {error}"))
        })?;

        let mut derived = fields.clone();
        derived.insert(
            TRANSFORMED_AT.to_string(),
            Value::from(self.clock.now_millis()),
        );
        derived.insert(
            TRANSFORMED_PROP.to_string(),
            Value::String(format!("New ({rendered})")),
        );
        Ok(FetchResult::new(input.source, Value::Object(derived)))
    }
}
