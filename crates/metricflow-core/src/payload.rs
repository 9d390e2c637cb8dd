//! Pipeline payload types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The value produced by the fetch stage and threaded through the pipeline.
///
/// `source` identifies the data origin; `value` is an arbitrary structured
/// payload. A `FetchResult` is immutable once created: the transform stage
/// derives a fresh value instead of mutating its input.
///
/// # Examples
///
/// ```
/// use metricflow_core::FetchResult;
/// use serde_json::json;
///
/// let result = FetchResult::new("simulated api", json!({"name": "Tani"}));
/// assert_eq!(result.source, "simulated api");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    /// Identifier of the data origin.
    pub source: String,
    /// The structured payload.
    pub value: Value,
}

impl FetchResult {
    /// Creates a new payload.
    pub fn new(source: impl Into<String>, value: Value) -> Self {
        Self {
            source: source.into(),
            value,
        }
    }
}
