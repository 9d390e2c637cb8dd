//! Activity contract: the three named pipeline stages.

use crate::error::ActivityError;
use crate::payload::FetchResult;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Registration identifier of the fetch stage.
pub const FETCH_ACTIVITY: &str = "fetchActivity";
/// Registration identifier of the transform stage.
pub const TRANSFORM_ACTIVITY: &str = "transformActivity";
/// Registration identifier of the save stage.
pub const SAVE_ACTIVITY: &str = "saveActivity";

/// Type-safe activity name wrapper.
///
/// Provides compile-time safety for activity identifiers, preventing
/// typos and mismatched names at the API level.
///
/// # Examples
///
/// ```
/// use metricflow_core::ActivityName;
///
/// let name = ActivityName::fetch();
/// assert_eq!(name.as_str(), "fetchActivity");
///
/// let name: ActivityName = "saveActivity".into();
/// assert_eq!(name.as_str(), "saveActivity");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActivityName(String);

impl ActivityName {
    /// Creates a new ActivityName.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The fetch stage identifier.
    pub fn fetch() -> Self {
        Self::new(FETCH_ACTIVITY)
    }

    /// The transform stage identifier.
    pub fn transform() -> Self {
        Self::new(TRANSFORM_ACTIVITY)
    }

    /// The save stage identifier.
    pub fn save() -> Self {
        Self::new(SAVE_ACTIVITY)
    }

    /// Returns the activity name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActivityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ActivityName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ActivityName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ActivityName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for ActivityName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The fetch stage: produces a payload from the upstream source.
///
/// May fail with [`ActivityError::Transient`] (explicitly retryable) or
/// [`ActivityError::Permanent`]. No side effect beyond the returned value.
#[async_trait]
pub trait FetchActivity: Send + Sync {
    /// Fetches a payload from the data origin.
    async fn fetch(&self) -> Result<FetchResult, ActivityError>;
}

/// The transform stage: derives a new payload from the fetched one.
///
/// Must be pure and deterministic given the same input and the same clock
/// reading; fails only on malformed input.
#[async_trait]
pub trait TransformActivity: Send + Sync {
    /// Derives a fresh payload embedding the transform timestamp and marker.
    async fn transform(&self, input: FetchResult) -> Result<FetchResult, ActivityError>;
}

/// The save stage: persists the payload to the store.
///
/// Must be idempotent under retry: saving byte-identical input twice
/// overwrites the same logical record rather than corrupting state.
#[async_trait]
pub trait SaveActivity: Send + Sync {
    /// Persists the payload under a timestamp-derived key.
    async fn save(&self, input: FetchResult) -> Result<(), ActivityError>;
}

/// The three stage implementations bundled for registration.
///
/// Activities are invoked only through the orchestrator; holding them behind
/// `Arc` keeps the set cheap to clone into concurrent orchestrations.
#[derive(Clone)]
pub struct ActivitySet {
    /// The fetch stage, registered as [`FETCH_ACTIVITY`].
    pub fetch: Arc<dyn FetchActivity>,
    /// The transform stage, registered as [`TRANSFORM_ACTIVITY`].
    pub transform: Arc<dyn TransformActivity>,
    /// The save stage, registered as [`SAVE_ACTIVITY`].
    pub save: Arc<dyn SaveActivity>,
}

impl ActivitySet {
    /// Bundles the three stages.
    pub fn new(
        fetch: Arc<dyn FetchActivity>,
        transform: Arc<dyn TransformActivity>,
        save: Arc<dyn SaveActivity>,
    ) -> Self {
        Self {
            fetch,
            transform,
            save,
        }
    }
}

impl fmt::Debug for ActivitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivitySet")
            .field("activities", &[FETCH_ACTIVITY, TRANSFORM_ACTIVITY, SAVE_ACTIVITY])
            .finish()
    }
}
