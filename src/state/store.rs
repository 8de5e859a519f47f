//! Blueprint repository trait definition.
//!
//! This module defines the persistence port of the lifecycle engine.

use async_trait::async_trait;

use crate::domain::BlueprintSpec;
use crate::error::Result;

use super::types::RecordedEvent;

/// Persistence backend for blueprints.
///
/// Writes are guarded by optimistic concurrency: an update only succeeds if
/// the stored resource version still equals the one the aggregate was loaded
/// at. A successful write publishes the pending events of the aggregate and
/// drains them; a failed write leaves them in place.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlueprintRepository: Send + Sync {
    /// Loads a blueprint.
    ///
    /// A missing blueprint is reported as a not-found error that a retry will
    /// not fix.
    async fn get(&self, id: &str) -> Result<BlueprintSpec>;

    /// Stores a new blueprint and publishes its pending events.
    async fn create(&self, spec: &mut BlueprintSpec) -> Result<()>;

    /// Stores the status of a loaded blueprint and publishes its pending events.
    async fn update(&self, spec: &mut BlueprintSpec) -> Result<()>;

    /// Lists the identifiers of all stored blueprints.
    async fn list(&self) -> Result<Vec<String>>;

    /// Returns the published events of a blueprint, oldest first.
    async fn recorded_events(&self, id: &str) -> Result<Vec<RecordedEvent>>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}
