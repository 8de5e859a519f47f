//! Blueprint persistence.
//!
//! This module provides the repository port of the lifecycle engine and a
//! file-backed implementation that keeps conditions, the state diff and a
//! history of published events per blueprint.

mod local;
mod store;
mod types;
mod version;

pub use local::{LocalBlueprintRepository, STATE_DIR};
#[cfg(test)]
pub use store::MockBlueprintRepository;
pub use store::BlueprintRepository;
pub use types::{BlueprintRecord, RecordSpec, RecordStatus, RecordedEvent, FORMAT_VERSION, MAX_HISTORY};
pub use version::version_of;
