//! Reconcile passes over a blueprint.
//!
//! This module contains:
//! - The collaborator ports (diff provider, apply executor)
//! - Bundled collaborators for offline evaluation
//! - Blueprint documents read by the command line tools
//! - The reconcile pass itself

mod document;
mod pass;
mod ports;

pub use document::BlueprintDocument;
pub use pass::{PassOutcome, PassReport, Reconciler};
pub use ports::{ApplyExecutor, DiffProvider, DryRunExecutor, StaticDiffProvider};
#[cfg(test)]
pub use ports::{MockApplyExecutor, MockDiffProvider};
