// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Blueprint Lifecycle
//!
//! Lifecycle control engine for declarative blueprints of a software ecosystem.
//!
//! ## Overview
//!
//! A blueprint describes the desired state of an ecosystem (dogus, components
//! and config). Something else computes the difference between that state and
//! reality; this crate decides what happens with it:
//!
//! - Track convergence through typed conditions on the blueprint aggregate
//! - Refuse diffs that need forbidden actions (downgrades, namespace switches)
//! - Turn errors into scheduling decisions (retry, requeue after a delay, stop)
//! - Coalesce bursts of change notifications per blueprint
//!
//! ## Architecture
//!
//! 1. **Domain**: the blueprint aggregate and its condition state machine
//! 2. **Policy**: the diff action validator and the requeue classifier
//! 3. **Reconciler**: one pass over a blueprint using injected collaborators
//! 4. **Controller**: schedules passes with debounce, requeue and backoff
//!
//! ## Modules
//!
//! - [`domain`]: Blueprint aggregate, conditions, state diff and events
//! - [`policy`]: Diff action validation and requeue classification
//! - [`scheduling`]: Clock, debounce coalescer and error backoff
//! - [`state`]: Blueprint repositories (local JSON files)
//! - [`reconciler`]: Reconcile passes and their collaborator traits
//! - [`controller`]: Event loop driving passes
//! - [`config`]: Operator configuration parsing and validation
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! id: blueprint-1
//! config:
//!   dryRun: true
//! stateDiff:
//!   doguDiffs:
//!     - name: official/cas
//!       actual: { installed: false }
//!       expected: { installed: true, version: 7.0.5 }
//!       neededActions: [install]
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod policy;
pub mod reconciler;
pub mod scheduling;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, OperatorConfig};
pub use controller::{Controller, ControllerHandle, Trigger};
pub use domain::{BlueprintSpec, ConditionType, StateDiff};
pub use error::{BlueprintError, Result};
pub use policy::{DiffActionValidator, RequeueClassifier, RequeueDecision};
pub use reconciler::{BlueprintDocument, Reconciler};
pub use scheduling::{DebounceRegistry, ErrorBackoff};
pub use state::{BlueprintRepository, LocalBlueprintRepository};
