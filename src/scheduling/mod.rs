//! Scheduling primitives used by the controller runtime.
//!
//! This module contains:
//! - A monotonic clock abstraction
//! - Per-resource debouncing of notifications
//! - Exponential backoff for propagated errors

mod backoff;
mod clock;
mod debounce;

pub use backoff::ErrorBackoff;
pub use clock::{Clock, ManualClock, SystemClock};
pub use debounce::{DebounceRegistry, Debouncer};
