//! Debouncing of change notifications.
//!
//! A burst of notifications for the same blueprint is coalesced: the first one
//! is admitted immediately, later ones within the window only mark the
//! debouncer as pending, and the caller schedules one trailing pass for the
//! remaining part of the window.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

use super::clock::{Clock, SystemClock};

/// When the next trigger may be admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Open,
    ClosedUntil(Instant),
    /// The window reaches past any representable instant.
    Closed,
}

#[derive(Debug, Clone, Copy)]
struct DebounceState {
    gate: Gate,
    pending: bool,
}

impl DebounceState {
    const fn initial() -> Self {
        Self {
            gate: Gate::Open,
            pending: false,
        }
    }
}

/// Coalesces triggers of a single resource.
#[derive(Debug)]
pub struct Debouncer {
    clock: Arc<dyn Clock>,
    state: Mutex<DebounceState>,
}

impl Debouncer {
    /// Creates a debouncer reading time from the given clock.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(DebounceState::initial()),
        }
    }

    /// Admits the trigger if the window has elapsed, otherwise marks it pending.
    ///
    /// An admitted trigger opens a new window and clears any pending mark.
    pub fn allow_or_mark(&self, window: Duration) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let open = match state.gate {
            Gate::Open => true,
            Gate::ClosedUntil(next) => now >= next,
            Gate::Closed => false,
        };
        if open {
            state.gate = now.checked_add(window).map_or(Gate::Closed, Gate::ClosedUntil);
            state.pending = false;
            return true;
        }

        state.pending = true;
        false
    }

    /// Consumes the pending mark.
    ///
    /// Returns whether a trailing pass is due and how long until the current
    /// window closes. The delay is zero when the window is already over and
    /// `Duration::MAX` when it never closes.
    pub fn should_requeue(&self) -> (bool, Duration) {
        let now = self.clock.now();
        let mut state = self.state.lock();

        if !state.pending {
            return (false, Duration::ZERO);
        }

        state.pending = false;
        let remaining = match state.gate {
            Gate::Open => Duration::ZERO,
            Gate::ClosedUntil(next) => next.saturating_duration_since(now),
            Gate::Closed => Duration::MAX,
        };
        (true, remaining)
    }

    /// Restores the initial state.
    pub fn reset(&self) {
        *self.state.lock() = DebounceState::initial();
    }
}

/// One [`Debouncer`] per resource key, created on first use.
#[derive(Debug)]
pub struct DebounceRegistry {
    clock: Arc<dyn Clock>,
    window: Duration,
    debouncers: Mutex<HashMap<String, Arc<Debouncer>>>,
}

impl DebounceRegistry {
    /// Creates a registry using the system clock.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self::with_clock(window, Arc::new(SystemClock))
    }

    /// Creates a registry using the given clock.
    #[must_use]
    pub fn with_clock(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            window,
            debouncers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the debounce window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Returns the debouncer of a key, creating it if needed.
    pub fn debouncer(&self, key: &str) -> Arc<Debouncer> {
        let mut debouncers = self.debouncers.lock();
        Arc::clone(
            debouncers
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Debouncer::new(Arc::clone(&self.clock)))),
        )
    }

    /// Admits or marks a trigger for a key using the registry window.
    pub fn allow_or_mark(&self, key: &str) -> bool {
        let allowed = self.debouncer(key).allow_or_mark(self.window);
        trace!(key, allowed, "debounce decision");
        allowed
    }

    /// Consumes the pending mark of a key.
    pub fn should_requeue(&self, key: &str) -> (bool, Duration) {
        let existing = self.debouncers.lock().get(key).cloned();
        existing.map_or((false, Duration::ZERO), |d| d.should_requeue())
    }

    /// Resets the debouncer of a key.
    pub fn reset(&self, key: &str) {
        if let Some(debouncer) = self.debouncers.lock().get(key) {
            debouncer.reset();
        }
    }

    /// Returns the number of tracked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.debouncers.lock().len()
    }

    /// Returns true if no key has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.debouncers.lock().is_empty()
    }
}
