//! Exponential backoff for propagated errors.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

/// Per-key exponential backoff, `base * 2^failures` capped at `max`.
#[derive(Debug)]
pub struct ErrorBackoff {
    base: Duration,
    max: Duration,
    failures: Mutex<HashMap<String, u32>>,
}

impl ErrorBackoff {
    /// Creates a backoff with the given bounds.
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Records a failure of the key and returns the delay before the retry.
    pub fn next_delay(&self, key: &str) -> Duration {
        let mut failures = self.failures.lock();
        let count = failures.entry(key.to_string()).or_insert(0);
        let factor = 2u32.checked_pow(*count).unwrap_or(u32::MAX);
        *count = count.saturating_add(1);

        self.base.checked_mul(factor).map_or(self.max, |delay| delay.min(self.max))
    }

    /// Forgets the failures of the key.
    pub fn reset(&self, key: &str) {
        self.failures.lock().remove(key);
    }

    /// Returns the number of consecutive failures recorded for the key.
    #[must_use]
    pub fn failures(&self, key: &str) -> u32 {
        self.failures.lock().get(key).copied().unwrap_or(0)
    }
}

impl Default for ErrorBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(300))
    }
}
