//! Bounded retry with fixed back-off.
//!
//! Grab acquisition needs this: the display server may transiently deny a
//! pointer or keyboard grab while another client is mid-transition, so each
//! grab is retried a bounded number of times with a short sleep in between.

use std::time::Duration;

/// Default number of grab attempts per device.
pub const DEFAULT_GRAB_ATTEMPTS: u32 = 1000;

/// Default sleep between grab attempts.
pub const DEFAULT_GRAB_BACKOFF: Duration = Duration::from_millis(1);

/// A bounded retry policy: up to `attempts` tries with `backoff` sleeps
/// between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self { attempts, backoff }
    }

    /// Run `attempt` until it succeeds or the attempt budget is exhausted.
    ///
    /// Sleeps `backoff` between attempts, never after the last one. Returns
    /// whether any attempt succeeded; with zero attempts this is `false`.
    pub fn run(&self, mut attempt: impl FnMut() -> bool) -> bool {
        for i in 0..self.attempts {
            if attempt() {
                return true;
            }
            if i + 1 < self.attempts {
                std::thread::sleep(self.backoff);
            }
        }
        false
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_GRAB_ATTEMPTS,
            backoff: DEFAULT_GRAB_BACKOFF,
        }
    }
}
