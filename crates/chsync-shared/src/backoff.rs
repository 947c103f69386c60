//! Reconnect backoff

use std::time::Duration;

/// Doubling delay with a cap, used between binlog reconnect attempts.
///
/// The delay never resets within a session: a long-lived stream that blips
/// periodically keeps waiting at the cap.
#[derive(Debug, Clone)]
pub struct Backoff {
    delay: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { delay: initial, max }
    }

    /// The delay to sleep before the next attempt; doubles for the one
    /// after, up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.delay;
        self.delay = (self.delay * 2).min(self.max);
        current
    }
}
