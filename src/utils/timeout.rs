//! Timeout constants and a deadline helper for bounded blocking calls.
//!
//! Every blocking operation in the stack takes an explicit timeout so the
//! flight loop can slice a long listen into watchdog-safe intervals.

use std::time::{Duration, Instant};

/// Default bound for `PacketManager::listen` when the caller passes `None`.
pub const DEFAULT_LISTEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound for a single transport receive.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause between consecutive fragments of one message.
pub const INTER_FRAGMENT_DELAY: Duration = Duration::from_millis(200);

/// Pause between an acknowledgement and the response, for half-duplex turnaround.
pub const SEND_DELAY: Duration = Duration::from_millis(200);

/// A point in time after which a blocking call must return.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// Time left, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_expires() {
        let deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);

        let later = Deadline::after(Duration::from_secs(60));
        assert!(!later.expired());
        assert!(later.remaining() > Duration::from_secs(59));
    }
}
