//! Link Metrics
//!
//! Counters for radio link and command handling health. They feed the beacon
//! and ground-pass diagnostics.
//!
//! Uses atomic counters so a snapshot can be taken through a shared reference.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector for one radio link
#[derive(Debug)]
pub struct LinkMetrics {
    /// Messages handed to the transport in full
    pub messages_sent: AtomicU64,
    /// Messages reassembled from fragments
    pub messages_received: AtomicU64,
    /// Fragments transmitted
    pub fragments_sent: AtomicU64,
    /// Fragments received (acks included)
    pub fragments_received: AtomicU64,
    /// Payload bytes transmitted
    pub bytes_sent: AtomicU64,
    /// Payload bytes reassembled
    pub bytes_received: AtomicU64,
    /// Sends that failed or were refused
    pub send_failures: AtomicU64,
    /// Malformed fragments or frames dropped
    pub protocol_errors: AtomicU64,
    /// Incomplete messages discarded
    pub reassemblies_abandoned: AtomicU64,
    /// Acknowledgements received
    pub acks_received: AtomicU64,
    /// Commands dropped for a bad credential
    pub auth_failures: AtomicU64,
    /// Commands executed successfully
    pub commands_executed: AtomicU64,
    /// Command handlers that returned an error
    pub handler_errors: AtomicU64,
    start_time: Instant,
}

impl Default for LinkMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkMetrics {
    pub fn new() -> Self {
        Self {
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            fragments_sent: AtomicU64::new(0),
            fragments_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            reassemblies_abandoned: AtomicU64::new(0),
            acks_received: AtomicU64::new(0),
            auth_failures: AtomicU64::new(0),
            commands_executed: AtomicU64::new(0),
            handler_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn message_sent(&self, byte_count: usize, fragments: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count as u64, Ordering::Relaxed);
        self.fragments_sent.fetch_add(fragments as u64, Ordering::Relaxed);
    }

    pub fn message_received(&self, byte_count: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count as u64, Ordering::Relaxed);
    }

    pub fn fragment_sent(&self) {
        self.fragments_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fragment_received(&self) {
        self.fragments_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reassembly_abandoned(&self) {
        self.reassemblies_abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ack_received(&self) {
        self.acks_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn auth_failure(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_executed(&self) {
        self.commands_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_error(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            fragments_sent: self.fragments_sent.load(Ordering::Relaxed),
            fragments_received: self.fragments_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            reassemblies_abandoned: self.reassemblies_abandoned.load(Ordering::Relaxed),
            acks_received: self.acks_received.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            commands_executed: self.commands_executed.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            uptime_secs: self.uptime_secs(),
        }
    }

    /// Log a summary line
    pub fn log_summary(&self) {
        let s = self.snapshot();
        info!(
            messages_sent = s.messages_sent,
            messages_received = s.messages_received,
            send_failures = s.send_failures,
            protocol_errors = s.protocol_errors,
            auth_failures = s.auth_failures,
            commands_executed = s.commands_executed,
            handler_errors = s.handler_errors,
            uptime_secs = s.uptime_secs,
            "Link metrics"
        );
    }
}

/// Plain copy of [`LinkMetrics`] counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub fragments_sent: u64,
    pub fragments_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub send_failures: u64,
    pub protocol_errors: u64,
    pub reassemblies_abandoned: u64,
    pub acks_received: u64,
    pub auth_failures: u64,
    pub commands_executed: u64,
    pub handler_errors: u64,
    pub uptime_secs: u64,
}
