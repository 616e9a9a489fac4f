// Bridge metrics module
//
// Lightweight counters for the traffic crossing the foreground/background boundary

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters shared by the bridge, its handles and the engine's event sink
///
/// Uses atomic operations for thread-safe tracking without locks. A summary is
/// logged when the bridge stops.
#[derive(Debug)]
pub struct BridgeMetrics {
    /// Commands enqueued onto the engine loop
    pub commands_submitted: AtomicU64,

    /// Commands the engine completed successfully
    pub commands_completed: AtomicU64,

    /// Commands that failed with a surfaced error
    pub commands_failed: AtomicU64,

    /// Commands that referenced an unknown torrent and were ignored
    pub not_found_suppressed: AtomicU64,

    /// Events handed to the foreground queue
    pub events_delivered: AtomicU64,

    /// Events dropped because they would break per-torrent ordering
    pub events_out_of_order: AtomicU64,

    /// Events lost because the foreground queue was gone
    pub events_undeliverable: AtomicU64,

    start_time: Instant,
}

impl BridgeMetrics {
    pub fn new() -> Self {
        Self {
            commands_submitted: AtomicU64::new(0),
            commands_completed: AtomicU64::new(0),
            commands_failed: AtomicU64::new(0),
            not_found_suppressed: AtomicU64::new(0),
            events_delivered: AtomicU64::new(0),
            events_out_of_order: AtomicU64::new(0),
            events_undeliverable: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_submitted(&self) {
        self.commands_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.commands_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.commands_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_not_found(&self) {
        self.not_found_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.events_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_out_of_order(&self) {
        self.events_out_of_order.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_undeliverable(&self) {
        self.events_undeliverable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn log_summary(&self) {
        tracing::info!(
            uptime_secs = self.uptime().as_secs_f64(),
            submitted = self.commands_submitted.load(Ordering::Relaxed),
            completed = self.commands_completed.load(Ordering::Relaxed),
            failed = self.commands_failed.load(Ordering::Relaxed),
            not_found = self.not_found_suppressed.load(Ordering::Relaxed),
            "bridge command summary"
        );
        tracing::info!(
            delivered = self.events_delivered.load(Ordering::Relaxed),
            out_of_order = self.events_out_of_order.load(Ordering::Relaxed),
            undeliverable = self.events_undeliverable.load(Ordering::Relaxed),
            "bridge event summary"
        );
    }
}

impl Default for BridgeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = BridgeMetrics::new();
        assert_eq!(metrics.commands_submitted.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.events_delivered.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_command_counters() {
        let metrics = BridgeMetrics::new();

        metrics.record_submitted();
        metrics.record_submitted();
        metrics.record_completed();
        metrics.record_failed();
        metrics.record_not_found();

        assert_eq!(metrics.commands_submitted.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.commands_completed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.commands_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.not_found_suppressed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_record_event_counters_across_threads() {
        let metrics = std::sync::Arc::new(BridgeMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = metrics.clone();
                thread::spawn(move || {
                    metrics.record_delivered();
                    metrics.record_out_of_order();
                    metrics.record_undeliverable();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.events_delivered.load(Ordering::Relaxed), 4);
        assert_eq!(metrics.events_out_of_order.load(Ordering::Relaxed), 4);
        assert_eq!(metrics.events_undeliverable.load(Ordering::Relaxed), 4);
    }
}
