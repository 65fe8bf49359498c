//! Observability and Metrics
//!
//! This module provides metrics collection and observability features
//! for monitoring the interception layer's throughput and health.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Global metrics collector for interception operations
#[derive(Debug)]
pub struct Metrics {
    /// Total sessions accepted
    pub sessions_total: AtomicU64,
    /// Currently active sessions
    pub sessions_active: AtomicU64,
    /// Sessions rejected at the connection limit
    pub sessions_rejected: AtomicU64,
    /// Serverbound packets decoded
    pub packets_received: AtomicU64,
    /// Clientbound packets forwarded
    pub packets_sent: AtomicU64,
    /// Packets mutated by an interceptor
    pub packets_rewritten: AtomicU64,
    /// Packets cancelled by an interceptor
    pub packets_cancelled: AtomicU64,
    /// Synthetic packets injected into sessions
    pub packets_injected: AtomicU64,
    /// Bytes read off sockets
    pub bytes_received: AtomicU64,
    /// Bytes written to sockets
    pub bytes_sent: AtomicU64,
    /// Interceptor callbacks that returned an error
    pub interceptor_errors: AtomicU64,
    /// Protocol violations that terminated a session
    pub protocol_errors: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            sessions_total: AtomicU64::new(0),
            sessions_active: AtomicU64::new(0),
            sessions_rejected: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            packets_rewritten: AtomicU64::new(0),
            packets_cancelled: AtomicU64::new(0),
            packets_injected: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            interceptor_errors: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a new session
    pub fn session_opened(&self) {
        self.sessions_total.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session closed
    pub fn session_closed(&self) {
        self.sessions_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a session turned away at the limit
    pub fn session_rejected(&self) {
        self.sessions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a serverbound packet
    pub fn packet_received(&self, byte_count: u64) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a clientbound packet
    pub fn packet_sent(&self, byte_count: u64) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record an interceptor mutation
    pub fn packet_rewritten(&self) {
        self.packets_rewritten.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an interceptor cancellation
    pub fn packet_cancelled(&self) {
        self.packets_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an injected packet
    pub fn packet_injected(&self) {
        self.packets_injected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an interceptor failure
    pub fn interceptor_error(&self) {
        self.interceptor_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a protocol violation
    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_total: self.sessions_total.load(Ordering::Relaxed),
            sessions_active: self.sessions_active.load(Ordering::Relaxed),
            sessions_rejected: self.sessions_rejected.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_rewritten: self.packets_rewritten.load(Ordering::Relaxed),
            packets_cancelled: self.packets_cancelled.load(Ordering::Relaxed),
            packets_injected: self.packets_injected.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            interceptor_errors: self.interceptor_errors.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            sessions_total = snapshot.sessions_total,
            sessions_active = snapshot.sessions_active,
            sessions_rejected = snapshot.sessions_rejected,
            packets_received = snapshot.packets_received,
            packets_sent = snapshot.packets_sent,
            packets_rewritten = snapshot.packets_rewritten,
            packets_cancelled = snapshot.packets_cancelled,
            packets_injected = snapshot.packets_injected,
            bytes_received = snapshot.bytes_received,
            bytes_sent = snapshot.bytes_sent,
            interceptor_errors = snapshot.interceptor_errors,
            protocol_errors = snapshot.protocol_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Interception metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub sessions_total: u64,
    pub sessions_active: u64,
    pub sessions_rejected: u64,
    pub packets_received: u64,
    pub packets_sent: u64,
    pub packets_rewritten: u64,
    pub packets_cancelled: u64,
    pub packets_injected: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub interceptor_errors: u64,
    pub protocol_errors: u64,
    pub uptime_seconds: u64,
}

/// Global metrics instance (lazy static for simplicity)
static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}
