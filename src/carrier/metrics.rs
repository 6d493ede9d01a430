use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters for calls made through the carrier gateway.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    transport_errors: AtomicU64,
    auth_refreshes: AtomicU64,
    total_response_time_ms: AtomicU64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request_start(&self) -> Instant {
        self.total_requests.fetch_add(1, Ordering::SeqCst);
        Instant::now()
    }

    pub fn record_success(&self, start_time: Instant) {
        self.successful_requests.fetch_add(1, Ordering::SeqCst);
        self.add_elapsed(start_time);
    }

    /// The carrier answered with a non-success status.
    pub fn record_failure(&self, start_time: Instant) {
        self.failed_requests.fetch_add(1, Ordering::SeqCst);
        self.add_elapsed(start_time);
    }

    pub fn record_transport_error(&self, start_time: Instant) {
        self.transport_errors.fetch_add(1, Ordering::SeqCst);
        self.record_failure(start_time);
    }

    /// A 401 forced a token refresh and a replay.
    pub fn record_auth_refresh(&self) {
        self.auth_refreshes.fetch_add(1, Ordering::SeqCst);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::SeqCst)
    }

    pub fn auth_refreshes(&self) -> u64 {
        self.auth_refreshes.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_requests();
        let successful = self.successful_requests.load(Ordering::SeqCst);
        let failed = self.failed_requests.load(Ordering::SeqCst);
        let elapsed = self.total_response_time_ms.load(Ordering::SeqCst);

        let (success_rate, average_response_time_ms) = if total == 0 {
            (1.0, 0.0)
        } else {
            (successful as f64 / total as f64, elapsed as f64 / total as f64)
        };

        MetricsSnapshot {
            total_requests: total,
            successful_requests: successful,
            failed_requests: failed,
            transport_errors: self.transport_errors.load(Ordering::SeqCst),
            auth_refreshes: self.auth_refreshes(),
            success_rate,
            average_response_time_ms,
        }
    }

    fn add_elapsed(&self, start_time: Instant) {
        let duration_ms = start_time.elapsed().as_millis() as u64;
        self.total_response_time_ms.fetch_add(duration_ms, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub transport_errors: u64,
    pub auth_refreshes: u64,
    pub success_rate: f64,
    pub average_response_time_ms: f64,
}
