//! Request metrics for monitoring and observability.
//!
//! This module aggregates counters about accepted, fired and rejected
//! requests and renders them in Prometheus text format.

use crate::error::ErrorCode;
use crate::request::{CallbackMode, FiredRequest};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Runtime statistics for the whole service
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStats {
    /// Requests accepted in blocking mode
    pub blocking_accepted: u64,

    /// Requests accepted in non-blocking mode
    pub non_blocking_accepted: u64,

    /// Completions fired
    pub fired: u64,

    /// Requests rejected at call time
    pub rejected: u64,

    /// Non-blocking requests waiting on a worker right now
    pub in_flight: usize,

    /// Average time from acceptance to firing in microseconds
    pub avg_wait_us: f64,

    /// Largest observed delay past a deadline in microseconds
    pub max_lateness_us: u64,
}

/// Metrics collector for aggregating service metrics
pub struct MetricsCollector {
    blocking_accepted: AtomicU64,
    non_blocking_accepted: AtomicU64,
    fired: AtomicU64,
    total_wait_us: AtomicU64,
    max_lateness_us: AtomicU64,
    rejections: parking_lot::Mutex<HashMap<ErrorCode, u64>>,
}

impl MetricsCollector {
    /// Create a new collector
    pub fn new() -> Self {
        Self {
            blocking_accepted: AtomicU64::new(0),
            non_blocking_accepted: AtomicU64::new(0),
            fired: AtomicU64::new(0),
            total_wait_us: AtomicU64::new(0),
            max_lateness_us: AtomicU64::new(0),
            rejections: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Record an accepted request
    pub fn record_accepted(&self, mode: CallbackMode) {
        let counter = match mode {
            CallbackMode::Blocking => &self.blocking_accepted,
            CallbackMode::NonBlocking => &self.non_blocking_accepted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a fired completion
    pub fn record_fired(&self, fired: &FiredRequest) {
        self.fired.fetch_add(1, Ordering::Relaxed);
        self.total_wait_us
            .fetch_add(fired.elapsed.as_micros() as u64, Ordering::Relaxed);
        self.max_lateness_us
            .fetch_max(fired.lateness().as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a rejected request
    pub fn record_rejected(&self, code: ErrorCode) {
        *self.rejections.lock().entry(code).or_insert(0) += 1;
    }

    /// Requests accepted in the given mode
    pub fn accepted(&self, mode: CallbackMode) -> u64 {
        match mode {
            CallbackMode::Blocking => self.blocking_accepted.load(Ordering::Relaxed),
            CallbackMode::NonBlocking => self.non_blocking_accepted.load(Ordering::Relaxed),
        }
    }

    /// Completions fired so far
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    /// Rejections with the given code
    pub fn rejected(&self, code: ErrorCode) -> u64 {
        self.rejections.lock().get(&code).copied().unwrap_or(0)
    }

    /// Rejections across all codes
    pub fn total_rejected(&self) -> u64 {
        self.rejections.lock().values().sum()
    }

    /// Average wait in microseconds
    pub fn avg_wait_us(&self) -> f64 {
        let fired = self.fired();
        if fired == 0 {
            return 0.0;
        }
        self.total_wait_us.load(Ordering::Relaxed) as f64 / fired as f64
    }

    /// Build a stats snapshot
    pub fn snapshot(&self, in_flight: usize) -> RuntimeStats {
        RuntimeStats {
            blocking_accepted: self.accepted(CallbackMode::Blocking),
            non_blocking_accepted: self.accepted(CallbackMode::NonBlocking),
            fired: self.fired(),
            rejected: self.total_rejected(),
            in_flight,
            avg_wait_us: self.avg_wait_us(),
            max_lateness_us: self.max_lateness_us.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format
    pub fn to_prometheus(&self, in_flight: usize) -> String {
        let mut output = String::new();

        output.push_str("# HELP timed_callback_accepted_total Requests accepted\n");
        output.push_str("# TYPE timed_callback_accepted_total counter\n");
        for mode in [CallbackMode::Blocking, CallbackMode::NonBlocking] {
            output.push_str(&format!(
                "timed_callback_accepted_total{{mode=\"{}\"}} {}\n",
                mode,
                self.accepted(mode)
            ));
        }

        output.push_str("\n# HELP timed_callback_fired_total Completions fired\n");
        output.push_str("# TYPE timed_callback_fired_total counter\n");
        output.push_str(&format!("timed_callback_fired_total {}\n", self.fired()));

        output.push_str("\n# HELP timed_callback_in_flight Non-blocking requests waiting\n");
        output.push_str("# TYPE timed_callback_in_flight gauge\n");
        output.push_str(&format!("timed_callback_in_flight {}\n", in_flight));

        output.push_str("\n# HELP timed_callback_max_lateness_us Largest delay past a deadline\n");
        output.push_str("# TYPE timed_callback_max_lateness_us gauge\n");
        output.push_str(&format!(
            "timed_callback_max_lateness_us {}\n",
            self.max_lateness_us.load(Ordering::Relaxed)
        ));

        output.push_str("\n# HELP timed_callback_rejected_total Rejections by code\n");
        output.push_str("# TYPE timed_callback_rejected_total counter\n");
        let rejections = self.rejections.lock();
        let mut codes: Vec<_> = rejections.iter().collect();
        codes.sort_by_key(|(code, _)| code.to_string());
        for (code, count) in codes {
            output.push_str(&format!(
                "timed_callback_rejected_total{{code=\"{}\"}} {}\n",
                code, count
            ));
        }

        output
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
