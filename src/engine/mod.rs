//! Timed callback engine.
//!
//! This module provides the [`TimedCallbackService`], which fires a
//! completion once a duration has elapsed, either on the caller's thread
//! (blocking) or from the background worker pool (non-blocking).

pub mod pool;

use crate::config::TimerConfig;
use crate::error::{Result, TimerError};
use crate::metrics::{MetricsCollector, RuntimeStats};
use crate::request::{CallbackMode, RequestId, TimedCallbackRequest};
use pool::WorkerPool;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// The timed callback service
pub struct TimedCallbackService {
    /// Service configuration
    config: TimerConfig,
    /// Workers for non-blocking requests
    workers: WorkerPool,
    /// Metrics collector
    metrics: Arc<MetricsCollector>,
}

impl TimedCallbackService {
    /// Create a new service and start its workers
    pub fn new(config: TimerConfig) -> Result<Self> {
        config.validate()?;

        info!(
            worker_threads = config.worker_threads,
            max_pending = config.max_pending,
            "Initializing timed callback service"
        );

        let workers = WorkerPool::new(&config)?;

        Ok(Self {
            config,
            workers,
            metrics: Arc::new(MetricsCollector::new()),
        })
    }

    /// Sleep on the calling thread for `duration_ms`, then invoke
    /// `completion` on this same thread and return its result.
    ///
    /// A negative or oversized duration, or a missing completion, fails with
    /// `InvalidArgument` before any wait.
    #[instrument(skip(self, completion), fields(mode = "blocking"))]
    pub fn run_blocking<F, R>(&self, duration_ms: i64, completion: Option<F>) -> Result<R>
    where
        F: FnOnce() -> R,
    {
        let request = self.accept(duration_ms, completion, CallbackMode::Blocking)?;
        self.metrics.record_accepted(CallbackMode::Blocking);

        debug!(request_id = %request.id(), "Sleeping on caller thread");
        std::thread::sleep(request.remaining());

        let (value, fired) = request.fire();
        self.metrics.record_fired(&fired);
        debug!(
            request_id = %fired.id,
            elapsed_ms = fired.elapsed.as_millis() as u64,
            "Blocking completion fired"
        );

        Ok(value)
    }

    /// Schedule `completion` to fire on a background worker after
    /// `duration_ms` and return immediately with the request ID.
    ///
    /// Fails with `InvalidArgument` on bad arguments and with
    /// `SchedulingError` when the pool is full or shut down; in both cases
    /// the completion is never invoked.
    #[instrument(skip(self, completion), fields(mode = "non_blocking"))]
    pub fn run_non_blocking<F>(&self, duration_ms: i64, completion: Option<F>) -> Result<RequestId>
    where
        F: FnOnce() + Send + 'static,
    {
        let request = self.accept(duration_ms, completion, CallbackMode::NonBlocking)?;
        let id = request.id().to_string();

        let metrics = Arc::clone(&self.metrics);
        self.workers
            .schedule(request, move |fired| {
                metrics.record_fired(&fired);
                debug!(
                    request_id = %fired.id,
                    elapsed_ms = fired.elapsed.as_millis() as u64,
                    "Non-blocking completion fired"
                );
            })
            .map_err(|e| self.reject(e))?;

        self.metrics.record_accepted(CallbackMode::NonBlocking);
        debug!(request_id = %id, "Scheduled on worker pool");

        Ok(id)
    }

    fn accept<F>(
        &self,
        duration_ms: i64,
        completion: Option<F>,
        mode: CallbackMode,
    ) -> Result<TimedCallbackRequest<F>> {
        TimedCallbackRequest::new(duration_ms, completion, mode, self.config.max_duration_ms)
            .map_err(|e| self.reject(e))
    }

    fn reject(&self, err: TimerError) -> TimerError {
        warn!(code = %err.code(), error = %err, "Request rejected");
        self.metrics.record_rejected(err.code());
        err
    }

    /// Non-blocking requests that have not fired yet
    pub fn in_flight(&self) -> usize {
        self.workers.in_flight()
    }

    /// Get service statistics
    pub fn stats(&self) -> RuntimeStats {
        self.metrics.snapshot(self.workers.in_flight())
    }

    /// Get Prometheus metrics
    pub fn prometheus_metrics(&self) -> String {
        self.metrics.to_prometheus(self.workers.in_flight())
    }

    /// Stop accepting non-blocking requests and wait until every accepted
    /// one has fired. Blocking requests keep working.
    pub fn shutdown(&self) {
        info!("Shutting down timed callback service");
        self.workers.shutdown();
    }
}
