//! Background worker pool for non-blocking requests.
//!
//! Waits run as timer tasks on a dedicated multi-threaded tokio runtime. The
//! pool counts in-flight requests so it can refuse work beyond its capacity
//! and drain everything it accepted before stopping.

use crate::config::TimerConfig;
use crate::error::{Result, TimerError};
use crate::request::{FiredRequest, TimedCallbackRequest};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, info};

struct PoolState {
    in_flight: usize,
    shutdown: bool,
}

/// Inner pool state
struct WorkerPoolInner {
    /// In-flight limit
    max_pending: usize,
    /// Registration state; the lock is never held across a wait
    state: Mutex<PoolState>,
    /// Signalled when the last in-flight request finishes
    drained: Condvar,
}

/// Holds one in-flight slot; released on drop, including when a completion panics
struct Slot {
    inner: Arc<WorkerPoolInner>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        state.in_flight -= 1;
        if state.in_flight == 0 {
            self.inner.drained.notify_all();
        }
    }
}

/// Worker pool running non-blocking waits
pub struct WorkerPool {
    inner: Arc<WorkerPoolInner>,
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
}

impl WorkerPool {
    /// Start the worker runtime
    pub fn new(config: &TimerConfig) -> Result<Self> {
        info!(
            worker_threads = config.worker_threads,
            max_pending = config.max_pending,
            "Starting worker pool"
        );

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name(config.thread_name.clone())
            .enable_time()
            .build()?;

        let inner = Arc::new(WorkerPoolInner {
            max_pending: config.max_pending,
            state: Mutex::new(PoolState {
                in_flight: 0,
                shutdown: false,
            }),
            drained: Condvar::new(),
        });

        Ok(Self {
            inner,
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
        })
    }

    /// Claim an in-flight slot. This is the only critical section on the
    /// scheduling path.
    fn reserve(&self) -> Result<Slot> {
        let mut state = self.inner.state.lock();

        if state.shutdown {
            return Err(TimerError::scheduling("worker pool is shut down"));
        }

        if state.in_flight >= self.inner.max_pending {
            return Err(TimerError::scheduling(format!(
                "{} requests already in flight (limit {})",
                state.in_flight, self.inner.max_pending
            )));
        }

        state.in_flight += 1;
        Ok(Slot {
            inner: Arc::clone(&self.inner),
        })
    }

    /// Hand a request to a worker.
    ///
    /// On success the completion fires exactly once, after the request's
    /// deadline, followed by `on_fired`. On error nothing is scheduled.
    pub fn schedule<F, H>(&self, request: TimedCallbackRequest<F>, on_fired: H) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
        H: FnOnce(FiredRequest) + Send + 'static,
    {
        let slot = self.reserve()?;

        self.handle.spawn(async move {
            let _slot = slot;

            loop {
                let remaining = request.remaining();
                if remaining.is_zero() {
                    break;
                }
                tokio::time::sleep(remaining).await;
            }

            let ((), fired) = request.fire();
            on_fired(fired);
        });

        Ok(())
    }

    /// Requests accepted but not yet finished
    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight
    }

    /// Whether the pool has stopped accepting requests
    pub fn is_shut_down(&self) -> bool {
        self.inner.state.lock().shutdown
    }

    /// Stop accepting requests, wait for every accepted one to fire, then
    /// stop the runtime.
    ///
    /// Must not be called from inside a completion running on this pool.
    pub fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock();
            state.shutdown = true;
            if state.in_flight > 0 {
                debug!(in_flight = state.in_flight, "Draining worker pool");
            }
            while state.in_flight > 0 {
                self.inner.drained.wait(&mut state);
            }
        }

        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
            info!("Worker pool shut down");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::CallbackMode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    fn create_pool(max_pending: usize) -> WorkerPool {
        WorkerPool::new(&TimerConfig::new().with_max_pending(max_pending)).unwrap()
    }

    fn request<F>(duration_ms: i64, completion: F) -> TimedCallbackRequest<F> {
        TimedCallbackRequest::new(duration_ms, Some(completion), CallbackMode::NonBlocking, 60_000)
            .unwrap()
    }

    #[test]
    fn test_pool_creation() {
        let pool = create_pool(4);
        assert_eq!(pool.in_flight(), 0);
        assert!(!pool.is_shut_down());
    }

    #[test]
    fn test_schedule_fires_and_releases_slot() {
        let pool = create_pool(4);
        let (tx, rx) = mpsc::channel();

        pool.schedule(request(10, || ()), move |fired| {
            tx.send(fired).unwrap();
        })
        .unwrap();

        let fired = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(fired.elapsed >= Duration::from_millis(10));

        pool.shutdown();
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn test_capacity_exhausted() {
        let pool = create_pool(1);
        let fired = Arc::new(AtomicUsize::new(0));

        let f = Arc::clone(&fired);
        let completion = move || {
            f.fetch_add(1, Ordering::SeqCst);
        };
        pool.schedule(request(200, completion), |_| ()).unwrap();

        let f = Arc::clone(&fired);
        let completion = move || {
            f.fetch_add(100, Ordering::SeqCst);
        };
        let err = pool.schedule(request(0, completion), |_| ()).unwrap_err();
        assert!(matches!(err, TimerError::Scheduling(_)));

        pool.shutdown();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_drains_then_rejects() {
        let pool = create_pool(8);
        let fired = Arc::new(AtomicUsize::new(0));

        for ms in [30, 60, 90] {
            let f = Arc::clone(&fired);
            let completion = move || {
                f.fetch_add(1, Ordering::SeqCst);
            };
            pool.schedule(request(ms, completion), |_| ()).unwrap();
        }

        pool.shutdown();
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        assert!(pool.is_shut_down());
        assert!(pool.schedule(request(0, || ()), |_| ()).is_err());
    }

    #[test]
    fn test_panicking_completion_releases_slot() {
        let pool = create_pool(1);
        pool.schedule(request(0, || panic!("completion failed")), |_| ()).unwrap();

        pool.shutdown();
        assert_eq!(pool.in_flight(), 0);
    }
}
