//! # Timed Callback Bridge
//!
//! This library fires a completion callback once a duration has elapsed, in
//! one of two modes, and exposes both to Node.js through N-API.
//!
//! ## Architecture
//!
//! ```text
//! Node.js
//!     │
//!     │ N-API FFI
//!     ▼
//! Rust Bridge (this crate)
//!     │
//!     ├── blocking: sleep on the caller's thread, call back inline
//!     │
//!     └── non-blocking: timer task on a worker pool,
//!         call posted back to the JS thread
//! ```
//!
//! ## Features
//!
//! - **Exactly-once completions**: a request is consumed when it fires
//! - **Deadline-based waits**: completions never fire before their duration
//! - **Bounded worker pool**: scheduling fails fast instead of queueing forever
//! - **Thread-safe hand-off**: completions can be posted to their owning thread

#![deny(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod napi;
pub mod request;

// Re-export commonly used types
pub use completion::{completion_queue, CompletionQueue, QueueHandle};
pub use config::TimerConfig;
pub use engine::TimedCallbackService;
pub use error::{ErrorCode, TimerError};
pub use metrics::RuntimeStats;
pub use request::{CallbackMode, FiredRequest, RequestId, TimedCallbackRequest};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "1.0.0");
    }

    #[test]
    fn test_non_blocking_through_completion_queue() {
        let service = TimedCallbackService::new(TimerConfig::default()).unwrap();
        let (handle, mut queue) = completion_queue();
        let owner = std::thread::current().id();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&calls);
        service
            .run_non_blocking(
                20,
                Some(handle.deliver(move || {
                    assert_eq!(std::thread::current().id(), owner);
                    c.fetch_add(1, Ordering::SeqCst);
                })),
            )
            .unwrap();
        drop(handle);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(queue.blocking_recv());
        assert!(!queue.blocking_recv());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        service.shutdown();
        assert!(service.stats().avg_wait_us >= Duration::from_millis(20).as_micros() as f64);
    }
}
