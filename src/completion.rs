//! Completion hand-off between background workers and the owning thread.
//!
//! A worker that fires a completion wrapped by [`QueueHandle::deliver`] does
//! not run the user code itself; it posts it to a [`CompletionQueue`] and the
//! thread that owns the queue runs it. The Node binding gets the same effect
//! from napi's thread-safe functions.

use tokio::sync::mpsc;
use tracing::warn;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Create a connected handle/queue pair
pub fn completion_queue() -> (QueueHandle, CompletionQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (QueueHandle { tx }, CompletionQueue { rx })
}

/// Sending side, cloned into completions
#[derive(Clone)]
pub struct QueueHandle {
    tx: mpsc::UnboundedSender<Job>,
}

impl QueueHandle {
    /// Wrap `completion` so that firing it posts it to the queue.
    ///
    /// If the queue has been dropped by the time the wrapper fires, the
    /// completion is discarded and a warning is logged.
    pub fn deliver<F>(&self, completion: F) -> impl FnOnce() + Send + 'static
    where
        F: FnOnce() + Send + 'static,
    {
        let tx = self.tx.clone();
        move || {
            if tx.send(Box::new(completion)).is_err() {
                warn!("Completion queue closed, dropping completion");
            }
        }
    }
}

/// Receiving side, drained by the owning thread
pub struct CompletionQueue {
    rx: mpsc::UnboundedReceiver<Job>,
}

impl CompletionQueue {
    /// Run every completion posted so far without waiting; returns how many ran
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Wait for the next completion and run it.
    ///
    /// Returns `false` once every handle is gone and the queue is empty.
    pub async fn recv(&mut self) -> bool {
        match self.rx.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Blocking variant of [`recv`](Self::recv) for threads outside a runtime
    pub fn blocking_recv(&mut self) -> bool {
        match self.rx.blocking_recv() {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_delivered_completion_runs_on_owner_thread() {
        let (handle, mut queue) = completion_queue();
        let owner = thread::current().id();
        let ran_on = Arc::new(parking_lot::Mutex::new(None));

        let slot = Arc::clone(&ran_on);
        let wrapped = handle.deliver(move || {
            *slot.lock() = Some(thread::current().id());
        });

        thread::spawn(wrapped).join().unwrap();
        assert!(ran_on.lock().is_none(), "must not run on the worker");

        assert_eq!(queue.run_pending(), 1);
        assert_eq!(*ran_on.lock(), Some(owner));
    }

    #[test]
    fn test_each_completion_runs_once() {
        let (handle, mut queue) = completion_queue();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let count = Arc::clone(&count);
            (handle.deliver(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }))();
        }

        assert_eq!(queue.run_pending(), 5);
        assert_eq!(queue.run_pending(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_closed_queue_drops_completion() {
        let (handle, queue) = completion_queue();
        drop(queue);

        let wrapped = handle.deliver(|| panic!("must not run"));
        wrapped();
    }

    #[test]
    fn test_blocking_recv_ends_when_handles_dropped() {
        let (handle, mut queue) = completion_queue();
        (handle.deliver(|| ()))();
        drop(handle);

        assert!(queue.blocking_recv());
        assert!(!queue.blocking_recv());
    }

    #[tokio::test]
    async fn test_async_recv() {
        let (handle, mut queue) = completion_queue();
        let count = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&count);
        let wrapped = handle.deliver(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        tokio::task::spawn_blocking(wrapped).await.unwrap();

        assert!(queue.recv().await);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
