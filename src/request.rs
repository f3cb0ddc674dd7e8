//! Timed callback requests.
//!
//! A request is created when a call is accepted, waits for its duration and
//! is consumed when its completion fires. Consuming the request is the only
//! way to reach the completion, so a request can fire at most once.

use crate::error::{Result, TimerError};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Unique request ID
pub type RequestId = String;

/// How the caller waits for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackMode {
    /// The calling thread sleeps, then fires the completion itself
    Blocking,
    /// A background worker waits; the caller continues immediately
    NonBlocking,
}

impl std::fmt::Display for CallbackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallbackMode::Blocking => write!(f, "blocking"),
            CallbackMode::NonBlocking => write!(f, "non_blocking"),
        }
    }
}

/// Check a caller-supplied duration and convert it
pub fn validate_duration(duration_ms: i64, max_duration_ms: u64) -> Result<Duration> {
    if duration_ms < 0 {
        return Err(TimerError::invalid_argument(format!(
            "duration must be non-negative, got {}ms",
            duration_ms
        )));
    }

    let duration_ms = duration_ms as u64;
    if duration_ms > max_duration_ms {
        return Err(TimerError::invalid_argument(format!(
            "duration {}ms exceeds the {}ms limit",
            duration_ms, max_duration_ms
        )));
    }

    Ok(Duration::from_millis(duration_ms))
}

/// A pending request: a duration plus the completion to fire after it
pub struct TimedCallbackRequest<F> {
    id: RequestId,
    duration: Duration,
    mode: CallbackMode,
    created_at: Instant,
    completion: F,
}

impl<F> TimedCallbackRequest<F> {
    /// Validate the arguments and accept a new request.
    ///
    /// A missing completion or an out-of-range duration is rejected before
    /// anything is scheduled.
    pub fn new(
        duration_ms: i64,
        completion: Option<F>,
        mode: CallbackMode,
        max_duration_ms: u64,
    ) -> Result<Self> {
        let duration = validate_duration(duration_ms, max_duration_ms)?;
        let completion = completion
            .ok_or_else(|| TimerError::invalid_argument("a completion callback is required"))?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            duration,
            mode,
            created_at: Instant::now(),
            completion,
        })
    }

    /// Get the request ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Requested wait
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Get the mode
    pub fn mode(&self) -> CallbackMode {
        self.mode
    }

    /// When the request was accepted
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Earliest instant the completion may fire
    pub fn deadline(&self) -> Instant {
        self.created_at + self.duration
    }

    /// Time left until the deadline (zero once it has passed)
    pub fn remaining(&self) -> Duration {
        self.deadline().saturating_duration_since(Instant::now())
    }

    /// Consume the request and invoke its completion.
    ///
    /// Callers must have waited until [`deadline`](Self::deadline).
    pub(crate) fn fire<R>(self) -> (R, FiredRequest)
    where
        F: FnOnce() -> R,
    {
        let elapsed = self.created_at.elapsed();
        debug_assert!(elapsed >= self.duration, "request fired before its deadline");

        let value = (self.completion)();
        let fired = FiredRequest {
            id: self.id,
            mode: self.mode,
            requested: self.duration,
            elapsed,
        };
        (value, fired)
    }
}

impl<F> std::fmt::Debug for TimedCallbackRequest<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedCallbackRequest")
            .field("id", &self.id)
            .field("duration", &self.duration)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Report of a request whose completion has fired
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FiredRequest {
    /// Request ID
    pub id: RequestId,
    /// Mode the request ran in
    pub mode: CallbackMode,
    /// Requested wait
    pub requested: Duration,
    /// Time from acceptance to firing
    pub elapsed: Duration,
}

impl FiredRequest {
    /// How far past its deadline the completion fired
    pub fn lateness(&self) -> Duration {
        self.elapsed.saturating_sub(self.requested)
    }
}
