//! N-API bindings for Node.js integration.
//!
//! This module exposes the timed callback service to Node.js. Blocking calls
//! run the callback directly on the JS thread; non-blocking calls wrap it in
//! a thread-safe function so the worker posts the call back to the JS event
//! loop instead of invoking it from its own thread.

use crate::config::TimerConfig;
use crate::engine::TimedCallbackService;
use crate::error::{ErrorCode, TimerError};
use napi::bindgen_prelude::*;
use napi::threadsafe_function::{
    ErrorStrategy, ThreadSafeCallContext, ThreadsafeFunction, ThreadsafeFunctionCallMode,
};
use napi::{JsFunction, JsUnknown, ValueType};
use napi_derive::napi;
use once_cell::sync::OnceCell;
use tracing::warn;

/// Shared service used by every export
static SERVICE: OnceCell<TimedCallbackService> = OnceCell::new();

fn service() -> Result<&'static TimedCallbackService> {
    SERVICE
        .get_or_try_init(|| TimedCallbackService::new(TimerConfig::default()))
        .map_err(to_napi_error)
}

fn to_napi_error(err: TimerError) -> napi::Error {
    let status = match err.code() {
        ErrorCode::InvalidArgument | ErrorCode::ConfigError => Status::InvalidArg,
        ErrorCode::SchedulingError | ErrorCode::InternalError => Status::GenericFailure,
    };
    napi::Error::new(status, format!("[{}] {}", err.code(), err))
}

/// Reject a JS value whose type tag is not the expected one
fn expect_type(actual: ValueType, expected: ValueType, what: &str) -> Result<()> {
    if actual == expected {
        return Ok(());
    }
    Err(to_napi_error(TimerError::invalid_argument(format!(
        "{} must be a {:?}, got {:?}",
        what, expected, actual
    ))))
}

/// `undefined` and `null` mean no callback was passed; anything else must
/// be a function
fn callback_present(actual: ValueType) -> Result<bool> {
    match actual {
        ValueType::Undefined | ValueType::Null => Ok(false),
        _ => expect_type(actual, ValueType::Function, "callback").map(|()| true),
    }
}

fn duration_from_js(ms: JsUnknown) -> Result<i64> {
    expect_type(ms.get_type()?, ValueType::Number, "sleep time")?;
    duration_arg(ms.coerce_to_number()?.get_double()?)
}

fn callback_from_js(callback: JsUnknown) -> Result<Option<JsFunction>> {
    if callback_present(callback.get_type()?)? {
        Ok(Some(JsFunction::try_from(callback)?))
    } else {
        Ok(None)
    }
}

/// JS numbers arrive as doubles; only whole numbers are durations
fn duration_arg(ms: f64) -> Result<i64> {
    if !ms.is_finite() || ms.fract() != 0.0 {
        return Err(to_napi_error(TimerError::invalid_argument(format!(
            "sleep time must be an integer, got {}",
            ms
        ))));
    }
    Ok(ms as i64)
}

/// JavaScript-friendly configuration
#[napi(object)]
pub struct JsTimerConfig {
    /// Number of background worker threads
    pub worker_threads: Option<u32>,
    /// Maximum in-flight non-blocking requests
    pub max_pending: Option<u32>,
    /// Largest accepted sleep time in milliseconds
    pub max_duration_ms: Option<u32>,
    /// Worker thread name
    pub thread_name: Option<String>,
}

impl From<JsTimerConfig> for TimerConfig {
    fn from(js: JsTimerConfig) -> Self {
        let defaults = TimerConfig::default();
        TimerConfig {
            worker_threads: js
                .worker_threads
                .map_or(defaults.worker_threads, |v| v as usize),
            max_pending: js.max_pending.map_or(defaults.max_pending, |v| v as usize),
            max_duration_ms: js
                .max_duration_ms
                .map_or(defaults.max_duration_ms, u64::from),
            thread_name: js.thread_name.unwrap_or(defaults.thread_name),
        }
    }
}

/// JavaScript-friendly service statistics
#[napi(object)]
pub struct JsRuntimeStats {
    /// Requests accepted in blocking mode
    pub blocking_accepted: i64,
    /// Requests accepted in non-blocking mode
    pub non_blocking_accepted: i64,
    /// Completions fired
    pub fired: i64,
    /// Requests rejected at call time
    pub rejected: i64,
    /// Non-blocking requests still waiting
    pub in_flight: u32,
    /// Average wait in microseconds
    pub avg_wait_us: f64,
    /// Largest delay past a deadline in microseconds
    pub max_lateness_us: i64,
}

/// Classic first export
#[napi]
pub fn get_hello() -> String {
    "Hello World!".to_string()
}

/// Sleep on the JS thread, then call `callback` before returning
#[napi(ts_args_type = "ms: number, callback: () => void")]
pub fn sleep_callback(ms: JsUnknown, callback: JsUnknown) -> Result<()> {
    let duration_ms = duration_from_js(ms)?;
    let completion = callback_from_js(callback)?.map(|cb| move || cb.call_without_args(None));

    service()?
        .run_blocking(duration_ms, completion)
        .map_err(to_napi_error)?
        .map(|_| ())
}

/// Return immediately; `callback` is called on the JS thread once `ms` has
/// elapsed
#[napi(ts_args_type = "ms: number, callback: () => void")]
pub fn sleep_callback_async(ms: JsUnknown, callback: JsUnknown) -> Result<()> {
    let duration_ms = duration_from_js(ms)?;

    let completion = callback_from_js(callback)?
        .map(|cb| -> Result<_> {
            let tsfn: ThreadsafeFunction<(), ErrorStrategy::Fatal> = cb
                .create_threadsafe_function(0, |_ctx: ThreadSafeCallContext<()>| {
                    Ok(Vec::<JsUnknown>::new())
                })?;

            Ok(move || {
                let status = tsfn.call((), ThreadsafeFunctionCallMode::NonBlocking);
                if status != Status::Ok {
                    warn!(status = ?status, "Failed to queue callback on the JS thread");
                }
            })
        })
        .transpose()?;

    service()?
        .run_non_blocking(duration_ms, completion)
        .map_err(to_napi_error)?;

    Ok(())
}

/// Initialize the shared service with a custom configuration.
///
/// Must be called before any sleep export; fails once the service exists.
#[napi]
pub fn configure(config: Option<JsTimerConfig>) -> Result<()> {
    let config = config.map(TimerConfig::from).unwrap_or_default();
    let service = TimedCallbackService::new(config).map_err(to_napi_error)?;

    SERVICE
        .set(service)
        .map_err(|_| napi::Error::from_reason("Timed callback service is already initialized"))
}

/// Get service statistics
#[napi]
pub fn get_stats() -> Result<JsRuntimeStats> {
    let stats = service()?.stats();

    Ok(JsRuntimeStats {
        blocking_accepted: stats.blocking_accepted as i64,
        non_blocking_accepted: stats.non_blocking_accepted as i64,
        fired: stats.fired as i64,
        rejected: stats.rejected as i64,
        in_flight: stats.in_flight as u32,
        avg_wait_us: stats.avg_wait_us,
        max_lateness_us: stats.max_lateness_us as i64,
    })
}

/// Get Prometheus metrics
#[napi]
pub fn get_prometheus_metrics() -> Result<String> {
    Ok(service()?.prometheus_metrics())
}

/// Stop accepting non-blocking sleeps and resolve once all pending
/// callbacks have been queued
#[napi]
pub async fn shutdown() -> Result<()> {
    if let Some(service) = SERVICE.get() {
        tokio::task::spawn_blocking(move || service.shutdown())
            .await
            .map_err(|e| napi::Error::from_reason(format!("Shutdown failed: {}", e)))?;
    }

    Ok(())
}

/// Initialize the module
#[napi]
pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("timed_callback_bridge=info"));

    // a host may load the addon more than once
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
