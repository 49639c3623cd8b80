//! Error taxonomy for the timeline scheduler.
//!
//! Scheduler-level failures are explicit variants; application errors raised
//! inside a flow are opaque `anyhow::Error` values that the driver stores on
//! the failing task's handle without interpreting them.

/// Alias for `Result<T, TimelineError>`.
pub type TimelineResult<T> = Result<T, TimelineError>;

/// Errors produced by the scheduler itself.
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    /// A non-finite or out-of-range input to quantization or settings
    /// validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A negative wait request. Never silently clamped.
    #[error("invalid wait duration: {0} (must be >= 0)")]
    InvalidDuration(f64),

    /// The flow's task was cancelled while it was suspended.
    #[error("flow cancelled")]
    Cancelled,
}
