//! frameflow
//!
//! A deterministic, frame-quantized timeline scheduler for cooperative
//! animation flows:
//! - Drift-free conversion of wall-time durations into whole frame counts
//! - A request/response suspension protocol (flows ask the driver for the
//!   execution context; context requests never consume a tick)
//! - An externally clocked driver that resumes every live flow once per
//!   tick, in submission order, with cooperative cancellation

pub mod context;
pub mod driver;
pub mod error;
pub mod flow;
pub mod quantize;
pub mod task;


pub use context::{ExecutionContext, TimelineSettings};
pub use driver::{create_timeline, Timeline};
pub use error::{TimelineError, TimelineResult};
pub use flow::{ContextRequest, FlowScope, FrameSuspend};
pub use quantize::{quantize, Quantized};
pub use task::{TaskHandle, TaskId, TaskState};
