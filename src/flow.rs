//! Flow suspension protocol
//!
//! A flow is a suspendable unit of timeline work: an owned future driven one
//! resume at a time by the driver. Every suspension point is a typed request
//! written into the task's `FlowSignal`, which the driver pattern-matches
//! after each resume:
//!
//! - `FlowRequest::Context` - the flow wants the current [`ExecutionContext`].
//!   The driver answers it and re-resumes the flow within the same tick;
//!   context requests never consume a tick.
//! - `FlowRequest::Frames` - the flow wants to sleep until the driver's next
//!   tick. This is the atomic primitive under [`FlowScope::wait`], which
//!   requests the context once, quantizes the duration, then performs exactly
//!   that many single-tick suspends.
//!
//! The signal is the request/response channel that lets deeply nested flow
//! code reach shared execution state without threading it through every call
//! and without any global mutable state: helpers just clone the `FlowScope`.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::context::ExecutionContext;
use crate::error::{TimelineError, TimelineResult};
use crate::quantize::quantize;

/// What a flow most recently yielded to the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FlowRequest {
    /// Hand me the current execution context, synchronously.
    Context,
    /// Resume me only after `remaining` more ticks.
    Frames { remaining: u64 },
}

struct SignalInner {
    request: Option<FlowRequest>,
    context_reply: Option<ExecutionContext>,
    frame_granted: bool,
    cancelled: bool,
}

/// Shared request/response cell between a task's flow and the driver.
#[derive(Clone)]
pub(crate) struct FlowSignal {
    inner: Rc<RefCell<SignalInner>>,
}

impl FlowSignal {
    pub(crate) fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SignalInner {
                request: None,
                context_reply: None,
                frame_granted: false,
                cancelled: false,
            })),
        }
    }

    fn set_request(&self, request: FlowRequest) {
        self.inner.borrow_mut().request = Some(request);
    }

    /// Driver side: take the request the flow yielded on this resume.
    pub(crate) fn take_request(&self) -> Option<FlowRequest> {
        self.inner.borrow_mut().request.take()
    }

    /// Driver side: answer a pending context request.
    pub(crate) fn put_context(&self, ctx: ExecutionContext) {
        self.inner.borrow_mut().context_reply = Some(ctx);
    }

    fn take_context(&self) -> Option<ExecutionContext> {
        self.inner.borrow_mut().context_reply.take()
    }

    /// Driver side: grant one frame to a suspended flow at the start of a
    /// tick.
    pub(crate) fn grant_frame(&self) {
        self.inner.borrow_mut().frame_granted = true;
    }

    fn take_frame_grant(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        std::mem::replace(&mut inner.frame_granted, false)
    }

    /// Driver side: mark the task cancelled so any in-flight wait resolves
    /// with an error if it is ever polled again.
    pub(crate) fn set_cancelled(&self) {
        self.inner.borrow_mut().cancelled = true;
    }

    fn is_cancelled(&self) -> bool {
        self.inner.borrow().cancelled
    }
}

/// Per-flow handle for building suspension points.
///
/// The driver creates one scope per submitted flow and passes it to the flow
/// closure. The scope is cheap to clone, so nested helper flows take a clone
/// instead of having timeline state threaded through their arguments.
///
/// The scope also owns the flow's quantization carry: leftover sub-frame
/// time from one [`wait`](FlowScope::wait) is applied to the next, so chains
/// of short waits on the same flow never accumulate rounding drift.
#[derive(Clone)]
pub struct FlowScope {
    signal: FlowSignal,
    carry: Rc<Cell<f64>>,
}

impl FlowScope {
    pub(crate) fn new(signal: FlowSignal) -> Self {
        Self {
            signal,
            carry: Rc::new(Cell::new(0.0)),
        }
    }

    /// Request the current [`ExecutionContext`]. Resolves synchronously
    /// within the same tick; never suspends the flow across a frame.
    pub fn request_context(&self) -> ContextRequest {
        ContextRequest {
            signal: self.signal.clone(),
        }
    }

    /// Suspend until the driver's next tick.
    pub fn next_frame(&self) -> FrameSuspend {
        self.wait_frames(1)
    }

    /// Suspend for exactly `frames` ticks. `wait_frames(0)` resolves
    /// immediately without suspending.
    pub fn wait_frames(&self, frames: u64) -> FrameSuspend {
        FrameSuspend {
            signal: self.signal.clone(),
            remaining: frames,
            started: false,
        }
    }

    /// Suspend for `duration` simulated seconds, quantized to whole frames.
    ///
    /// Requests the context once to learn the frame rate, quantizes the
    /// duration together with this scope's carried remainder, then performs
    /// exactly the quantized number of single-tick suspends. A `wait(0.0)`
    /// with no accumulated carry completes on the same tick it was entered.
    ///
    /// Negative durations fail with [`TimelineError::InvalidDuration`];
    /// non-finite durations with [`TimelineError::InvalidArgument`].
    pub async fn wait(&self, duration: f64) -> TimelineResult<()> {
        let ctx = self.request_context().await?;
        let q = quantize(duration, ctx.frame_rate(), self.carry.get())?;
        self.carry.set(q.carry);
        if q.frames > 0 {
            self.wait_frames(q.frames).await?;
        }
        Ok(())
    }

    /// The scope's current carried sub-frame remainder, in seconds.
    pub fn carry(&self) -> f64 {
        self.carry.get()
    }
}

/// Future for a synchronous context request.
pub struct ContextRequest {
    signal: FlowSignal,
}

impl Future for ContextRequest {
    type Output = TimelineResult<ExecutionContext>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.signal.is_cancelled() {
            return Poll::Ready(Err(TimelineError::Cancelled));
        }
        if let Some(ctx) = this.signal.take_context() {
            return Poll::Ready(Ok(ctx));
        }

        this.signal.set_request(FlowRequest::Context);
        Poll::Pending
    }
}

/// Future for a multi-tick frame suspend. Each tick the driver grants one
/// frame and resumes the flow once, so an `n`-frame suspend is observed as
/// exactly `n` single-tick suspensions.
pub struct FrameSuspend {
    signal: FlowSignal,
    remaining: u64,
    started: bool,
}

impl Future for FrameSuspend {
    type Output = TimelineResult<()>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.signal.is_cancelled() {
            return Poll::Ready(Err(TimelineError::Cancelled));
        }

        if !this.started {
            this.started = true;
        } else if this.signal.take_frame_grant() {
            this.remaining -= 1;
        }

        if this.remaining == 0 {
            return Poll::Ready(Ok(()));
        }

        this.signal.set_request(FlowRequest::Frames {
            remaining: this.remaining,
        });
        Poll::Pending
    }
}
