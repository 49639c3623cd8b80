//! Timeline driver
//!
//! The driver owns every task record and advances the whole timeline by
//! exactly one frame per external `tick()` call. Within a tick it resumes
//! each live task once, in submission order, pattern-matching the typed
//! request the flow yielded:
//!
//! - context requests are answered and the flow re-resumed immediately, in a
//!   loop, until it frame-suspends or terminates (they never consume a tick);
//! - a frame suspend parks the task until the next tick;
//! - completion, failure, and cancellation retire the record after the tick.
//!
//! All progress is synchronous inside `tick()`; there is no internal timer
//! and no two flows ever run concurrently. For a fixed submission order and
//! tick sequence the produced side effects are fully deterministic.

use std::future::Future;
use std::rc::Rc;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use slotmap::SlotMap;
use tracing::{debug, trace};

use crate::context::{ExecutionContext, TimelineSettings};
use crate::error::TimelineResult;
use crate::flow::{FlowRequest, FlowScope, FlowSignal};
use crate::task::{TaskHandle, TaskId, TaskRecord, TaskState};

/// Create a timeline from validated settings.
///
/// Convenience wrapper around [`Timeline::new`].
pub fn create_timeline(settings: TimelineSettings) -> TimelineResult<Timeline> {
    Timeline::new(settings)
}

/// A frame-quantized timeline: the single authority over frame index and
/// simulated time, advanced one frame at a time by an external renderer.
pub struct Timeline {
    settings: Rc<TimelineSettings>,
    frame_index: u64,
    tasks: SlotMap<TaskId, TaskRecord>,
    /// Submission order of live tasks; resume order within a tick.
    order: Vec<TaskId>,
}

impl Timeline {
    /// Create a timeline. Fails if the settings are invalid; individual
    /// ticks never re-validate.
    pub fn new(settings: TimelineSettings) -> TimelineResult<Self> {
        settings.validate()?;
        Ok(Self {
            settings: Rc::new(settings),
            frame_index: 0,
            tasks: SlotMap::with_key(),
            order: Vec::new(),
        })
    }

    /// The current frame index. Zero until the first tick.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// The current simulated time in seconds.
    pub fn simulated_time(&self) -> f64 {
        self.frame_index as f64 / self.settings.frame_rate
    }

    /// The timeline settings.
    pub fn settings(&self) -> &TimelineSettings {
        &self.settings
    }

    /// Number of tasks that have not yet terminated.
    pub fn live_tasks(&self) -> usize {
        self.order.len()
    }

    /// Whether no live tasks remain.
    pub fn is_idle(&self) -> bool {
        self.order.is_empty()
    }

    /// Register a flow. It does not run yet; its first resume happens on the
    /// next [`tick`](Timeline::tick).
    pub fn submit<F, Fut>(&mut self, f: F) -> TaskHandle
    where
        F: FnOnce(FlowScope) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        let signal = FlowSignal::new();
        let scope = FlowScope::new(signal.clone());
        let flow = Box::pin(f(scope));

        let (record, shared) = TaskRecord::new(flow, signal);
        let id = self.tasks.insert(record);
        self.order.push(id);

        debug!(task = ?id, "flow submitted");
        TaskHandle::new(id, shared)
    }

    /// Request cancellation of a task. Equivalent to
    /// [`TaskHandle::cancel`]: the flow is not resumed again once the
    /// cancellation is observed, and the handle reaches
    /// [`TaskState::Cancelled`] within one subsequent tick.
    pub fn cancel(&mut self, handle: &TaskHandle) {
        handle.cancel();
    }

    /// Advance the timeline by exactly one frame.
    ///
    /// The sole entry point the external renderer calls, once per rendered
    /// frame. No flow error crosses this boundary; a failing flow only moves
    /// its own handle to [`TaskState::Failed`].
    pub fn tick(&mut self) {
        self.frame_index += 1;
        let simulated_time = self.simulated_time();
        trace!(frame = self.frame_index, time = simulated_time, "tick");

        let mut retired: Vec<TaskId> = Vec::new();

        // Indexed loop: submissions cannot happen mid-tick, but the borrow
        // on `self.tasks` must not pin `self.order`.
        for i in 0..self.order.len() {
            let id = self.order[i];
            let record = match self.tasks.get_mut(id) {
                Some(record) => record,
                None => continue,
            };

            // Cancellation is observed before any resume; no further steps
            // of the flow run.
            if record.cancel_requested() {
                record.signal.set_cancelled();
                record.set_state(TaskState::Cancelled);
                debug!(task = ?id, "flow cancelled");
                retired.push(id);
                continue;
            }

            let due = match record.shared.borrow().state {
                TaskState::Pending => true,
                TaskState::AwaitingFrames(_) => {
                    record.signal.grant_frame();
                    true
                }
                // Terminal records are retired the tick they terminate, and
                // Running/AwaitingContext never persist across ticks.
                _ => false,
            };
            if !due {
                continue;
            }

            if resume_task(id, record, self.frame_index, simulated_time, &self.settings) {
                retired.push(id);
            }
        }

        // Terminal records leave the live set after the tick.
        for id in retired {
            self.tasks.remove(id);
        }
        let tasks = &self.tasks;
        self.order.retain(|id| tasks.contains_key(*id));
    }

    /// Advance by `n` frames.
    pub fn tick_n(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }
}

/// Resume one task, servicing context requests within the same tick until
/// the flow frame-suspends or terminates. Returns true if the record should
/// be retired.
fn resume_task(
    id: TaskId,
    record: &mut TaskRecord,
    frame_index: u64,
    simulated_time: f64,
    settings: &Rc<TimelineSettings>,
) -> bool {
    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);

    loop {
        record.set_state(TaskState::Running);

        match record.flow.as_mut().poll(&mut cx) {
            Poll::Ready(Ok(())) => {
                record.set_state(TaskState::Completed);
                debug!(task = ?id, "flow completed");
                return true;
            }
            Poll::Ready(Err(err)) => {
                debug!(task = ?id, error = %err, "flow failed");
                record.set_state(TaskState::Failed(Rc::new(err)));
                return true;
            }
            Poll::Pending => match record.signal.take_request() {
                Some(FlowRequest::Context) => {
                    record.set_state(TaskState::AwaitingContext);
                    record.signal.put_context(ExecutionContext::new(
                        frame_index,
                        simulated_time,
                        settings.clone(),
                    ));
                    // Answered synchronously; keep resuming this tick.
                }
                Some(FlowRequest::Frames { remaining }) => {
                    record.set_state(TaskState::AwaitingFrames(remaining));
                    return false;
                }
                None => {
                    // The flow parked on a future outside the timeline
                    // protocol; the driver can never wake it. Fail it
                    // deterministically instead of stalling forever.
                    debug!(task = ?id, "flow suspended outside the timeline protocol");
                    record.set_state(TaskState::Failed(Rc::new(anyhow::anyhow!(
                        "flow suspended on a future the timeline driver cannot resume"
                    ))));
                    return true;
                }
            },
        }
    }
}

// Flows are scheduled purely by the request protocol above; wakes carry no
// information, so the driver polls with a no-op waker.
fn noop_waker() -> Waker {
    fn raw() -> RawWaker {
        RawWaker::new(std::ptr::null(), &VTABLE)
    }
    unsafe fn clone_fn(_: *const ()) -> RawWaker {
        raw()
    }
    unsafe fn noop_fn(_: *const ()) {}
    static VTABLE: RawWakerVTable = RawWakerVTable::new(clone_fn, noop_fn, noop_fn, noop_fn);
    unsafe { Waker::from_raw(raw()) }
}
