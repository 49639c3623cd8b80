//! Task bookkeeping
//!
//! One `TaskRecord` per submitted flow, owned by the driver and dropped once
//! the flow reaches a terminal state. The public `TaskHandle` shares the
//! lifecycle state through an `Rc`, so callers can keep inspecting a task
//! after the driver has retired it.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use slotmap::new_key_type;

use crate::flow::FlowSignal;

new_key_type! {
    /// Stable identifier for a submitted task.
    pub struct TaskId;
}

/// Lifecycle state of one submitted flow.
///
/// `Pending` on submission, `Running` while a resume is in progress,
/// `AwaitingContext`/`AwaitingFrames` between resumes, and exactly one of
/// `Completed`, `Failed`, or `Cancelled` at the end. Terminal states are
/// final.
#[derive(Clone, Debug)]
pub enum TaskState {
    /// Submitted but not yet resumed; first runs on the next tick.
    Pending,
    /// A resume is in progress.
    Running,
    /// Suspended on a context request (answered within the same tick).
    AwaitingContext,
    /// Suspended until this many more ticks have elapsed.
    AwaitingFrames(u64),
    /// The flow returned `Ok(())`.
    Completed,
    /// The flow returned an application error.
    Failed(Rc<anyhow::Error>),
    /// The task was cancelled before its next resume.
    Cancelled,
}

impl TaskState {
    /// Whether this state is final.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed(_) | TaskState::Cancelled
        )
    }
}

pub(crate) struct TaskShared {
    pub(crate) state: TaskState,
    pub(crate) cancel_requested: bool,
}

/// Cloneable handle to one submitted flow.
///
/// Remains valid after the task terminates; the driver only drops its own
/// record.
#[derive(Clone)]
pub struct TaskHandle {
    id: TaskId,
    shared: Rc<RefCell<TaskShared>>,
}

impl TaskHandle {
    pub(crate) fn new(id: TaskId, shared: Rc<RefCell<TaskShared>>) -> Self {
        Self { id, shared }
    }

    /// The task's identifier.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Snapshot of the task's current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.shared.borrow().state.clone()
    }

    /// Whether the task has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.shared.borrow().state.is_terminal()
    }

    /// Request cancellation. Takes effect at the start of the task's next
    /// scheduled resume; an in-flight resume is never interrupted. No-op on
    /// a task that already terminated.
    pub fn cancel(&self) {
        let mut shared = self.shared.borrow_mut();
        if !shared.state.is_terminal() {
            shared.cancel_requested = true;
        }
    }

    pub(crate) fn shared(&self) -> Rc<RefCell<TaskShared>> {
        self.shared.clone()
    }
}

/// Driver-owned record for one live flow.
pub(crate) struct TaskRecord {
    /// The flow being driven. Owned exclusively by this record; nothing else
    /// resumes it.
    pub(crate) flow: Pin<Box<dyn Future<Output = anyhow::Result<()>>>>,
    pub(crate) signal: FlowSignal,
    pub(crate) shared: Rc<RefCell<TaskShared>>,
}

impl TaskRecord {
    pub(crate) fn new(
        flow: Pin<Box<dyn Future<Output = anyhow::Result<()>>>>,
        signal: FlowSignal,
    ) -> (Self, Rc<RefCell<TaskShared>>) {
        let shared = Rc::new(RefCell::new(TaskShared {
            state: TaskState::Pending,
            cancel_requested: false,
        }));
        (
            Self {
                flow,
                signal,
                shared: shared.clone(),
            },
            shared,
        )
    }

    pub(crate) fn set_state(&self, state: TaskState) {
        self.shared.borrow_mut().state = state;
    }

    pub(crate) fn cancel_requested(&self) -> bool {
        self.shared.borrow().cancel_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_detected() {
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(!TaskState::AwaitingContext.is_terminal());
        assert!(!TaskState::AwaitingFrames(3).is_terminal());
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed(Rc::new(anyhow::anyhow!("boom"))).is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
    }

    #[test]
    fn cancel_is_noop_after_termination() {
        let flow: Pin<Box<dyn Future<Output = anyhow::Result<()>>>> =
            Box::pin(async { Ok(()) });
        let (record, shared) = TaskRecord::new(flow, FlowSignal::new());
        record.set_state(TaskState::Completed);

        let handle = TaskHandle::new(TaskId::default(), shared);
        handle.cancel();
        assert!(!handle.shared().borrow().cancel_requested);
    }
}
