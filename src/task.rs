//! Tasks: a wrapped `Future` plus the lifecycle state machine the
//! scheduler drives it through.
//!
//! Grounded on `cocotb.task.Task` (`original_source/src/cocotb/task.py`):
//! the state names, the done-callback contract, and the cancel/kill
//! split are carried over verbatim in meaning. What changes is the
//! advance mechanism - a generator's `send`/`throw` becomes a native
//! `Future::poll`, so there is no separate "inject an outcome" step;
//! resuming a task is just polling it again with its own waker installed.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll, Waker};

use crate::error::SchedulerError;

/// Uniquely identifies a [`Task`] for the lifetime of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Lifecycle state of a [`Task`].
///
/// ```text
/// UNSTARTED --queue--> SCHEDULED --resume--> RUNNING
/// RUNNING --suspend on trigger--> PENDING --trigger fires--> SCHEDULED
/// RUNNING --return/panic--> FINISHED (terminal)
/// any     --cancel/kill--> CANCELLED (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Created, never polled, not yet in the ready queue.
    Unstarted,
    /// In the scheduler's ready queue, waiting to be resumed.
    Scheduled,
    /// Suspended on a trigger.
    Pending,
    /// Currently being polled.
    Running,
    /// Finished with a value or an error.
    Finished,
    /// Cancelled before it finished.
    Cancelled,
}

impl TaskState {
    /// Whether the task has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Finished | TaskState::Cancelled)
    }
}

/// The result of a finished [`Task`]: either its return value, or the
/// error it failed with (a propagated panic, or a user-returned error).
pub enum Outcome<R> {
    /// The task's future resolved to this value.
    Value(R),
    /// The task failed with this error.
    Error(SchedulerError),
}

/// Runs `f`, capturing a panic as a [`SchedulerError`] instead of
/// unwinding further. Used by the external bridge (§4.6) to turn a
/// foreign closure's panic into a normal [`Outcome`].
pub fn capture<R>(f: impl FnOnce() -> R) -> Outcome<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(v) => Outcome::Value(v),
        Err(payload) => {
            let msg = panic_message(&payload);
            Outcome::Error(SchedulerError::user(PanicError(msg)))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked with a non-string payload".to_string()
    }
}

#[derive(Debug)]
struct PanicError(String);

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for PanicError {}

/// Scheduler-facing, type-erased view of a [`Task`].
///
/// The scheduler keeps tasks of heterogeneous result types in the same
/// ready queue and trigger maps; it only ever needs to know a task's
/// id, its state, and how to push it forward or kill it - never the
/// concrete result type, which stays behind the typed [`Task`] handle
/// the caller of `spawn` holds on to.
pub trait ErasedTask {
    /// The task's id.
    fn id(&self) -> TaskId;
    /// The task's current lifecycle state.
    fn state(&self) -> TaskState;
    /// Polls the task's future once. Returns `true` if the task is now terminal.
    fn advance(self: Rc<Self>, waker: Waker) -> bool;
    /// Forces the task to FINISHED without resolving its future, dropping it.
    ///
    /// Mirrors `Task.kill()`: the outcome is discarded (legacy, silent);
    /// `killed()` on the concrete handle reports this happened.
    fn kill(&self);
    /// Forces the task to CANCELLED, recording `msg` as the cancellation reason.
    fn cancel(&self, msg: Option<String>);
    /// Registers a type-erased done-callback, invoked immediately if already terminal.
    fn on_done(&self, callback: Box<dyn FnOnce(&dyn ErasedTask)>);
}

struct Inner<R> {
    state: TaskState,
    future: Option<Pin<Box<dyn Future<Output = R>>>>,
    outcome: Option<Outcome<R>>,
    killed: bool,
    cancel_reason: Option<String>,
    done_callbacks: Vec<Box<dyn FnOnce(&dyn ErasedTask)>>,
}

/// A single concurrently-executing unit of work: a boxed `Future` plus
/// the bookkeeping the scheduler needs to drive it.
///
/// Not constructed directly by user code; see
/// [`crate::scheduler::Scheduler::spawn`].
pub struct Task<R> {
    id: TaskId,
    name: String,
    inner: RefCell<Inner<R>>,
}

impl<R: 'static> Task<R> {
    pub(crate) fn new(name: impl Into<String>, future: impl Future<Output = R> + 'static) -> Rc<Self> {
        Rc::new(Self {
            id: TaskId::next(),
            name: name.into(),
            inner: RefCell::new(Inner {
                state: TaskState::Unstarted,
                future: Some(Box::pin(future)),
                outcome: None,
                killed: false,
                cancel_reason: None,
                done_callbacks: Vec::new(),
            }),
        })
    }

    /// The task's display name (for logging only).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the task has reached a terminal state.
    pub fn done(&self) -> bool {
        self.inner.borrow().state.is_terminal()
    }

    /// Whether the task was cancelled.
    pub fn cancelled(&self) -> bool {
        self.inner.borrow().state == TaskState::Cancelled
    }

    /// Whether the task was force-finished via [`ErasedTask::kill`].
    pub fn killed(&self) -> bool {
        self.inner.borrow().killed
    }

    /// The task's result.
    ///
    /// Returns `Err` if the task failed, was cancelled, or has not
    /// finished yet.
    pub fn result(&self) -> Result<R, SchedulerError> {
        let mut inner = self.inner.borrow_mut();
        match inner.state {
            TaskState::Cancelled => Err(SchedulerError::cancelled(
                inner
                    .cancel_reason
                    .clone()
                    .unwrap_or_else(|| "task cancelled".into()),
            )),
            TaskState::Finished => match inner.outcome.take() {
                Some(Outcome::Value(v)) => Ok(v),
                Some(Outcome::Error(e)) => Err(e),
                None => Err(SchedulerError::internal("result already taken")),
            },
            _ => Err(SchedulerError::internal("result is not yet available")),
        }
    }

    /// Registers a callback to be run exactly once, when the task
    /// becomes done. If the task is already done, runs it immediately.
    pub fn add_done_callback(self: &Rc<Self>, callback: impl FnOnce(&Task<R>) + 'static) {
        let me = Rc::clone(self);
        if self.done() {
            callback(&me);
            return;
        }
        self.inner.borrow_mut().done_callbacks.push(Box::new(move |erased| {
            debug_assert_eq!(erased.id(), me.id());
            callback(&me);
        }));
    }

    fn run_done_callbacks(&self) {
        let callbacks = std::mem::take(&mut self.inner.borrow_mut().done_callbacks);
        for cb in callbacks {
            cb(self);
        }
    }
}

impl<R: 'static> ErasedTask for Task<R> {
    fn id(&self) -> TaskId {
        self.id
    }

    fn state(&self) -> TaskState {
        self.inner.borrow().state
    }

    fn advance(self: Rc<Self>, waker: Waker) -> bool {
        {
            let mut inner = self.inner.borrow_mut();
            debug_assert!(
                !matches!(inner.state, TaskState::Running),
                "re-entrant advance() on {}",
                self.id
            );
            inner.state = TaskState::Running;
        }

        let mut fut_slot = {
            let mut inner = self.inner.borrow_mut();
            inner.future.take()
        };
        let fut = fut_slot
            .as_mut()
            .expect("advance() called on a task with no future (already finished)");

        let mut cx = Context::from_waker(&waker);
        let poll_result = catch_unwind(AssertUnwindSafe(|| fut.as_mut().poll(&mut cx)));

        match poll_result {
            Ok(Poll::Ready(value)) => {
                let mut inner = self.inner.borrow_mut();
                inner.future = None;
                inner.outcome = Some(Outcome::Value(value));
                inner.state = TaskState::Finished;
                drop(inner);
                self.run_done_callbacks();
                true
            }
            Ok(Poll::Pending) => {
                let mut inner = self.inner.borrow_mut();
                inner.future = fut_slot;
                inner.state = TaskState::Pending;
                false
            }
            Err(payload) => {
                let msg = panic_message(&payload);
                let mut inner = self.inner.borrow_mut();
                inner.future = None;
                inner.outcome = Some(Outcome::Error(SchedulerError::user(PanicError(msg))));
                inner.state = TaskState::Finished;
                drop(inner);
                self.run_done_callbacks();
                true
            }
        }
    }

    fn kill(&self) {
        if self.done() {
            return;
        }
        let mut inner = self.inner.borrow_mut();
        inner.future = None;
        inner.killed = true;
        inner.state = TaskState::Finished;
        drop(inner);
        self.run_done_callbacks();
    }

    fn cancel(&self, msg: Option<String>) {
        if self.done() {
            return;
        }
        let mut inner = self.inner.borrow_mut();
        inner.future = None;
        inner.cancel_reason = Some(msg.unwrap_or_else(|| "task cancelled".into()));
        inner.state = TaskState::Cancelled;
        drop(inner);
        self.run_done_callbacks();
    }

    fn on_done(&self, callback: Box<dyn FnOnce(&dyn ErasedTask)>) {
        if self.done() {
            callback(self);
            return;
        }
        self.inner.borrow_mut().done_callbacks.push(callback);
    }
}

impl<R> fmt::Debug for Task<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.inner.borrow().state)
            .finish()
    }
}
