//! Thread-local "currently executing" context.
//!
//! Mirrors the upstream runtime's simulation-time driver context
//! (`Driver::with_current`): a leaf trigger future, when first polled,
//! needs to know which task it is suspending and which scheduler to
//! register itself with, without either being threaded explicitly
//! through every `.await`. The context is entered only for the
//! duration of [`crate::scheduler::Scheduler::run`] and a single
//! `Task::advance` call, never kept alive longer than that.

use std::cell::{Cell, RefCell};
use std::rc::Weak;

use crate::scheduler::SchedulerInner;
use crate::task::TaskId;

thread_local! {
    static CURRENT_TASK: Cell<Option<TaskId>> = const { Cell::new(None) };
    static CURRENT_SCHEDULER: RefCell<Option<Weak<RefCell<SchedulerInner>>>> = const { RefCell::new(None) };
}

/// The task id currently being polled, if any.
pub(crate) fn current_task() -> Option<TaskId> {
    CURRENT_TASK.with(|c| c.get())
}

/// Runs `f` with `task` installed as the current task, restoring the
/// previous value afterwards.
pub(crate) fn with_task<R>(task: TaskId, f: impl FnOnce() -> R) -> R {
    let prev = CURRENT_TASK.with(|c| c.replace(Some(task)));
    let r = f();
    CURRENT_TASK.with(|c| c.set(prev));
    r
}

/// The scheduler that the currently-polling task belongs to.
///
/// # Panics
/// Panics if called outside of a trigger being polled as part of a
/// task resumption - this is always a usage bug (a trigger constructed
/// and polled manually outside the scheduler).
pub(crate) fn current_scheduler() -> Weak<RefCell<SchedulerInner>> {
    CURRENT_SCHEDULER.with(|c| {
        c.borrow()
            .clone()
            .expect("trigger polled outside of a scheduler context")
    })
}

pub(crate) fn with_scheduler<R>(sched: Weak<RefCell<SchedulerInner>>, f: impl FnOnce() -> R) -> R {
    let prev = CURRENT_SCHEDULER.with(|c| c.borrow_mut().replace(sched));
    let r = f();
    CURRENT_SCHEDULER.with(|c| *c.borrow_mut() = prev);
    r
}
