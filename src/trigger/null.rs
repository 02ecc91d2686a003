//! `NullTrigger`: fires immediately, yielding the scheduler to other ready tasks.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::context;
use crate::scheduler::SchedulerInner;

/// A trigger that fires as soon as the scheduler gets back around to
/// it, reinserting the awaiting task at the tail of the ready queue.
///
/// Useful to voluntarily yield without waiting on any real event.
pub struct NullTrigger {
    yielded: bool,
}

impl NullTrigger {
    /// Creates a new `NullTrigger`.
    pub fn new() -> Self {
        Self { yielded: false }
    }
}

impl Default for NullTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl Future for NullTrigger {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.yielded {
            return Poll::Ready(());
        }
        this.yielded = true;
        let sched = context::current_scheduler()
            .upgrade()
            .expect("scheduler dropped while priming a trigger");
        let task_id = context::current_task().expect("trigger polled outside of a task");
        SchedulerInner::queue_immediate(&sched, task_id);
        Poll::Pending
    }
}
