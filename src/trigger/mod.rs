//! The trigger system: awaitable simulator and synchronization events.
//!
//! Every concrete trigger type below implements [`std::future::Future`]
//! directly, following the upstream runtime's own `Sleep`/`Driver`
//! template (`time::sleep::Sleep`, `time::driver::Driver`): on first
//! poll a trigger registers itself - both with the scheduler's central
//! bookkeeping map (for the invariants in the module doc below) and
//! with whatever actually fires it (the GPI collaborator, an `Event`'s
//! subscriber list, a `Lock`'s pending queue) - and returns `Pending`;
//! once fired it returns `Ready` on the next poll.
//!
//! # Invariants
//! - A callback registered against a trigger was not yet invoked.
//! - Unprime happens before fire: whatever pops a trigger's
//!   registration out of its fire source does so *before* invoking the
//!   woken callback (see each type's `fire`/`release`/`set` method).
//! - A trigger with no registered callback holds no simulator resource.

mod combine;
mod edge;
mod event;
mod join;
mod lock;
mod null;
mod phase;
mod timer;

pub use combine::{with_timeout, Combine, First};
pub use edge::{Edge, EdgeKind};
pub use event::Event;
pub use join::Join;
pub use lock::Lock;
pub use null::NullTrigger;
pub use phase::{NextTimeStep, ReadOnly, ReadWrite};
pub use timer::Timer;

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::Waker;

use crate::context;
use crate::scheduler::SchedulerInner;
use crate::task::TaskId;

/// Identifies one primed trigger instance in the scheduler's
/// trigger-to-tasks bookkeeping map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerId(u64);

impl TriggerId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Registers a freshly-polled trigger with the scheduler's central
/// bookkeeping, returning the allocated id and the scheduler handle to
/// register the trigger-kind-specific fire source with.
///
/// # Panics
/// Panics if called outside of a task being driven by a [`crate::scheduler::Scheduler`].
pub(crate) fn arm(waker: Waker, on_fire: Box<dyn FnOnce()>) -> (TriggerId, Rc<RefCell<SchedulerInner>>) {
    let sched = context::current_scheduler()
        .upgrade()
        .expect("scheduler dropped while priming a trigger");
    let task_id = context::current_task().expect("trigger polled outside of a task");
    let trigger_id = TriggerId::next();
    SchedulerInner::register_trigger(&sched, trigger_id, task_id, waker, on_fire);
    (trigger_id, sched)
}

/// Removes a trigger's bookkeeping entry without firing it (used on
/// drop of a still-pending trigger, e.g. on cancellation).
pub(crate) fn disarm(sched: &Weak<RefCell<SchedulerInner>>, id: TriggerId) {
    if let Some(sched) = sched.upgrade() {
        SchedulerInner::deregister_trigger(&sched, id);
    }
}
