//! `Event`: a level-triggered synchronization primitive with fan-out wake-up.
//!
//! Grounded on `cocotb._base_triggers.Event`/`_Event`
//! (`original_source/src/cocotb/_base_triggers.py`): `set()` wakes every
//! task currently awaiting `wait()`, in the order they started
//! awaiting; `clear()` re-arms it. Unlike the Python original, each
//! `.await` point owns a fresh waiter future, so the "a wait() result
//! may only be used by one task at a time" guard the original enforces
//! is structurally impossible to violate here - ownership already
//! prevents two tasks from polling the same future.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use crate::scheduler::SchedulerInner;
use crate::trigger::{arm, disarm, TriggerId};

struct Inner {
    is_set: bool,
    waiting: Vec<(TriggerId, Weak<RefCell<SchedulerInner>>)>,
}

/// A level-triggered event: tasks `await`ing [`Event::wait`] wake when
/// [`Event::set`] is called.
#[derive(Clone)]
pub struct Event {
    inner: Rc<RefCell<Inner>>,
}

impl Event {
    /// Creates a new, unset event.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                is_set: false,
                waiting: Vec::new(),
            })),
        }
    }

    /// Sets the event, waking every task currently awaiting [`Event::wait`],
    /// in the order they started waiting.
    pub fn set(&self) {
        let waiting = {
            let mut inner = self.inner.borrow_mut();
            inner.is_set = true;
            std::mem::take(&mut inner.waiting)
        };
        for (trigger_id, sched) in waiting {
            if let Some(sched) = sched.upgrade() {
                SchedulerInner::fire_trigger(&sched, trigger_id);
            }
        }
    }

    /// Clears the event so that future `wait()`s suspend again.
    pub fn clear(&self) {
        self.inner.borrow_mut().is_set = false;
    }

    /// Whether the event is currently set.
    pub fn is_set(&self) -> bool {
        self.inner.borrow().is_set
    }

    /// Returns a future that resolves once the event is set. If the
    /// event is already set, resolves immediately without suspending.
    pub fn wait(&self) -> Wait {
        Wait {
            event: Rc::clone(&self.inner),
            primed: None,
        }
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

/// The future returned by [`Event::wait`].
pub struct Wait {
    event: Rc<RefCell<Inner>>,
    primed: Option<(TriggerId, Weak<RefCell<SchedulerInner>>)>,
}

impl Future for Wait {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.event.borrow().is_set {
            return Poll::Ready(());
        }
        if this.primed.is_none() {
            let (trigger_id, sched) = arm(cx.waker().clone(), Box::new(|| {}));
            this.event
                .borrow_mut()
                .waiting
                .push((trigger_id, Rc::downgrade(&sched)));
            this.primed = Some((trigger_id, Rc::downgrade(&sched)));
        }
        Poll::Pending
    }
}

impl Drop for Wait {
    fn drop(&mut self) {
        if let Some((trigger_id, sched)) = self.primed.take() {
            self.event.borrow_mut().waiting.retain(|(id, _)| *id != trigger_id);
            disarm(&sched, trigger_id);
        }
    }
}
