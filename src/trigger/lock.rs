//! `Lock`: a fair, FIFO mutual-exclusion primitive.
//!
//! Grounded on `cocotb._base_triggers.Lock`/`_Lock`: `acquire()` queues
//! behind any currently-held lock and is granted strictly in the order
//! tasks requested it; `release()` hands the lock directly to the next
//! queued waiter rather than waking everyone to race for it.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use crate::error::SchedulerError;
use crate::scheduler::SchedulerInner;
use crate::trigger::{arm, disarm, TriggerId};

struct Inner {
    held: bool,
    pending: VecDeque<(TriggerId, Weak<RefCell<SchedulerInner>>)>,
}

/// A fair, FIFO mutual-exclusion lock.
#[derive(Clone)]
pub struct Lock {
    inner: Rc<RefCell<Inner>>,
}

impl Lock {
    /// Creates a new, unheld lock.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                held: false,
                pending: VecDeque::new(),
            })),
        }
    }

    /// Returns a future that resolves once the lock is acquired.
    pub fn acquire(&self) -> Acquire {
        Acquire {
            lock: Rc::clone(&self.inner),
            primed: None,
            granted: Rc::new(std::cell::Cell::new(false)),
        }
    }

    /// Releases the lock, handing it directly to the next queued waiter
    /// if any, otherwise marking it free.
    ///
    /// # Errors
    /// Returns a [`SchedulerError`] with [`crate::error::ErrorKind::Domain`]
    /// if the lock is not currently held.
    pub fn release(&self) -> Result<(), SchedulerError> {
        let mut inner = self.inner.borrow_mut();
        if !inner.held {
            return Err(SchedulerError::domain("Attempt to release an unacquired Lock"));
        }
        if let Some((trigger_id, sched)) = inner.pending.pop_front() {
            drop(inner);
            if let Some(sched) = sched.upgrade() {
                SchedulerInner::fire_trigger(&sched, trigger_id);
            }
        } else {
            inner.held = false;
        }
        Ok(())
    }

    /// Whether the lock is currently held.
    pub fn locked(&self) -> bool {
        self.inner.borrow().held
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

/// The future returned by [`Lock::acquire`].
pub struct Acquire {
    lock: Rc<RefCell<Inner>>,
    primed: Option<(TriggerId, Weak<RefCell<SchedulerInner>>)>,
    granted: Rc<std::cell::Cell<bool>>,
}

impl Future for Acquire {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.granted.get() {
            return Poll::Ready(());
        }
        if this.primed.is_none() {
            let mut inner = this.lock.borrow_mut();
            if !inner.held {
                inner.held = true;
                this.granted.set(true);
                return Poll::Ready(());
            }
            drop(inner);
            let granted = Rc::clone(&this.granted);
            let (trigger_id, sched) = arm(cx.waker().clone(), Box::new(move || granted.set(true)));
            this.lock
                .borrow_mut()
                .pending
                .push_back((trigger_id, Rc::downgrade(&sched)));
            this.primed = Some((trigger_id, Rc::downgrade(&sched)));
        }
        Poll::Pending
    }
}

impl Drop for Acquire {
    fn drop(&mut self) {
        if let Some((trigger_id, sched)) = self.primed.take() {
            if !self.granted.get() {
                self.lock.borrow_mut().pending.retain(|(id, _)| *id != trigger_id);
                disarm(&sched, trigger_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_without_acquire_is_domain_error() {
        let lock = Lock::new();
        let err = lock.release().unwrap_err();
        assert!(matches!(err.kind(), crate::error::ErrorKind::Domain));
    }
}
