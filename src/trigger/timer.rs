//! `Timer`: fires after N simulation time-steps elapse.
//!
//! Grounded on `time::sleep::Sleep` - a pin-projected struct that
//! registers a waker with the time driver on first poll and resolves
//! once the deadline is reached - generalized here to register through
//! the [`crate::gpi::Gpi`] collaborator instead of a module-local
//! driver, since the simulator (or [`crate::gpi::SimulatorStub`]) is
//! the authority on simulation time.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use crate::error::SchedulerError;
use crate::gpi::GpiHandle;
use crate::scheduler::SchedulerInner;
use crate::trigger::{arm, disarm, TriggerId};

/// A trigger that fires after `steps` simulation time-steps elapse.
pub struct Timer {
    steps: u64,
    fired: Rc<Cell<bool>>,
    primed: Option<Primed>,
}

struct Primed {
    trigger_id: TriggerId,
    scheduler: Weak<RefCell<SchedulerInner>>,
    gpi_handle: GpiHandle,
}

impl Timer {
    /// Creates a new timer for `steps` simulation time-steps from now.
    ///
    /// # Errors
    /// Returns a [`SchedulerError`] with [`crate::error::ErrorKind::Domain`]
    /// if `steps == 0`; awaiting "zero time" is expressed with
    /// [`crate::trigger::NullTrigger`] instead.
    pub fn new(steps: u64) -> Result<Self, SchedulerError> {
        if steps == 0 {
            return Err(SchedulerError::domain(
                "Timer durations must be positive; use NullTrigger for zero time",
            ));
        }
        Ok(Self {
            steps,
            fired: Rc::new(Cell::new(false)),
            primed: None,
        })
    }
}

impl Future for Timer {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.fired.get() {
            return Poll::Ready(());
        }
        if this.primed.is_none() {
            let fired = Rc::clone(&this.fired);
            let (trigger_id, sched) = arm(cx.waker().clone(), Box::new(move || fired.set(true)));
            let sched_for_cb = Rc::downgrade(&sched);
            let gpi_handle = sched.borrow_mut().gpi_mut().register_timed(
                this.steps,
                Box::new(move || {
                    if let Some(sched) = sched_for_cb.upgrade() {
                        SchedulerInner::fire_trigger(&sched, trigger_id);
                    }
                }),
            );
            this.primed = Some(Primed {
                trigger_id,
                scheduler: Rc::downgrade(&sched),
                gpi_handle,
            });
        }
        Poll::Pending
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if self.fired.get() {
            return;
        }
        if let Some(primed) = self.primed.take() {
            disarm(&primed.scheduler, primed.trigger_id);
            if let Some(sched) = primed.scheduler.upgrade() {
                sched.borrow_mut().gpi_mut().deregister(primed.gpi_handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_duration() {
        let err = Timer::new(0).unwrap_err();
        assert!(matches!(err.kind(), crate::error::ErrorKind::Domain));
    }
}
