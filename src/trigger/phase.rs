//! `ReadWrite`, `ReadOnly`, `NextTimeStep`: simulator phase synchronization triggers.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use crate::gpi::{Gpi, GpiHandle};
use crate::scheduler::SchedulerInner;
use crate::time::Phase;
use crate::trigger::{arm, disarm, TriggerId};

struct Primed {
    trigger_id: TriggerId,
    scheduler: Weak<RefCell<SchedulerInner>>,
    gpi_handle: GpiHandle,
}

macro_rules! phase_trigger {
    ($name:ident, $register:ident, $guard_read_only:expr, $doc:literal) => {
        #[doc = $doc]
        pub struct $name {
            fired: Rc<Cell<bool>>,
            primed: Option<Primed>,
        }

        impl $name {
            /// Creates a new, unprimed instance of this trigger.
            pub fn new() -> Self {
                Self {
                    fired: Rc::new(Cell::new(false)),
                    primed: None,
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Future for $name {
            type Output = ();

            fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
                let this = self.get_mut();
                if this.fired.get() {
                    return Poll::Ready(());
                }
                if this.primed.is_none() {
                    let fired = Rc::clone(&this.fired);
                    let (trigger_id, sched) =
                        arm(cx.waker().clone(), Box::new(move || fired.set(true)));
                    // `NextTimeStep` is the escape hatch out of the ReadOnly
                    // phase, so only ReadWrite/ReadOnly refuse to prime
                    // while already in it (§4.2).
                    if $guard_read_only {
                        assert!(
                            sched.borrow().phase() != Phase::ReadOnly,
                            "cannot prime a new ReadWrite/ReadOnly trigger while already in the ReadOnly phase"
                        );
                    }
                    let sched_for_cb = Rc::downgrade(&sched);
                    let gpi_handle = sched.borrow_mut().gpi_mut().$register(Box::new(move |_gpi: &mut dyn Gpi| {
                        if let Some(sched) = sched_for_cb.upgrade() {
                            SchedulerInner::fire_trigger(&sched, trigger_id);
                        }
                    }));
                    this.primed = Some(Primed {
                        trigger_id,
                        scheduler: Rc::downgrade(&sched),
                        gpi_handle,
                    });
                }
                Poll::Pending
            }
        }

        impl Drop for $name {
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
    };
}

phase_trigger!(ReadWrite, register_readwrite, true, "Fires at the next ReadWrite synchronization phase.");
phase_trigger!(ReadOnly, register_readonly, true, "Fires at the next ReadOnly synchronization phase.");
phase_trigger!(
    NextTimeStep,
    register_nexttime,
    false,
    "Fires at the start of the next simulation time-step."
);
