//! `ValueChange`, `RisingEdge`, `FallingEdge`: fire on a signal's value changing.
//!
//! One `Edge` type parameterized by [`EdgeKind`] backs all three; the
//! predicate check happens in the registered GPI callback before the
//! trigger is considered fired, per §4.2.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use crate::gpi::{GpiHandle, SignalId};
use crate::scheduler::SchedulerInner;
use crate::trigger::{arm, disarm, TriggerId};

/// Which value transition a [`Edge`] trigger fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Fires on any change of value.
    ValueChange,
    /// Fires when the value becomes `1`.
    Rising,
    /// Fires when the value becomes `0`.
    Falling,
}

impl EdgeKind {
    fn matches(self, new_value: i64) -> bool {
        match self {
            EdgeKind::ValueChange => true,
            EdgeKind::Rising => new_value == 1,
            EdgeKind::Falling => new_value == 0,
        }
    }
}

/// A trigger firing on a signal value change (see [`EdgeKind`]).
pub struct Edge {
    signal: SignalId,
    kind: EdgeKind,
    fired: Rc<Cell<bool>>,
    primed: Option<Primed>,
}

struct Primed {
    trigger_id: TriggerId,
    scheduler: Weak<RefCell<SchedulerInner>>,
    gpi_handle: GpiHandle,
}

impl Edge {
    /// Fires on any change of `signal`'s value.
    pub fn value_change(signal: SignalId) -> Self {
        Self::new(signal, EdgeKind::ValueChange)
    }

    /// Fires when `signal`'s value becomes `1`.
    pub fn rising(signal: SignalId) -> Self {
        Self::new(signal, EdgeKind::Rising)
    }

    /// Fires when `signal`'s value becomes `0`.
    pub fn falling(signal: SignalId) -> Self {
        Self::new(signal, EdgeKind::Falling)
    }

    fn new(signal: SignalId, kind: EdgeKind) -> Self {
        Self {
            signal,
            kind,
            fired: Rc::new(Cell::new(false)),
            primed: None,
        }
    }
}

impl Future for Edge {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.fired.get() {
            return Poll::Ready(());
        }
        if this.primed.is_none() {
            let fired_for_bookkeeping = Rc::clone(&this.fired);
            let (trigger_id, sched) = arm(cx.waker().clone(), Box::new(move || fired_for_bookkeeping.set(true)));
            let sched_for_cb = Rc::downgrade(&sched);
            let kind = this.kind;
            let gpi_handle = sched.borrow_mut().gpi_mut().register_value_change(
                this.signal,
                Box::new(move |new_value| {
                    if !kind.matches(new_value) {
                        // Predicate failed: report "not fired" so the
                        // collaborator keeps this subscriber registered for
                        // the signal's next value change instead of
                        // dropping it.
                        return false;
                    }
                    if let Some(sched) = sched_for_cb.upgrade() {
                        SchedulerInner::fire_trigger(&sched, trigger_id);
                    }
                    true
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

impl Drop for Edge {
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
