//! A hand-rolled, single-threaded [`Waker`].
//!
//! The scheduler is explicitly single-threaded (§5): all task and
//! trigger state lives behind `Rc`/`RefCell`, not `Arc`/`Mutex`. The
//! standard `std::task::Wake` trait requires `Arc<Self>: Send + Sync`,
//! which an `Rc`-based payload cannot satisfy, so we build the waker
//! directly on `RawWaker`/`RawWakerVTable` instead - the same kind of
//! "this is only ever touched on the simulation thread" unsafe
//! contract the upstream runtime already relies on for its timer
//! queue entries (`time::driver::TimerSlotEntry`'s `unsafe impl Send`).

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::task::{RawWaker, RawWakerVTable, Waker};

use crate::scheduler::SchedulerInner;
use crate::task::TaskId;

struct Payload {
    task_id: TaskId,
    scheduler: Weak<RefCell<SchedulerInner>>,
}

static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, wake, wake_by_ref, drop_payload);

unsafe fn clone(ptr: *const ()) -> RawWaker {
    let rc = unsafe { Rc::from_raw(ptr.cast::<Payload>()) };
    let cloned = Rc::clone(&rc);
    std::mem::forget(rc);
    RawWaker::new(Rc::into_raw(cloned).cast::<()>(), &VTABLE)
}

unsafe fn wake(ptr: *const ()) {
    let rc = unsafe { Rc::from_raw(ptr.cast::<Payload>()) };
    do_wake(&rc);
}

unsafe fn wake_by_ref(ptr: *const ()) {
    let rc = unsafe { Rc::from_raw(ptr.cast::<Payload>()) };
    do_wake(&rc);
    std::mem::forget(rc);
}

unsafe fn drop_payload(ptr: *const ()) {
    drop(unsafe { Rc::from_raw(ptr.cast::<Payload>()) });
}

fn do_wake(payload: &Rc<Payload>) {
    if let Some(sched) = payload.scheduler.upgrade() {
        SchedulerInner::wake_task(&sched, payload.task_id);
    }
}

/// Builds a [`Waker`] that, when woken, re-enqueues `task_id` on `scheduler`.
pub(crate) fn task_waker(task_id: TaskId, scheduler: Weak<RefCell<SchedulerInner>>) -> Waker {
    let payload = Rc::new(Payload { task_id, scheduler });
    let raw = RawWaker::new(Rc::into_raw(payload).cast::<()>(), &VTABLE);
    unsafe { Waker::from_raw(raw) }
}
