//! `Join`: fires when a task reaches a terminal state.

use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::task::Task;

/// A trigger that fires once the wrapped task finishes or is cancelled.
///
/// Unlike the leaf simulator/synchronization triggers, `Join` registers
/// directly as a task done-callback (`Task::add_done_callback`) rather
/// than through the scheduler's central trigger map - a task's done
/// state is itself the fire source, so no extra bookkeeping is needed.
pub struct Join<R> {
    task: Rc<Task<R>>,
    registered: bool,
    fired: Rc<Cell<bool>>,
}

impl<R: 'static> Join<R> {
    /// Creates a trigger that fires when `task` becomes done.
    pub fn new(task: Rc<Task<R>>) -> Self {
        Self {
            task,
            registered: false,
            fired: Rc::new(Cell::new(false)),
        }
    }
}

impl<R: 'static> Future for Join<R> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.task.done() {
            return Poll::Ready(());
        }
        if !this.registered {
            this.registered = true;
            let fired = Rc::clone(&this.fired);
            let waker: Waker = cx.waker().clone();
            this.task.add_done_callback(move |_| {
                fired.set(true);
                waker.wake();
            });
            return Poll::Pending;
        }
        if this.fired.get() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}
