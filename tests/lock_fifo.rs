//! §8 scenario: a `Lock` grants waiters strictly in the order they
//! started `acquire()`-ing, never to whichever waiter happens to be
//! polled first.

use std::cell::RefCell;
use std::rc::Rc;

use cosched::prelude::*;
use cosched::trigger::{Join, Lock, NullTrigger};

#[test]
fn grants_the_lock_in_fifo_order() {
    let gpi = SimulatorStub::new();
    let scheduler = Scheduler::new(Box::new(gpi), Config::from_env(&[]));

    let lock = Lock::new();
    let order: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));

    // Task 0 acquires immediately (the lock starts free) and yields
    // once before releasing, so tasks 1..4 all queue up behind it
    // before any of them gets a turn at the lock.
    let handles: Vec<_> = (0..4u32)
        .map(|id| {
            let lock = lock.clone();
            let order = Rc::clone(&order);
            scheduler.spawn(async move {
                lock.acquire().await;
                order.borrow_mut().push(id);
                NullTrigger::new().await;
                lock.release().unwrap();
            })
        })
        .collect();

    scheduler.spawn_test(async move {
        for handle in handles {
            Join::new(handle).await;
        }
    });
    scheduler.run();

    assert_eq!(*order.borrow(), vec![0, 1, 2, 3]);
}
