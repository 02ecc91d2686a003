//! §8 scenario: `Event::set()` wakes every outstanding `wait()` in the
//! order those waits started, and a `wait()` issued after `set()` never
//! suspends at all.

use std::cell::RefCell;
use std::rc::Rc;

use cosched::prelude::*;
use cosched::trigger::{Event, Join};

#[test]
fn wakes_all_waiters_in_order() {
    let gpi = SimulatorStub::new();
    let scheduler = Scheduler::new(Box::new(gpi), Config::from_env(&[]));

    let event = Event::new();
    let order: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));

    let handles: Vec<_> = (0..3u32)
        .map(|id| {
            let event = event.clone();
            let order = Rc::clone(&order);
            scheduler.spawn(async move {
                event.wait().await;
                order.borrow_mut().push(id);
            })
        })
        .collect();

    let setter = {
        let order = Rc::clone(&order);
        scheduler.spawn(async move {
            // Spawned after the three waiters, so by the time this task
            // gets its first turn they have all already registered.
            event.set();
            // A wait() started after the event is already set resolves
            // without ever suspending.
            event.wait().await;
            order.borrow_mut().push(99);
        })
    };

    scheduler.spawn_test(async move {
        for handle in handles {
            Join::new(handle).await;
        }
        Join::new(setter).await;
    });
    scheduler.run();

    // `setter` runs `set()` and its own already-set `wait()` to
    // completion in one uninterrupted poll, so its push lands before
    // any of the three waiters - woken by that same `set()` - get a
    // turn to resume and push their own ids, in the order they were
    // waiting.
    assert_eq!(*order.borrow(), vec![99, 0, 1, 2]);
}
