//! §8 scenario: timers fire in time order regardless of the order they
//! were created in, and two timers landing on the same step fire in
//! registration order.

use std::cell::RefCell;
use std::rc::Rc;

use cosched::prelude::*;
use cosched::trigger::{Join, Timer};

#[test]
fn fires_in_deadline_order() {
    let gpi = SimulatorStub::new();
    let scheduler = Scheduler::new(Box::new(gpi), Config::from_env(&[]));

    let order: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));

    // Registered out of deadline order (10, 1, 5, 1) to check the heap
    // reorders by absolute time, breaking the 1-step tie by registration order.
    let deadlines = [(10, 0u32), (1, 1), (5, 2), (1, 3)];
    let handles: Vec<_> = deadlines
        .iter()
        .map(|&(steps, id)| {
            let order = Rc::clone(&order);
            scheduler.spawn(async move {
                Timer::new(steps).unwrap().await;
                order.borrow_mut().push(id);
            })
        })
        .collect();

    scheduler.spawn_test(async move {
        futures::future::join_all(handles.into_iter().map(Join::new)).await;
    });
    scheduler.run();

    assert_eq!(*order.borrow(), vec![1, 3, 2, 0]);
}
