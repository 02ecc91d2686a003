//! §4.2 scenario: an edge trigger whose predicate doesn't match a given
//! value change stays registered for the signal's next change instead
//! of being dropped, so a falling transition in between doesn't
//! permanently stall a pending `RisingEdge`.

use cosched::gpi::SignalId;
use cosched::prelude::*;
use cosched::trigger::Edge;

#[test]
fn rising_edge_survives_an_intervening_falling_transition() {
    let gpi = SimulatorStub::new();
    let scheduler = Scheduler::new(Box::new(gpi), Config::from_env(&[]));
    let signal = SignalId(1);
    scheduler.with_gpi(|g| g.write_signal_now(signal, 1));

    let edge_task = scheduler.spawn_test(async move {
        Edge::rising(signal).await;
        99
    });

    let driver_sched = scheduler.clone();
    scheduler.spawn(async move {
        // Falling transition first: `RisingEdge`'s predicate doesn't
        // match, so this must not consume its registration.
        driver_sched.with_gpi(|g| g.write_signal_now(signal, 0));
        // Now the rising transition the edge task is actually waiting for.
        driver_sched.with_gpi(|g| g.write_signal_now(signal, 1));
    });

    scheduler.run();

    assert_eq!(edge_task.result().unwrap(), 99);
}

#[test]
fn falling_edge_ignores_a_rising_transition_first() {
    let gpi = SimulatorStub::new();
    let scheduler = Scheduler::new(Box::new(gpi), Config::from_env(&[]));
    let signal = SignalId(2);
    scheduler.with_gpi(|g| g.write_signal_now(signal, 0));

    let edge_task = scheduler.spawn_test(async move {
        Edge::falling(signal).await;
        7
    });

    let driver_sched = scheduler.clone();
    scheduler.spawn(async move {
        driver_sched.with_gpi(|g| g.write_signal_now(signal, 1));
        driver_sched.with_gpi(|g| g.write_signal_now(signal, 0));
    });

    scheduler.run();

    assert_eq!(edge_task.result().unwrap(), 7);
}
