//! §4.2 scenario: priming a new ReadWrite/ReadOnly trigger while the
//! simulator is already in the ReadOnly phase is rejected, but
//! `NextTimeStep` - the trigger meant to escape that phase - is not.

use cosched::prelude::*;
use cosched::trigger::{NextTimeStep, ReadWrite, Timer};

#[test]
fn next_time_step_may_prime_while_in_the_readonly_phase() {
    let gpi = SimulatorStub::new();
    gpi.borrow_mut().settle_readonly();
    let scheduler = Scheduler::new(Box::new(gpi), Config::from_env(&[]));

    // The stub's `advance()` only drains its NextTimeStep queue when a
    // timed event is actually pending, so give it one to step into.
    scheduler.spawn(async {
        Timer::new(1).unwrap().await;
    });

    let task = scheduler.spawn_test(async {
        NextTimeStep::new().await;
        "escaped"
    });
    scheduler.run();

    assert_eq!(task.result().unwrap(), "escaped");
}

#[test]
fn read_write_refuses_to_prime_while_in_the_readonly_phase() {
    let gpi = SimulatorStub::new();
    gpi.borrow_mut().settle_readonly();
    let scheduler = Scheduler::new(Box::new(gpi), Config::from_env(&[]));

    let task = scheduler.spawn_test(async {
        ReadWrite::new().await;
    });
    scheduler.run();

    let err = task.result().unwrap_err();
    assert!(err.to_string().contains("ReadOnly phase"));
}
