//! §8 scenario: `with_timeout` returns the inner future's result if it
//! finishes first, or kills it and reports a timeout error if the
//! deadline elapses first.

use cosched::error::ErrorKind;
use cosched::prelude::*;
use cosched::trigger::{with_timeout, Timer};

#[test]
fn returns_inner_result_when_it_finishes_first() {
    let gpi = SimulatorStub::new();
    let scheduler = Scheduler::new(Box::new(gpi), Config::from_env(&[]));

    let sched_for_task = scheduler.clone();
    let result_task = scheduler.spawn_test(async move {
        with_timeout(
            &sched_for_task,
            async {
                Timer::new(2).unwrap().await;
                "done in time"
            },
            10,
        )
        .await
    });
    scheduler.run();

    assert_eq!(result_task.result().unwrap().unwrap(), "done in time");
}

#[test]
fn reports_a_timeout_when_the_deadline_elapses_first() {
    let gpi = SimulatorStub::new();
    let scheduler = Scheduler::new(Box::new(gpi), Config::from_env(&[]));

    let sched_for_task = scheduler.clone();
    let result_task = scheduler.spawn_test(async move {
        with_timeout(
            &sched_for_task,
            async {
                Timer::new(50).unwrap().await;
                "too slow"
            },
            5,
        )
        .await
    });
    scheduler.run();

    let err = result_task.result().unwrap().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Timeout));
}
