//! §8 scenario: `run_in_executor` hands a blocking closure to a foreign
//! OS thread and the awaiting task resumes with its result once that
//! thread exits, without blocking any other ready task in the meantime.

use std::future::Future;
use std::pin::Pin;

use cosched::external::{queue_function, run_in_executor};
use cosched::prelude::*;
use cosched::task::Outcome;
use serial_test::serial;

#[test]
#[serial]
fn round_trips_a_value_through_a_foreign_thread() {
    let gpi = SimulatorStub::new();
    let scheduler = Scheduler::new(Box::new(gpi), Config::from_env(&[]));

    let task = scheduler.spawn_test(async {
        let outcome = run_in_executor(|| 6 * 7).await;
        match outcome {
            Outcome::Value(v) => v,
            Outcome::Error(e) => panic!("external thread failed: {e}"),
        }
    });
    scheduler.run();

    assert_eq!(task.result().unwrap(), 42);
}

#[test]
#[serial]
fn propagates_a_panic_from_the_foreign_thread_as_an_error() {
    let gpi = SimulatorStub::new();
    let scheduler = Scheduler::new(Box::new(gpi), Config::from_env(&[]));

    let task = scheduler.spawn_test(async {
        let outcome = run_in_executor(|| -> i32 { panic!("boom") }).await;
        matches!(outcome, Outcome::Error(_))
    });
    scheduler.run();

    assert!(task.result().unwrap());
}

#[test]
#[serial]
fn queue_function_hands_a_future_back_to_the_scheduler_thread() {
    let gpi = SimulatorStub::new();
    let scheduler = Scheduler::new(Box::new(gpi), Config::from_env(&[]));
    let queue = scheduler.foreign_queue();

    let task = scheduler.spawn_test(async move {
        let outcome = run_in_executor(move || {
            // Runs on the `run_in_executor` foreign thread: pauses
            // itself and blocks until the scheduler thread has run the
            // queued future to completion.
            queue_function(&queue, |_scheduler| -> Pin<Box<dyn Future<Output = i32>>> { Box::pin(async { 6 * 7 }) })
        })
        .await;
        match outcome {
            Outcome::Value(v) => v,
            Outcome::Error(e) => panic!("external thread failed: {e}"),
        }
    });
    scheduler.run();

    assert_eq!(task.result().unwrap(), 42);
}
