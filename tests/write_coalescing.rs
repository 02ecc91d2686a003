//! §8 scenario: a write issued outside the ReadWrite phase is not
//! observable until the next ReadWrite phase settles, and writes made
//! within one delta are replayed in the order they were issued.

use cosched::prelude::*;

#[test]
fn buffers_writes_until_the_next_readwrite_phase() {
    let gpi = SimulatorStub::new();
    let signal = SignalId(7);
    let scheduler = Scheduler::new(Box::new(gpi), Config::from_env(&[]));

    scheduler.write_now(signal, 0);
    assert_eq!(scheduler.with_gpi(|g| g.read_signal(signal)), 0);

    scheduler.schedule_write(signal, 1);
    scheduler.schedule_write(signal, 2);

    // Not yet observable: only buffered, no ReadWrite phase has settled.
    assert_eq!(scheduler.with_gpi(|g| g.read_signal(signal)), 0);

    scheduler.with_gpi(|g| g.pump());

    // Only the last buffered write for the signal wins, since both
    // landed in the same delta before any settle.
    assert_eq!(scheduler.with_gpi(|g| g.read_signal(signal)), 2);
}

#[test]
fn write_now_bypasses_coalescing() {
    let gpi = SimulatorStub::new();
    let signal = SignalId(3);
    let scheduler = Scheduler::new(Box::new(gpi), Config::from_env(&[]));

    scheduler.write_now(signal, 9);
    assert_eq!(scheduler.with_gpi(|g| g.read_signal(signal)), 9);
}
