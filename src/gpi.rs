//! The GPI collaborator: the simulator boundary the scheduler's
//! GPI-backed triggers (§4.2) register callbacks through.
//!
//! `Gpi` stands in for the generic procedural interface's C ABI -
//! iterating hierarchy objects, resolving signal handles, bit-vector
//! arithmetic and the ABI itself are explicitly out of scope (§1); only
//! the handful of operations the scheduler calls are modeled. A
//! [`SimulatorStub`] implements this trait with an in-process
//! discrete-event loop so the scheduler and its triggers can run and be
//! tested without a real simulator process attached, grounded on the
//! upstream runtime's own event-ordering core
//! (`core::runtime::future_event_set::FutureEventSet`): a time-ordered
//! min-heap plus a zero-delay queue for same-timestep events.

use std::cell::RefCell;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::cmp::Reverse;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::time::{Phase, SimTime};

/// Opaque handle to a registered GPI callback, used only to deregister it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpiHandle(u64);

/// Identifies a signal in the simulator's hierarchy.
///
/// Resolving a hierarchical name to a `SignalId` is out of scope (§1);
/// callers obtain one however their simulator binding does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalId(pub u64);

type TimedCallback = Box<dyn FnOnce()>;
/// Returns `true` once the callback has actually fired (its edge
/// predicate matched) and should be dropped; `false` leaves it
/// registered to be tried again on the signal's next value change.
type ValueCallback = Box<dyn FnMut(i64) -> bool>;
/// Receives the GPI its phase fired on, so a callback that itself
/// needs to write through the GPI (the write-scheduler collaborator's
/// ReadWrite flush) can do so without re-entering the scheduler to ask
/// for it back.
type PhaseCallback = Box<dyn FnOnce(&mut dyn Gpi)>;

/// The simulator-boundary contract GPI-backed triggers register through.
pub trait Gpi {
    /// Registers a callback to fire after `steps` time-steps elapse.
    fn register_timed(&mut self, steps: u64, cb: TimedCallback) -> GpiHandle;
    /// Registers a callback to fire on any change of `signal`'s value.
    fn register_value_change(&mut self, signal: SignalId, cb: ValueCallback) -> GpiHandle;
    /// Registers a callback to fire at the next ReadWrite phase.
    fn register_readwrite(&mut self, cb: PhaseCallback) -> GpiHandle;
    /// Registers a callback to fire at the next ReadOnly phase.
    fn register_readonly(&mut self, cb: PhaseCallback) -> GpiHandle;
    /// Registers a callback to fire at the start of the next time-step.
    fn register_nexttime(&mut self, cb: PhaseCallback) -> GpiHandle;
    /// Cancels a previously-registered callback, if it has not fired yet.
    fn deregister(&mut self, handle: GpiHandle);
    /// Reads a signal's current value.
    fn read_signal(&self, signal: SignalId) -> i64;
    /// Writes a signal's value immediately.
    ///
    /// This is the only write primitive a GPI binding exposes; the
    /// ReadWrite-phase coalescing in §6.2 is owned entirely by
    /// [`crate::scheduler::Scheduler::schedule_write`], which buffers
    /// writes itself and calls this once its primed ReadWrite callback
    /// fires. Call this directly only for the deprecated "set immediate
    /// value" path ([`crate::scheduler::Scheduler::write_now`]).
    fn write_signal_now(&mut self, signal: SignalId, value: i64);
    /// The simulator's current phase.
    fn phase(&self) -> Phase;
    /// The simulator's current time.
    fn now(&self) -> SimTime;
    /// Settles writes and synchronization phases for the current delta,
    /// then advances to the next timed event, if any.
    ///
    /// A real GPI binding never calls this itself - the simulator
    /// process drives its own event loop and calls back into the
    /// scheduler. It exists so [`crate::scheduler::Scheduler::run`] can
    /// drive a [`SimulatorStub`] (or any other in-process `Gpi`) end to
    /// end in tests without a real simulator attached. Returns `false`
    /// once there are no more timed events pending.
    fn pump(&mut self) -> bool;
}

fn next_handle() -> GpiHandle {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    GpiHandle(NEXT.fetch_add(1, Ordering::Relaxed))
}

#[derive(PartialEq, Eq)]
struct TimedEntry {
    time: SimTime,
    seq: u64,
    handle: GpiHandle,
}

impl Ord for TimedEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.time, self.seq).cmp(&(other.time, other.seq))
    }
}
impl PartialOrd for TimedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// A minimal in-process stand-in for a simulator process.
///
/// Drives its own discrete-event loop (`advance`) so tests can exercise
/// the scheduler and trigger system end to end without a real GPI
/// binding. Write-coalescing (§6.2) is owned by
/// [`crate::scheduler::Scheduler::schedule_write`], not this stub - a
/// signal write lands here only once that collaborator's primed
/// ReadWrite callback flushes it, via `write_signal_now`.
pub struct SimulatorStub {
    now: SimTime,
    phase: Phase,
    seq: u64,
    timed_heap: BinaryHeap<Reverse<TimedEntry>>,
    timed_callbacks: HashMap<GpiHandle, TimedCallback>,
    value_callbacks: HashMap<SignalId, Vec<(GpiHandle, ValueCallback)>>,
    readwrite_callbacks: VecDeque<(GpiHandle, PhaseCallback)>,
    readonly_callbacks: VecDeque<(GpiHandle, PhaseCallback)>,
    nexttime_callbacks: VecDeque<(GpiHandle, PhaseCallback)>,
    signals: HashMap<SignalId, i64>,
    cancelled: std::collections::HashSet<GpiHandle>,
}

impl SimulatorStub {
    /// Creates a fresh stub at time zero, NORMAL phase.
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            now: SimTime::ZERO,
            phase: Phase::Normal,
            seq: 0,
            timed_heap: BinaryHeap::new(),
            timed_callbacks: HashMap::new(),
            value_callbacks: HashMap::new(),
            readwrite_callbacks: VecDeque::new(),
            readonly_callbacks: VecDeque::new(),
            nexttime_callbacks: VecDeque::new(),
            signals: HashMap::new(),
            cancelled: std::collections::HashSet::new(),
        }))
    }

    /// Fires any ReadWrite callbacks registered for the current delta -
    /// including the write-scheduler collaborator's flush, if a write
    /// was buffered. Call once per simulated ReadWrite phase, after
    /// `advance` or `settle_zero_delay`.
    pub fn settle_writes(&mut self) {
        self.phase = Phase::ReadWrite;
        self.drain_phase_queue_readwrite();
    }

    /// Fires any ReadOnly callbacks registered for the current delta.
    pub fn settle_readonly(&mut self) {
        self.phase = Phase::ReadOnly;
        self.drain_phase_queue_readonly();
    }

    /// Advances simulated time to the next pending timed callback, if
    /// any, firing it. Returns `false` if no timed callbacks remain.
    pub fn advance(&mut self) -> bool {
        self.phase = Phase::Normal;
        let Some(Reverse(entry)) = self.timed_heap.pop() else {
            return false;
        };
        self.now = entry.time;
        if self.cancelled.remove(&entry.handle) {
            return self.advance();
        }
        if let Some(cb) = self.timed_callbacks.remove(&entry.handle) {
            cb();
        }
        self.drain_phase_queue_nexttime();
        true
    }

    /// Tries every subscriber registered for `signal`'s value change.
    /// A subscriber whose edge predicate doesn't match this change is
    /// kept registered rather than dropped, so a later opposite-direction
    /// transition still reaches it.
    fn fire_value_callbacks(&mut self, signal: SignalId, value: i64) {
        let Some(subs) = self.value_callbacks.remove(&signal) else {
            return;
        };
        let mut remaining = Vec::new();
        for (handle, mut cb) in subs {
            if self.cancelled.remove(&handle) {
                continue;
            }
            if !cb(value) {
                remaining.push((handle, cb));
            }
        }
        if !remaining.is_empty() {
            self.value_callbacks.insert(signal, remaining);
        }
    }

    fn drain_phase_queue_readwrite(&mut self) {
        let queue = std::mem::take(&mut self.readwrite_callbacks);
        for (handle, cb) in queue {
            if !self.cancelled.remove(&handle) {
                cb(self);
            }
        }
    }

    fn drain_phase_queue_readonly(&mut self) {
        let queue = std::mem::take(&mut self.readonly_callbacks);
        for (handle, cb) in queue {
            if !self.cancelled.remove(&handle) {
                cb(self);
            }
        }
    }

    fn drain_phase_queue_nexttime(&mut self) {
        let queue = std::mem::take(&mut self.nexttime_callbacks);
        for (handle, cb) in queue {
            if !self.cancelled.remove(&handle) {
                cb(self);
            }
        }
    }
}

impl Gpi for SimulatorStub {
    fn register_timed(&mut self, steps: u64, cb: TimedCallback) -> GpiHandle {
        let handle = next_handle();
        let time = self.now.checked_add_steps(steps).unwrap_or(SimTime::MAX);
        self.seq += 1;
        self.timed_heap.push(Reverse(TimedEntry {
            time,
            seq: self.seq,
            handle,
        }));
        self.timed_callbacks.insert(handle, cb);
        handle
    }

    fn register_value_change(&mut self, signal: SignalId, cb: ValueCallback) -> GpiHandle {
        let handle = next_handle();
        self.value_callbacks.entry(signal).or_default().push((handle, cb));
        handle
    }

    fn register_readwrite(&mut self, cb: PhaseCallback) -> GpiHandle {
        let handle = next_handle();
        self.readwrite_callbacks.push_back((handle, cb));
        handle
    }

    fn register_readonly(&mut self, cb: PhaseCallback) -> GpiHandle {
        let handle = next_handle();
        self.readonly_callbacks.push_back((handle, cb));
        handle
    }

    fn register_nexttime(&mut self, cb: PhaseCallback) -> GpiHandle {
        let handle = next_handle();
        self.nexttime_callbacks.push_back((handle, cb));
        handle
    }

    fn deregister(&mut self, handle: GpiHandle) {
        self.cancelled.insert(handle);
        self.timed_callbacks.remove(&handle);
    }

    fn read_signal(&self, signal: SignalId) -> i64 {
        self.signals.get(&signal).copied().unwrap_or(0)
    }

    fn write_signal_now(&mut self, signal: SignalId, value: i64) {
        let old = self.signals.insert(signal, value);
        if old != Some(value) {
            self.fire_value_callbacks(signal, value);
        }
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn now(&self) -> SimTime {
        self.now
    }

    fn pump(&mut self) -> bool {
        self.settle_writes();
        self.settle_readonly();
        self.advance()
    }
}

/// Lets a shared handle to a [`SimulatorStub`] be handed to
/// [`crate::scheduler::Scheduler::new`] directly as a `Box<dyn Gpi>`,
/// while callers keep their own `Rc<RefCell<SimulatorStub>>` to drive
/// signals and phases from outside the scheduler (e.g. to assert on
/// `read_signal` after a test run).
impl Gpi for Rc<RefCell<SimulatorStub>> {
    fn register_timed(&mut self, steps: u64, cb: TimedCallback) -> GpiHandle {
        self.borrow_mut().register_timed(steps, cb)
    }

    fn register_value_change(&mut self, signal: SignalId, cb: ValueCallback) -> GpiHandle {
        self.borrow_mut().register_value_change(signal, cb)
    }

    fn register_readwrite(&mut self, cb: PhaseCallback) -> GpiHandle {
        self.borrow_mut().register_readwrite(cb)
    }

    fn register_readonly(&mut self, cb: PhaseCallback) -> GpiHandle {
        self.borrow_mut().register_readonly(cb)
    }

    fn register_nexttime(&mut self, cb: PhaseCallback) -> GpiHandle {
        self.borrow_mut().register_nexttime(cb)
    }

    fn deregister(&mut self, handle: GpiHandle) {
        self.borrow_mut().deregister(handle)
    }

    fn read_signal(&self, signal: SignalId) -> i64 {
        self.borrow().read_signal(signal)
    }

    fn write_signal_now(&mut self, signal: SignalId, value: i64) {
        self.borrow_mut().write_signal_now(signal, value)
    }

    fn phase(&self) -> Phase {
        self.borrow().phase()
    }

    fn now(&self) -> SimTime {
        self.borrow().now()
    }

    fn pump(&mut self) -> bool {
        self.borrow_mut().pump()
    }
}
