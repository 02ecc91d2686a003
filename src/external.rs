//! The external bridge (§4.6): handoff between the single scheduler
//! thread and foreign blocking threads.
//!
//! Grounded on `cocotb._scheduler.external_waiter`/`Scheduler._run_in_executor`/
//! `Scheduler._queue_function` (`original_source/src/cocotb/_scheduler.py`):
//! the INIT/RUNNING/PAUSED/EXITED state machine and the condition-variable
//! handshake are carried over as-is, re-expressed with `std::thread` and
//! `std::sync::{Mutex, Condvar}` - the direct analogue of Python's
//! `threading.Condition` - instead of a generator-trampoline.

use std::cell::RefCell;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::task::{capture, Outcome};

/// The state of one [`ExternalWaiter`] rendezvous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    Running,
    Paused,
    Exited,
}

/// The non-generic half of an external's state: the state machine and
/// its condition variable. Split out from [`Shared`] so a foreign
/// thread can stash a type-erased handle to *its own* rendezvous in
/// thread-local storage (see [`CURRENT_EXTERNAL`]) for [`queue_function`]
/// to find, without needing to know that thread's result type `R`.
struct SyncState {
    state: Mutex<State>,
    condvar: Condvar,
}

impl SyncState {
    fn new() -> Self {
        Self {
            state: Mutex::new(State::Init),
            condvar: Condvar::new(),
        }
    }

    fn set(&self, new_state: State) {
        let mut state = self.state.lock().unwrap();
        *state = new_state;
        self.condvar.notify_all();
    }

    /// Blocks the calling (scheduler) thread until the foreign thread
    /// reports `EXITED` or `PAUSED`.
    fn wait_for_progress(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        while *state == State::Init || *state == State::Running {
            state = self.condvar.wait(state).unwrap();
        }
        *state == State::Exited
    }
}

thread_local! {
    /// Set for the lifetime of the closure running on an
    /// [`ExternalWaiter`]'s foreign thread, so [`queue_function`] called
    /// from within that closure can find the rendezvous it should pause.
    static CURRENT_EXTERNAL: RefCell<Option<Arc<SyncState>>> = const { RefCell::new(None) };
}

struct Shared<R> {
    sync: Arc<SyncState>,
    outcome: Mutex<Option<Outcome<R>>>,
}

/// A rendezvous between the scheduler thread and one foreign thread
/// running a blocking function via [`run_in_executor`].
pub struct ExternalWaiter<R> {
    shared: Arc<Shared<R>>,
    handle: Option<JoinHandle<()>>,
}

impl<R: Send + 'static> ExternalWaiter<R> {
    /// Spawns `func` on a fresh OS thread and returns a waiter the
    /// scheduler thread can block on until it completes.
    pub fn spawn(func: impl FnOnce() -> R + Send + 'static) -> Self {
        let shared = Arc::new(Shared {
            sync: Arc::new(SyncState::new()),
            outcome: Mutex::new(None),
        });

        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::spawn(move || {
            thread_shared.sync.set(State::Running);
            CURRENT_EXTERNAL.with(|c| *c.borrow_mut() = Some(Arc::clone(&thread_shared.sync)));
            let outcome = capture(func);
            CURRENT_EXTERNAL.with(|c| *c.borrow_mut() = None);
            *thread_shared.outcome.lock().unwrap() = Some(outcome);
            thread_shared.sync.set(State::Exited);
        });

        Self {
            shared,
            handle: Some(handle),
        }
    }

    /// Blocks the calling (scheduler) thread until the foreign thread
    /// reports `EXITED` or `PAUSED`.
    ///
    /// Returns `true` once the foreign thread has exited and its
    /// outcome is ready via [`ExternalWaiter::take_outcome`].
    pub fn wait_for_progress(&self) -> bool {
        self.shared.sync.wait_for_progress()
    }

    /// Takes the foreign thread's outcome. Only meaningful after
    /// [`ExternalWaiter::wait_for_progress`] returned `true`.
    pub fn take_outcome(&self) -> Option<Outcome<R>> {
        self.shared.outcome.lock().unwrap().take()
    }

    /// Joins the underlying OS thread. Called once the waiter has exited.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// A one-shot thread-side completion signal, used by [`queue_function`]
/// to block a foreign thread until a future it queued on the scheduler
/// has run to completion.
pub struct ThreadEvent {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ThreadEvent {
    /// Creates a new, unset event.
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    /// Returns a clone that, when [`ThreadEvent::set`] is called on it
    /// (or the original), wakes every waiter.
    pub fn handle(&self) -> ThreadEvent {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Sets the event, waking any thread blocked in [`ThreadEvent::wait`].
    pub fn set(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }

    /// Blocks until [`ThreadEvent::set`] is called.
    pub fn wait(&self) {
        let (lock, cvar) = &*self.inner;
        let mut set = lock.lock().unwrap();
        while !*set {
            set = cvar.wait(set).unwrap();
        }
    }
}

impl Default for ThreadEvent {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased view of a pending [`ExternalWaiter`], so the scheduler
/// can keep waiters of different result types in one list.
pub(crate) trait ErasedExternal {
    /// Blocks until the foreign thread reports progress. Returns `true` once it has exited.
    fn wait_for_progress(&self) -> bool;
    /// Delivers the outcome to the awaiting task and joins the OS thread. Called once exited.
    fn finish(&mut self);
}

pub(crate) struct ExternalEntry<R> {
    waiter: ExternalWaiter<R>,
    fired: std::rc::Rc<std::cell::Cell<bool>>,
    outcome_slot: std::rc::Rc<std::cell::RefCell<Option<Outcome<R>>>>,
    waker: std::task::Waker,
}

impl<R> ErasedExternal for ExternalEntry<R> {
    fn wait_for_progress(&self) -> bool {
        self.waiter.wait_for_progress()
    }

    fn finish(&mut self) {
        *self.outcome_slot.borrow_mut() = self.waiter.take_outcome();
        self.fired.set(true);
        self.waiter.join();
        self.waker.wake_by_ref();
    }
}

/// A future that runs `func` on a fresh OS thread and resolves with its outcome.
///
/// This is the scheduler-side half of §4.6's `run_in_executor`: polling
/// it the first time spawns the foreign thread and registers an
/// [`ExternalEntry`] with the scheduler, which drains it - blocking on
/// its condition variable - at the tail of every task resume
/// (§4.5.2 step 5) until the thread exits.
pub struct RunInExecutor<R> {
    func: Option<Box<dyn FnOnce() -> R + Send>>,
    fired: std::rc::Rc<std::cell::Cell<bool>>,
    outcome_slot: std::rc::Rc<std::cell::RefCell<Option<Outcome<R>>>>,
    registered: bool,
}

impl<R: Send + 'static> RunInExecutor<R> {
    /// Wraps `func` to be run on a fresh OS thread once awaited.
    pub fn new(func: impl FnOnce() -> R + Send + 'static) -> Self {
        Self {
            func: Some(Box::new(func)),
            fired: std::rc::Rc::new(std::cell::Cell::new(false)),
            outcome_slot: std::rc::Rc::new(std::cell::RefCell::new(None)),
            registered: false,
        }
    }
}

impl<R: Send + 'static> std::future::Future for RunInExecutor<R> {
    type Output = Outcome<R>;

    fn poll(self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Outcome<R>> {
        let this = self.get_mut();
        if this.fired.get() {
            return std::task::Poll::Ready(
                this.outcome_slot
                    .borrow_mut()
                    .take()
                    .unwrap_or_else(|| Outcome::Error(crate::error::SchedulerError::internal("external outcome missing"))),
            );
        }
        if !this.registered {
            this.registered = true;
            let func = this.func.take().expect("polled twice before registering");
            let waiter = ExternalWaiter::spawn(func);
            let entry = ExternalEntry {
                waiter,
                fired: std::rc::Rc::clone(&this.fired),
                outcome_slot: std::rc::Rc::clone(&this.outcome_slot),
                waker: cx.waker().clone(),
            };
            let sched = crate::context::current_scheduler()
                .upgrade()
                .expect("scheduler dropped while starting an external");
            crate::scheduler::SchedulerInner::register_external(&sched, Box::new(entry));
        }
        std::task::Poll::Pending
    }
}

/// Runs `func` on a fresh OS thread and awaits its result without
/// blocking the scheduler thread's other tasks.
pub async fn run_in_executor<R: Send + 'static>(func: impl FnOnce() -> R + Send + 'static) -> Outcome<R> {
    RunInExecutor::new(func).await
}

/// A thread-safe queue of closures to run on the scheduler thread,
/// letting a foreign ("external") thread schedule work back onto the
/// single-threaded scheduler.
#[derive(Clone)]
pub struct ForeignQueue {
    inner: Arc<Mutex<Vec<Box<dyn FnOnce(&crate::scheduler::Scheduler) + Send>>>>,
}

impl ForeignQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Pushes a closure to be run on the scheduler thread.
    pub fn push(&self, job: Box<dyn FnOnce(&crate::scheduler::Scheduler) + Send>) {
        self.inner.lock().unwrap().push(job);
    }

    pub(crate) fn drain(&self) -> Vec<Box<dyn FnOnce(&crate::scheduler::Scheduler) + Send>> {
        std::mem::take(&mut *self.inner.lock().unwrap())
    }
}

impl Default for ForeignQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Called from inside a foreign ("external") thread spawned by
/// [`run_in_executor`]: schedules `make_future` to build and run a
/// future on the main scheduler, then blocks this thread until it
/// completes.
///
/// Grounded on `Scheduler._queue_function`: the calling thread marks
/// its own rendezvous `PAUSED` before blocking, which is what lets
/// [`crate::scheduler::Scheduler::drain_externals`] move on to other
/// pending externals - and drain `queue`, running `make_future`'s task -
/// instead of staying blocked on a thread that isn't making progress.
/// The queued task flips the rendezvous back to `RUNNING` before
/// signaling completion, so the scheduler thread never observes this
/// external as both done and still runnable at once.
///
/// # Panics
/// Panics if called from a thread that isn't running inside a
/// [`run_in_executor`] closure, or if the scheduled task fails or is
/// cancelled before completing.
pub fn queue_function<R: Send + 'static>(
    queue: &ForeignQueue,
    make_future: impl FnOnce(&crate::scheduler::Scheduler) -> std::pin::Pin<Box<dyn std::future::Future<Output = R>>>
        + Send
        + 'static,
) -> R {
    let sync = CURRENT_EXTERNAL
        .with(|c| c.borrow().clone())
        .expect("queue_function called from a thread that is not a registered external");

    let event = ThreadEvent::new();
    let result: Arc<Mutex<Option<Result<R, crate::error::SchedulerError>>>> = Arc::new(Mutex::new(None));

    let event_for_sched = event.handle();
    let result_for_sched = Arc::clone(&result);
    let sync_for_sched = Arc::clone(&sync);
    queue.push(Box::new(move |scheduler| {
        let fut = make_future(scheduler);
        let task = scheduler.spawn(async move { fut.await });
        task.add_done_callback(move |t| {
            *result_for_sched.lock().unwrap() = Some(t.result());
            // Resumed before the event fires, so the scheduler thread
            // sees RUNNING before this thread can wake and go back to
            // sleep by calling `queue_function` again.
            sync_for_sched.set(State::Running);
            event_for_sched.set();
        });
    }));

    sync.set(State::Paused);
    event.wait();
    result
        .lock()
        .unwrap()
        .take()
        .expect("queue_function: completion signaled without a result")
        .expect("queue_function: scheduled task failed")
}
