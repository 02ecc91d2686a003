//! The scheduler (§4.5): the single-threaded event loop that resumes
//! tasks, dispatches fired triggers, and owns the GPI collaborator.
//!
//! Grounded on the upstream runtime's own driver/reactor split
//! (`runtime::mod`, `time::driver::Driver`): a central `Rc<RefCell<_>>`
//! of mutable state, entered via a thread-local for the duration of a
//! run, with task wake-ups funneled through one ready queue rather than
//! each trigger resuming its task directly.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::rc::Rc;
use std::task::Waker;

use fxhash::{FxHashMap, FxHashSet};

use crate::config::Config;
use crate::context;
use crate::external::{ErasedExternal, ForeignQueue};
use crate::gpi::{Gpi, SignalId};
use crate::profiler::Profiler;
use crate::task::{ErasedTask, Task, TaskId};
use crate::time::Phase;
use crate::trigger::TriggerId;
use crate::waker::task_waker;
use crate::write_scheduler::WriteScheduler;

struct Registration {
    waker: Waker,
    on_fire: Box<dyn FnOnce()>,
}

/// The scheduler's mutable state. Never touched directly by user code;
/// see [`Scheduler`] for the public handle.
pub(crate) struct SchedulerInner {
    /// `None` only while checked out by [`Scheduler::with_gpi_exclusive`]
    /// for the duration of a call (`pump`, `write_signal_now`, ...) that
    /// may synchronously invoke a callback needing to borrow this same
    /// scheduler back - a borrow this field's own accessors would
    /// otherwise still be holding.
    gpi: Option<Box<dyn Gpi>>,
    tasks: FxHashMap<TaskId, Rc<dyn ErasedTask>>,
    ready_queue: VecDeque<TaskId>,
    in_ready_queue: FxHashSet<TaskId>,
    trigger_to_tasks: FxHashMap<TriggerId, Registration>,
    externals: Vec<Box<dyn ErasedExternal>>,
    foreign_queue: ForeignQueue,
    write_scheduler: WriteScheduler,
    terminate: bool,
    test_task: Option<TaskId>,
    config: Config,
    profiler: Profiler,
}

impl SchedulerInner {
    /// Mutable access to the GPI collaborator, used by every GPI-backed
    /// trigger (`crate::trigger::timer`/`edge`/`phase`) to register its
    /// fire-source callback. Registration never fires a callback
    /// synchronously, so holding a borrow of the rest of the scheduler
    /// across this call is safe, unlike [`Scheduler::with_gpi_exclusive`].
    pub(crate) fn gpi_mut(&mut self) -> &mut dyn Gpi {
        self.gpi.as_deref_mut().expect("gpi checked out reentrantly")
    }

    #[allow(dead_code)]
    pub(crate) fn gpi(&self) -> &dyn Gpi {
        self.gpi.as_deref().expect("gpi checked out reentrantly")
    }

    /// The simulator's current synchronization phase, checked by
    /// phase-transition triggers before priming against the GPI.
    pub(crate) fn phase(&self) -> Phase {
        self.gpi().phase()
    }

    /// Registers a freshly-primed trigger so [`SchedulerInner::fire_trigger`]
    /// can later look up its waker and local "mark fired" callback.
    pub(crate) fn register_trigger(
        sched: &Rc<RefCell<Self>>,
        trigger_id: TriggerId,
        _task_id: TaskId,
        waker: Waker,
        on_fire: Box<dyn FnOnce()>,
    ) {
        sched
            .borrow_mut()
            .trigger_to_tasks
            .insert(trigger_id, Registration { waker, on_fire });
    }

    /// Removes a trigger's bookkeeping entry without firing it.
    pub(crate) fn deregister_trigger(sched: &Rc<RefCell<Self>>, trigger_id: TriggerId) {
        sched.borrow_mut().trigger_to_tasks.remove(&trigger_id);
    }

    /// Fires a primed trigger: unprimes it first (removes the
    /// bookkeeping entry), then runs its local callback and wakes its
    /// task - in that order, per the module invariant in
    /// `crate::trigger`.
    pub(crate) fn fire_trigger(sched: &Rc<RefCell<Self>>, trigger_id: TriggerId) {
        let registration = sched.borrow_mut().trigger_to_tasks.remove(&trigger_id);
        if let Some(registration) = registration {
            (registration.on_fire)();
            registration.waker.wake();
        }
    }

    /// Re-enqueues `task_id` on the ready queue, if it is not already there.
    pub(crate) fn wake_task(sched: &Rc<RefCell<Self>>, task_id: TaskId) {
        let mut inner = sched.borrow_mut();
        if inner.tasks.contains_key(&task_id) && inner.in_ready_queue.insert(task_id) {
            inner.ready_queue.push_back(task_id);
        }
    }

    /// Alias for [`SchedulerInner::wake_task`], used by [`crate::trigger::NullTrigger`]
    /// which has no fire source of its own to register against.
    pub(crate) fn queue_immediate(sched: &Rc<RefCell<Self>>, task_id: TaskId) {
        Self::wake_task(sched, task_id);
    }

    /// Registers a pending external (§4.6) to be drained by the event loop.
    pub(crate) fn register_external(sched: &Rc<RefCell<Self>>, entry: Box<dyn ErasedExternal>) {
        sched.borrow_mut().externals.push(entry);
    }
}

impl SchedulerInner {
    /// The queue foreign ("external") threads push scheduler-thread
    /// work onto via [`crate::external::queue_function`].
    pub(crate) fn foreign_queue(&self) -> ForeignQueue {
        self.foreign_queue.clone()
    }
}

/// The scheduler: drives spawned tasks to completion from simulator
/// callbacks, per §4.5.
///
/// Cheaply `Clone`-able; clones share the same underlying state, the
/// way a `tokio::runtime::Handle` is a lightweight reference to the
/// runtime it was taken from.
#[derive(Clone)]
pub struct Scheduler(Rc<RefCell<SchedulerInner>>);

impl Scheduler {
    /// Creates a new scheduler over `gpi`, configured from `config`.
    pub fn new(gpi: Box<dyn Gpi>, config: Config) -> Self {
        let profiler = Profiler::new(config.enable_profiling);
        let inner = SchedulerInner {
            gpi: Some(gpi),
            tasks: FxHashMap::default(),
            ready_queue: VecDeque::new(),
            in_ready_queue: FxHashSet::default(),
            trigger_to_tasks: FxHashMap::default(),
            externals: Vec::new(),
            foreign_queue: ForeignQueue::new(),
            write_scheduler: WriteScheduler::new(),
            terminate: false,
            test_task: None,
            config,
            profiler,
        };
        Self(Rc::new(RefCell::new(inner)))
    }

    /// This scheduler's configuration.
    pub fn config(&self) -> Config {
        self.0.borrow().config.clone()
    }

    /// The queue foreign ("external") threads use to schedule work back
    /// onto this scheduler via [`crate::external::queue_function`].
    pub fn foreign_queue(&self) -> ForeignQueue {
        self.0.borrow().foreign_queue()
    }

    /// Spawns `fut` as a new task, inserting it into the ready queue.
    ///
    /// The returned handle can be `.await`ed via [`crate::trigger::Join`]
    /// or raced via [`crate::trigger::with_timeout`].
    pub fn spawn<R: 'static>(&self, fut: impl Future<Output = R> + 'static) -> Rc<Task<R>> {
        self.spawn_named("task", fut)
    }

    /// Spawns `fut` as the scheduler's top-level test task: the
    /// scheduler's [`Scheduler::run`] terminates once this task becomes
    /// done, per §4.5.5, rather than waiting for every task to finish.
    pub fn spawn_test<R: 'static>(&self, fut: impl Future<Output = R> + 'static) -> Rc<Task<R>> {
        let task = self.spawn_named("test", fut);
        self.0.borrow_mut().test_task = Some(task.id());
        task
    }

    fn spawn_named<R: 'static>(&self, name: impl Into<String>, fut: impl Future<Output = R> + 'static) -> Rc<Task<R>> {
        let task = Task::new(name, fut);
        let erased: Rc<dyn ErasedTask> = task.clone() as Rc<dyn ErasedTask>;
        let id = task.id();
        let mut inner = self.0.borrow_mut();
        inner.tasks.insert(id, erased);
        if inner.in_ready_queue.insert(id) {
            inner.ready_queue.push_back(id);
        }
        drop(inner);
        task
    }

    /// Requests that the event loop stop at the next opportunity,
    /// without waiting for the test task or any other task to finish.
    pub fn shutdown_soon(&self) {
        self.0.borrow_mut().terminate = true;
    }

    /// Runs the event loop to completion: resumes ready tasks, drains
    /// externals, and pumps the GPI collaborator for more timed events,
    /// until the test task (if any) finishes, [`Scheduler::shutdown_soon`]
    /// is called, or there is no more work of any kind.
    pub fn run(&self) {
        let weak = Rc::downgrade(&self.0);
        context::with_scheduler(weak, || {
            loop {
                self.resume_ready();
                self.drain_foreign_queue();
                self.drain_externals();
                if self.0.borrow().terminate {
                    break;
                }
                if !self.0.borrow().ready_queue.is_empty() {
                    continue;
                }
                let advanced = self.with_gpi_exclusive(|gpi| gpi.pump());
                let idle = !advanced && self.0.borrow().externals.is_empty() && self.0.borrow().ready_queue.is_empty();
                if idle {
                    break;
                }
            }
            self.cleanup();
        });
    }

    /// Drains the ready queue, advancing each task exactly once per
    /// pass; a task that re-enqueues itself (directly or via a trigger
    /// that fires synchronously) is resumed again later in the same
    /// pass, never re-entrantly.
    fn resume_ready(&self) {
        loop {
            if self.0.borrow().terminate {
                return;
            }
            let next = {
                let mut inner = self.0.borrow_mut();
                let Some(task_id) = inner.ready_queue.pop_front() else {
                    return;
                };
                inner.in_ready_queue.remove(&task_id);
                inner.tasks.get(&task_id).cloned().map(|t| (task_id, t))
            };
            let Some((task_id, task)) = next else {
                continue;
            };

            self.0.borrow_mut().profiler.enable();
            let waker = task_waker(task_id, Rc::downgrade(&self.0));
            let finished = context::with_task(task_id, || task.advance(waker));
            self.0.borrow_mut().profiler.disable();

            if finished {
                let mut inner = self.0.borrow_mut();
                inner.tasks.remove(&task_id);
                if inner.test_task == Some(task_id) {
                    inner.terminate = true;
                }
            }
        }
    }

    /// Runs every closure a foreign thread queued via
    /// [`crate::external::queue_function`] since the last pass, on this
    /// (the scheduler) thread.
    fn drain_foreign_queue(&self) {
        let jobs = self.0.borrow().foreign_queue().drain();
        for job in jobs {
            job(self);
        }
    }

    /// Processes pending externals (§4.6): blocks on each in turn until
    /// it reports progress, delivering its outcome and re-enqueuing its
    /// task if it has exited, or leaving it pending otherwise.
    fn drain_externals(&self) {
        let pending: Vec<Box<dyn ErasedExternal>> = {
            let mut inner = self.0.borrow_mut();
            std::mem::take(&mut inner.externals)
        };
        for mut entry in pending {
            if entry.wait_for_progress() {
                entry.finish();
            } else {
                self.0.borrow_mut().externals.push(entry);
            }
        }
    }

    /// Shuts down remaining state per §4.5.5: kills every still-running
    /// task (silently, per `Task::kill`'s contract) and warns if any
    /// external thread never reported completion.
    fn cleanup(&self) {
        let remaining: Vec<Rc<dyn ErasedTask>> = {
            let inner = self.0.borrow();
            inner.tasks.values().cloned().collect()
        };
        for task in remaining {
            task.kill();
        }
        let mut inner = self.0.borrow_mut();
        inner.tasks.clear();
        inner.ready_queue.clear();
        inner.in_ready_queue.clear();
        if !inner.externals.is_empty() {
            tracing::warn!(
                pending = inner.externals.len(),
                "scheduler shut down with unresolved external threads still pending"
            );
        }
        inner.profiler.finalize();
    }

    /// Direct access to the GPI collaborator, for setting up signals
    /// before the first `run()` or inspecting state in tests.
    pub fn with_gpi<T>(&self, f: impl FnOnce(&mut dyn Gpi) -> T) -> T {
        self.with_gpi_exclusive(f)
    }

    /// Runs `f` with exclusive ownership of the GPI collaborator,
    /// without holding a borrow on the rest of the scheduler's state.
    ///
    /// `f` (`pump`, `write_signal_now`, ...) may synchronously invoke a
    /// previously-registered callback that needs to borrow this same
    /// scheduler back - to fire a trigger or flush the write-scheduler's
    /// buffer - so the GPI is moved out of [`SchedulerInner`] for the
    /// duration of the call rather than borrowed in place.
    fn with_gpi_exclusive<T>(&self, f: impl FnOnce(&mut dyn Gpi) -> T) -> T {
        let mut gpi = self.0.borrow_mut().gpi.take().expect("gpi checked out reentrantly");
        let result = f(gpi.as_mut());
        self.0.borrow_mut().gpi = Some(gpi);
        result
    }

    /// Buffers a write to `signal`; it becomes observable no earlier
    /// than the next ReadWrite phase (§6.2). The first write buffered
    /// in a delta primes a ReadWrite callback that flushes every write
    /// buffered since, in insertion order - this collaborator owns
    /// that buffer itself rather than leaning on the GPI to hold it,
    /// so the coalescing discipline holds even against a GPI binding
    /// that applies `write_signal_now` the moment it's called.
    pub fn schedule_write(&self, signal: SignalId, value: i64) {
        let primed_now = self.0.borrow_mut().write_scheduler.buffer(signal, value);
        if !primed_now {
            return;
        }
        let weak = Rc::downgrade(&self.0);
        self.0.borrow_mut().gpi_mut().register_readwrite(Box::new(move |gpi: &mut dyn Gpi| {
            let Some(sched) = weak.upgrade() else { return };
            let writes = sched.borrow_mut().write_scheduler.take_pending();
            for (signal, value) in writes {
                gpi.write_signal_now(signal, value);
            }
        }));
    }

    /// Writes `value` to `signal` immediately, bypassing write-coalescing.
    ///
    /// The deprecated "set immediate value" path (§6.2); ordinary task
    /// code should prefer [`Scheduler::schedule_write`].
    pub fn write_now(&self, signal: SignalId, value: i64) {
        self.with_gpi_exclusive(|gpi| gpi.write_signal_now(signal, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpi::SimulatorStub;
    use crate::trigger::Timer;

    #[test]
    fn runs_a_single_task_to_completion() {
        let gpi = SimulatorStub::new();
        let scheduler = Scheduler::new(Box::new(gpi), Config::from_env(&[]));
        let task = scheduler.spawn_test(async { 1 + 1 });
        scheduler.run();
        assert_eq!(task.result().unwrap(), 2);
    }

    #[test]
    fn timer_suspends_and_resumes_a_task() {
        let gpi = SimulatorStub::new();
        let scheduler = Scheduler::new(Box::new(gpi), Config::from_env(&[]));
        let task = scheduler.spawn_test(async {
            Timer::new(5).unwrap().await;
            42
        });
        scheduler.run();
        assert_eq!(task.result().unwrap(), 42);
    }
}
