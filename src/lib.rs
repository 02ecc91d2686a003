//! A cooperative task scheduler and trigger system for
//! hardware-simulator cosimulation testbenches.
//!
//! Tasks are plain `async` blocks, spawned onto a [`scheduler::Scheduler`]
//! and driven forward by [`gpi::Gpi`]-backed triggers - timers, signal
//! edges, and the ReadWrite/ReadOnly/NextTimeStep synchronization
//! phases - plus the synchronization primitives in [`trigger`]
//! ([`trigger::Event`], [`trigger::Lock`]) and an external bridge
//! ([`external`]) for calling back into foreign blocking code.
//!
//! # Features
//!
//! - `serde`: derives `Serialize`/`Deserialize` on the small data types
//!   that benefit from it (currently [`time::SimTime`]).
//! - `multi-threaded`: reserved for a future multi-threaded scheduler
//!   variant; currently unused (see `DESIGN.md`).

pub mod config;
pub mod error;
pub mod external;
pub mod gpi;
pub mod logging;
pub mod profiler;
pub mod scheduler;
pub mod task;
pub mod time;
pub mod trigger;

pub(crate) mod context;
pub(crate) mod waker;
pub(crate) mod write_scheduler;

pub mod prelude {
    //! Re-exports of the types most test and task code needs.
    pub use crate::config::Config;
    pub use crate::error::{ErrorKind, SchedulerError};
    pub use crate::external::{run_in_executor, ForeignQueue};
    pub use crate::gpi::{Gpi, GpiHandle, SignalId, SimulatorStub};
    pub use crate::scheduler::Scheduler;
    pub use crate::task::{Outcome, Task, TaskId};
    pub use crate::time::{Phase, SimTime};
    pub use crate::trigger::{
        with_timeout, Combine, Edge, EdgeKind, Event, First, Join, Lock, NextTimeStep, NullTrigger, ReadOnly,
        ReadWrite, Timer,
    };
}
