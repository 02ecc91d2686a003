//! The write-scheduler collaborator (§6.2): coalesces signal writes
//! issued outside the ReadWrite phase so they become observable, in
//! insertion order, no earlier than the next ReadWrite phase.
//!
//! Owns its own pending-write buffer and primes a ReadWrite callback
//! against the GPI the first time a write lands in the current delta,
//! rather than leaning on the attached [`crate::gpi::Gpi`] to buffer
//! writes on its behalf - a real GPI binding applies a write the
//! moment it's told to, so the coalescing discipline has to live on
//! this side of that boundary. See
//! [`crate::scheduler::Scheduler::schedule_write`].

use crate::gpi::SignalId;

#[derive(Default)]
pub(crate) struct WriteScheduler {
    pending: Vec<(SignalId, i64)>,
    primed: bool,
}

impl WriteScheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Buffers `value` for `signal`. Returns `true` the first time a
    /// write lands in the current (unprimed) delta, telling the caller
    /// to register the ReadWrite callback that will flush via
    /// [`WriteScheduler::take_pending`].
    pub(crate) fn buffer(&mut self, signal: SignalId, value: i64) -> bool {
        self.pending.push((signal, value));
        let first_this_delta = !self.primed;
        self.primed = true;
        first_this_delta
    }

    /// Drains the buffered writes in insertion order, un-priming the
    /// collaborator so the next buffered write primes a fresh callback.
    pub(crate) fn take_pending(&mut self) -> Vec<(SignalId, i64)> {
        self.primed = false;
        std::mem::take(&mut self.pending)
    }
}
