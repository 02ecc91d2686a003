//! Discrete simulation time.
//!
//! Time is a step count, the unit the GPI collaborator (§6.1) natively
//! speaks in; one step's wall/sim duration is the simulator's reported
//! precision, queried once at startup (see [`crate::config::Config`]).

use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// A point in simulated time, expressed in simulator time-steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimTime(u64);

impl SimTime {
    /// The start of the simulation.
    pub const ZERO: SimTime = SimTime(0);

    /// The largest representable time point.
    pub const MAX: SimTime = SimTime(u64::MAX);

    /// Constructs a time point from a raw step count.
    pub const fn from_steps(steps: u64) -> Self {
        Self(steps)
    }

    /// The raw step count.
    pub const fn as_steps(self) -> u64 {
        self.0
    }

    /// Returns the time point `steps` after this one, saturating at [`SimTime::MAX`].
    #[must_use]
    pub fn checked_add_steps(self, steps: u64) -> Option<Self> {
        self.0.checked_add(steps).map(Self)
    }
}

impl Add<u64> for SimTime {
    type Output = SimTime;
    fn add(self, rhs: u64) -> SimTime {
        SimTime(self.0 + rhs)
    }
}

impl AddAssign<u64> for SimTime {
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}

impl Sub<SimTime> for SimTime {
    type Output = u64;
    fn sub(self, rhs: SimTime) -> u64 {
        self.0 - rhs.0
    }
}

impl SubAssign<u64> for SimTime {
    fn sub_assign(&mut self, rhs: u64) {
        self.0 -= rhs;
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} steps", self.0)
    }
}

/// The simulator synchronization phase currently in effect.
///
/// GPI-delivered ReadWrite and ReadOnly callbacks update this before any
/// user code runs; it gates which triggers may be primed (§4.2, §4.5.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Outside of any synchronization callback; signal writes are buffered.
    Normal,
    /// Writes are visible; new ReadWrite/ReadOnly triggers may be primed.
    ReadWrite,
    /// Reads are stable; priming a new ReadWrite or ReadOnly trigger is refused.
    ReadOnly,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_step_count() {
        assert!(SimTime::from_steps(5) < SimTime::from_steps(10));
        assert_eq!(SimTime::ZERO + 5, SimTime::from_steps(5));
    }

    #[test]
    fn sub_yields_step_delta() {
        assert_eq!(SimTime::from_steps(10) - SimTime::from_steps(4), 6);
    }
}
