//! Error types for the scheduler and trigger system.

use std::error::Error as StdError;
use std::fmt;

/// The kind of failure a [`SchedulerError`] represents.
///
/// This mirrors the error taxonomy a cosimulation runtime has to
/// distinguish: bugs in the scheduler itself, failures reported by the
/// attached simulator, user-task failures, and the handful of domain
/// errors (double-await, release of an unheld lock, ...) that are
/// raised synchronously at the call site instead of injected into a task.
#[derive(Debug)]
pub enum ErrorKind {
    /// A scheduler invariant was violated. If you see this, report a bug.
    Internal,
    /// The attached simulator reported a failure.
    SimFailure,
    /// A `with_timeout` deadline elapsed before the inner future resolved.
    Timeout,
    /// The task was cancelled before it completed.
    Cancelled,
    /// The simulator refused to register a requested callback.
    TriggerRefused,
    /// A domain-level misuse (negative duration, double-await, unheld-lock release, ...).
    Domain,
    /// An error returned or panicked by user task code.
    User,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Internal => "internal error",
            ErrorKind::SimFailure => "simulator failure",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::TriggerRefused => "trigger refused",
            ErrorKind::Domain => "domain error",
            ErrorKind::User => "user error",
        };
        f.write_str(s)
    }
}

/// The error type produced by the scheduler, its triggers, and the tasks it drives.
pub struct SchedulerError {
    kind: ErrorKind,
    internal: String,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl SchedulerError {
    /// Constructs a new error of the given kind with a message.
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            internal: msg.into(),
            source: None,
        }
    }

    /// Wraps a user error (returned or panicked by task code).
    pub fn user(err: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            kind: ErrorKind::User,
            internal: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Shorthand for [`ErrorKind::Internal`].
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, msg)
    }

    /// Shorthand for [`ErrorKind::Domain`].
    pub fn domain(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Domain, msg)
    }

    /// Shorthand for [`ErrorKind::Timeout`].
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, msg)
    }

    /// Shorthand for [`ErrorKind::Cancelled`].
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, msg)
    }

    /// The kind of error this is.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl fmt::Debug for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchedulerError {{ kind: {:?}, internal: {:?} }}", self.kind, self.internal)
    }
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -- {}", self.internal, self.kind)
    }
}

impl StdError for SchedulerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

/// Convenience alias used throughout the crate's fallible APIs.
pub type Result<T> = std::result::Result<T, SchedulerError>;
