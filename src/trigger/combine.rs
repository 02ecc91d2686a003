//! `Combine`, `First`, and `with_timeout`: composite triggers.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;

use crate::error::SchedulerError;
use crate::scheduler::Scheduler;
use crate::task::Task;
use crate::trigger::{Join, Timer};

/// Resolves once every constituent trigger has fired.
pub struct Combine {
    parts: Vec<(bool, Pin<Box<dyn Future<Output = ()>>>)>,
}

impl Combine {
    /// Builds a combinator over `triggers` that resolves once all of them have fired.
    pub fn new(triggers: Vec<Pin<Box<dyn Future<Output = ()>>>>) -> Self {
        Self {
            parts: triggers.into_iter().map(|f| (false, f)).collect(),
        }
    }
}

impl Future for Combine {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let mut all_done = true;
        for (done, fut) in &mut this.parts {
            if !*done {
                if fut.as_mut().poll(cx).is_ready() {
                    *done = true;
                } else {
                    all_done = false;
                }
            }
        }
        if all_done {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

/// Resolves as soon as any one constituent trigger has fired.
pub struct First {
    parts: Vec<Pin<Box<dyn Future<Output = ()>>>>,
}

impl First {
    /// Builds a combinator over `triggers` that resolves once any of them has fired.
    pub fn new(triggers: Vec<Pin<Box<dyn Future<Output = ()>>>>) -> Self {
        Self { parts: triggers }
    }
}

impl Future for First {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        for fut in &mut this.parts {
            if fut.as_mut().poll(cx).is_ready() {
                return Poll::Ready(());
            }
        }
        Poll::Pending
    }
}

pin_project! {
    struct Race<A, B> {
        #[pin]
        a: A,
        #[pin]
        b: B,
    }
}

enum RaceOutcome {
    A,
    B,
}

impl<A: Future<Output = ()>, B: Future<Output = ()>> Future for Race<A, B> {
    type Output = RaceOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<RaceOutcome> {
        let this = self.project();
        if this.a.poll(cx).is_ready() {
            return Poll::Ready(RaceOutcome::A);
        }
        if this.b.poll(cx).is_ready() {
            return Poll::Ready(RaceOutcome::B);
        }
        Poll::Pending
    }
}

/// Races `fut` against a `steps`-step [`Timer`]; if the timer wins, the
/// wrapped task is killed (per §4.4, `kill()` is silent - the task's own
/// outcome is simply discarded) and a [`SchedulerError`] of kind
/// [`crate::error::ErrorKind::Timeout`] is returned.
pub async fn with_timeout<R: 'static>(
    scheduler: &Scheduler,
    fut: impl Future<Output = R> + 'static,
    steps: u64,
) -> Result<R, SchedulerError> {
    let task: Rc<Task<R>> = scheduler.spawn(fut);
    let race = Race {
        a: Join::new(Rc::clone(&task)),
        b: Timer::new(steps)?,
    };
    match race.await {
        RaceOutcome::A => task.result(),
        RaceOutcome::B => {
            task.kill();
            Err(SchedulerError::timeout(format!(
                "with_timeout: deadline of {steps} simulation steps elapsed"
            )))
        }
    }
}
