//! The blocking transfer engine shared by input and output queues.
//!
//! Every thread-side operation moves exactly one byte per call to
//! [`transfer`]. One call is a small state machine:
//!
//! ```text
//! CHECK ──ready──> TRANSFER ──> DONE(value)
//!   │
//!   └─not ready──> SUSPEND ─┬─ woken ok ──> CHECK
//!                           ├─ timed out ─> DONE(timeout)
//!                           └─ reset ─────> DONE(reset)
//! ```
//!
//! The critical section is held for each `CHECK` and released for each
//! `SUSPEND`.
use crate::{
    error::QueueError,
    sched::Scheduler,
    timeout::Timeout,
    wait::{WaitList, Waiter, Wakeup},
};
use core::{cell::RefCell, pin::pin, time::Duration};
use critical_section::Mutex;

/// The state a queue keeps behind its critical-section mutex: the lower half
/// (ring and wait list) and the driver's notify callback.
pub(crate) struct Shared<L, N> {
    pub(crate) lower: L,
    pub(crate) notify: N,
}

/// A queue lower half with a wait list for blocked threads.
pub(crate) trait Lower {
    type Sched: Scheduler;

    fn wait_list(&mut self) -> &mut WaitList<<Self::Sched as Scheduler>::Thread>;
}

enum Step<R> {
    Done(R),
    Park(Option<Duration>),
}

/// Runs one blocking single-element transfer.
///
/// `before` runs once, under the critical section, before the first
/// readiness check. `attempt` runs under the critical section on every
/// check and returns `Some` once it managed to move the element.
pub(crate) fn transfer<L, N, R, B, A>(
    shared: &Mutex<RefCell<Shared<L, N>>>,
    timeout: Timeout,
    mut before: B,
    mut attempt: A,
) -> Result<R, QueueError>
where
    L: Lower,
    B: FnMut(&mut Shared<L, N>),
    A: FnMut(&mut Shared<L, N>) -> Option<R>,
{
    let waiter = pin!(Waiter::new(<L::Sched as Scheduler>::current()));
    let waiter = waiter.into_ref();
    let mut queued = false;

    loop {
        let step = critical_section::with(|cs| {
            let mut shared = shared.borrow_ref_mut(cs);
            let shared = &mut *shared;

            if queued {
                queued = false;
                match waiter.wakeup() {
                    Some(Wakeup::Ok) => {}
                    Some(Wakeup::Reset) => {
                        tracing::trace!("woken by queue reset");
                        return Err(QueueError::Reset);
                    }
                    None => {
                        // Safety: nobody popped us, so we're still linked,
                        // and nobody else can touch the list right now.
                        let removed = unsafe { shared.lower.wait_list().remove(waiter) };
                        debug_assert!(removed, "timed out waiter was not in its wait list");
                        tracing::trace!(?timeout, "timed out");
                        return Err(QueueError::Timeout);
                    }
                }
            } else {
                before(shared);
            }

            if let Some(done) = attempt(shared) {
                return Ok(Step::Done(done));
            }

            if timeout.is_immediate() {
                return Err(QueueError::Timeout);
            }

            waiter.arm();
            // Safety: the waiter is pinned on this stack frame, and we don't
            // return from this function until it has been unlinked again.
            unsafe { shared.lower.wait_list().enqueue(waiter) };
            queued = true;
            Ok(Step::Park(timeout.deadline(<L::Sched as Scheduler>::now())))
        })?;

        match step {
            Step::Done(done) => return Ok(done),
            Step::Park(deadline) => {
                tracing::trace!(?deadline, "suspending");
                waiter.park::<L::Sched>(deadline);
            }
        }
    }
}
