//! The scheduler interface queues suspend and resume threads through.
//!
//! Queues do not own a scheduler. They call into the kernel's (singleton)
//! scheduler through the associated functions of [`Scheduler`], which a
//! platform implements once. With the `std` feature enabled, [`StdScheduler`]
//! implements it on top of `std::thread` parking, which is what hosted
//! builds and the tests use.
use core::time::Duration;

/// Thread parking primitives provided by the platform.
///
/// # Contract
///
/// - [`park`](Self::park) and [`park_timeout`](Self::park_timeout) block the
///   *current* thread. They may return early for no reason at all, and
///   callers re-check their wakeup condition after each return.
/// - [`unpark`](Self::unpark) makes the named thread's next (or current) park
///   return. An unpark that arrives before the thread parks must not be
///   lost.
/// - [`now`](Self::now) is monotonic.
///
/// `park` and `park_timeout` are never called while the critical section is
/// held. `now` and `unpark` may be, and `unpark` may also be called from
/// interrupt context.
pub trait Scheduler {
    /// A handle to a thread that may be parked.
    type Thread: Send;

    /// Returns a handle to the calling thread.
    fn current() -> Self::Thread;

    /// Returns the time elapsed since some fixed point in the past.
    fn now() -> Duration;

    /// Blocks the current thread until it is unparked.
    fn park();

    /// Blocks the current thread until it is unparked or `timeout` elapses.
    fn park_timeout(timeout: Duration);

    /// Wakes `thread` if it is parked.
    fn unpark(thread: &Self::Thread);
}

#[cfg(any(test, feature = "std"))]
pub use self::std_impl::StdScheduler;

#[cfg(any(test, feature = "std"))]
mod std_impl {
    use super::Scheduler;
    use core::time::Duration;
    use std::{sync::OnceLock, thread, time::Instant};

    /// A [`Scheduler`] backed by OS threads.
    #[derive(Copy, Clone, Debug, Default)]
    pub struct StdScheduler;

    static EPOCH: OnceLock<Instant> = OnceLock::new();

    impl Scheduler for StdScheduler {
        type Thread = thread::Thread;

        #[inline]
        fn current() -> Self::Thread {
            thread::current()
        }

        fn now() -> Duration {
            EPOCH.get_or_init(Instant::now).elapsed()
        }

        #[inline]
        fn park() {
            thread::park()
        }

        #[inline]
        fn park_timeout(timeout: Duration) {
            thread::park_timeout(timeout)
        }

        #[inline]
        fn unpark(thread: &Self::Thread) {
            thread.unpark()
        }
    }
}
