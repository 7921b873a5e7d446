//! Intrusive wait lists of suspended threads.
//!
//! A thread that has to block on a queue puts a [`Waiter`] on its own stack,
//! pins it, and links it into the queue's [`WaitList`] while holding the
//! critical section. It then leaves the critical section and parks. The
//! other side of the queue pops waiters off the list (again under the
//! critical section), stores a [`Wakeup`] status in them and unparks their
//! threads. Nothing here allocates.
//!
//! Timeouts are not delivered by the waker. A waiter whose deadline passes
//! without a status re-enters the critical section and unlinks itself. If a
//! wakeup lands between the deadline and that point, the wakeup wins.
use crate::sched::Scheduler;
use cordyceps::{list, Linked, List};
use core::{fmt, marker::PhantomPinned, pin::Pin, ptr::NonNull, time::Duration};
use portable_atomic::{AtomicU8, Ordering};

/// Why a parked thread was woken.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Wakeup {
    /// The condition the thread waits for may now hold.
    Ok,
    /// The queue was reset.
    Reset,
}

/// An ordered list of threads suspended on one queue condition.
///
/// Threads are woken in the order they were suspended.
pub struct WaitList<T> {
    list: List<Waiter<T>>,
}

/// A suspended thread, linked into a [`WaitList`] while it waits.
pub(crate) struct Waiter<T> {
    links: list::Links<Waiter<T>>,
    thread: T,
    state: AtomicU8,
    _pin: PhantomPinned,
}

const WAITING: u8 = 0;
const WOKEN_OK: u8 = 1;
const WOKEN_RESET: u8 = 2;

// === impl WaitList ===

impl<T> WaitList<T> {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self { list: List::new() }
    }

    /// Returns the number of threads currently waiting.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Links `waiter` at the back of the list.
    ///
    /// # Safety
    ///
    /// `waiter` must not already be linked, and must stay valid until it is
    /// unlinked again, either by a wakeup or by [`Self::remove`].
    pub(crate) unsafe fn enqueue(&mut self, waiter: Pin<&Waiter<T>>) {
        self.list.push_back(NonNull::from(waiter.get_ref()));
    }

    /// Unlinks `waiter`.
    ///
    /// # Safety
    ///
    /// `waiter` must be linked into *this* list.
    pub(crate) unsafe fn remove(&mut self, waiter: Pin<&Waiter<T>>) -> bool {
        self.list.remove(NonNull::from(waiter.get_ref())).is_some()
    }

    /// Wakes the longest-waiting thread, if there is one.
    pub(crate) fn wake_one<S>(&mut self, wakeup: Wakeup) -> bool
    where
        S: Scheduler<Thread = T>,
    {
        match self.list.pop_front() {
            Some(waiter) => {
                // Safety: the waiter's owner cannot unlink it or return while
                // we hold the critical section, so it's still alive.
                unsafe { waiter.as_ref().wake::<S>(wakeup) };
                true
            }
            None => false,
        }
    }

    /// Wakes every waiting thread, returning how many there were.
    pub(crate) fn wake_all<S>(&mut self, wakeup: Wakeup) -> usize
    where
        S: Scheduler<Thread = T>,
    {
        let mut woken = 0;
        while self.wake_one::<S>(wakeup) {
            woken += 1;
        }
        woken
    }
}

// Safety: the list only holds pointers to waiters, which are only touched
// while the critical section is held.
unsafe impl<T: Send> Send for WaitList<T> {}

impl<T> fmt::Debug for WaitList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitList")
            .field("waiters", &self.list.len())
            .finish()
    }
}

// === impl Waiter ===

impl<T> Waiter<T> {
    #[must_use]
    pub(crate) fn new(thread: T) -> Self {
        Self {
            links: list::Links::new(),
            thread,
            state: AtomicU8::new(WAITING),
            _pin: PhantomPinned,
        }
    }

    /// Clears any previous wakeup. Called before (re-)linking.
    #[inline]
    pub(crate) fn arm(&self) {
        self.state.store(WAITING, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn wakeup(&self) -> Option<Wakeup> {
        match self.state.load(Ordering::Acquire) {
            WOKEN_OK => Some(Wakeup::Ok),
            WOKEN_RESET => Some(Wakeup::Reset),
            _ => None,
        }
    }

    fn wake<S>(&self, wakeup: Wakeup)
    where
        S: Scheduler<Thread = T>,
    {
        let state = match wakeup {
            Wakeup::Ok => WOKEN_OK,
            Wakeup::Reset => WOKEN_RESET,
        };
        self.state.store(state, Ordering::Release);
        S::unpark(&self.thread);
    }

    /// Parks the current thread until this waiter has been woken or
    /// `deadline` (as measured by [`Scheduler::now`]) has passed.
    ///
    /// Must be called without holding the critical section.
    pub(crate) fn park<S>(&self, deadline: Option<Duration>)
    where
        S: Scheduler<Thread = T>,
    {
        while self.wakeup().is_none() {
            match deadline {
                None => S::park(),
                Some(deadline) => {
                    let now = S::now();
                    if now >= deadline {
                        return;
                    }
                    S::park_timeout(deadline - now);
                }
            }
        }
    }
}

impl<T> Drop for Waiter<T> {
    fn drop(&mut self) {
        debug_assert!(
            !self.links.is_linked(),
            "waiter dropped while still in a wait list"
        );
    }
}

unsafe impl<T> Linked<list::Links<Waiter<T>>> for Waiter<T> {
    type Handle = NonNull<Waiter<T>>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        r
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        ptr
    }

    unsafe fn links(target: NonNull<Self>) -> NonNull<list::Links<Waiter<T>>> {
        let links = core::ptr::addr_of_mut!((*target.as_ptr()).links);
        NonNull::new_unchecked(links)
    }
}
