//! Input queues: filled from interrupt context, drained by threads.
use crate::{
    error::QueueError,
    notify::{NoNotify, Notify},
    queue::{self, Lower, Shared},
    ring::RingBuffer,
    sched::Scheduler,
    timeout::Timeout,
    wait::{WaitList, Wakeup},
};
use core::{
    cell::{RefCell, RefMut},
    fmt,
};
use critical_section::{CriticalSection, Mutex};

/// A byte queue written by a lower-level driver (typically an interrupt
/// handler) and read by threads.
///
/// The writing side uses the non-blocking operations that take a
/// [`CriticalSection`] token, such as [`try_put`](Self::try_put). Readers use
/// [`get_timeout`](Self::get_timeout) or [`read_timeout`](Self::read_timeout),
/// which take the critical section themselves and suspend the calling thread
/// while the queue is empty.
///
/// The queue is single-producer, single-consumer in spirit: several readers
/// may block at once, but a bulk [`read_timeout`](Self::read_timeout) is not
/// atomic and other readers may take bytes between the ones it transfers.
pub struct InputQueue<'buf, S: Scheduler, N = NoNotify> {
    shared: Mutex<RefCell<Shared<InputLower<'buf, S>, N>>>,
    size: usize,
}

/// The lower half of an [`InputQueue`].
///
/// Only reachable while the critical section is held: through
/// [`InputQueue::lower`], or as the argument to the queue's notify callback.
pub struct InputLower<'buf, S: Scheduler> {
    ring: RingBuffer<'buf>,
    waiting: WaitList<S::Thread>,
}

// === impl InputQueue ===

impl<'buf, S: Scheduler> InputQueue<'buf, S> {
    /// Returns a new, empty input queue storing its bytes in `buf`, without a
    /// notify callback.
    ///
    /// # Panics
    ///
    /// If `buf` is empty.
    #[track_caller]
    #[must_use]
    pub fn new(buf: &'buf mut [u8]) -> Self {
        Self::with_notify(buf, NoNotify)
    }
}

impl<'buf, S, N> InputQueue<'buf, S, N>
where
    S: Scheduler,
    N: Notify<InputLower<'buf, S>>,
{
    /// Returns a new, empty input queue storing its bytes in `buf`.
    ///
    /// `notify` is called every time a thread is about to take a byte from
    /// the queue, before the queue is checked for emptiness.
    ///
    /// # Panics
    ///
    /// If `buf` is empty.
    #[track_caller]
    #[must_use]
    pub fn with_notify(buf: &'buf mut [u8], notify: N) -> Self {
        let size = buf.len();
        let lower = InputLower {
            ring: RingBuffer::new(buf, 0),
            waiting: WaitList::new(),
        };
        Self {
            shared: Mutex::new(RefCell::new(Shared { lower, notify })),
            size,
        }
    }

    /// Borrows the queue's lower half, to perform several interrupt-side
    /// operations under one critical section.
    ///
    /// # Panics
    ///
    /// If called from inside this queue's notify callback.
    #[inline]
    pub fn lower<'cs>(&'cs self, cs: CriticalSection<'cs>) -> RefMut<'cs, InputLower<'buf, S>> {
        RefMut::map(self.shared.borrow_ref_mut(cs), |shared| &mut shared.lower)
    }

    /// Writes a byte into the queue without blocking, waking one waiting
    /// reader. See [`InputLower::put`].
    #[inline]
    pub fn try_put(&self, cs: CriticalSection<'_>, byte: u8) -> Result<(), QueueError> {
        self.lower(cs).put(byte)
    }

    /// Discards everything in the queue and wakes all waiting readers with
    /// [`QueueError::Reset`]. See [`InputLower::reset`].
    #[inline]
    pub fn reset(&self, cs: CriticalSection<'_>) {
        self.lower(cs).reset()
    }

    /// Returns the capacity of the queue, in bytes.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the raw queue counter: the number of unread bytes.
    #[must_use]
    pub fn space(&self, cs: CriticalSection<'_>) -> usize {
        self.lower(cs).space()
    }

    /// Returns the number of bytes waiting to be read.
    #[must_use]
    pub fn used(&self, cs: CriticalSection<'_>) -> usize {
        self.lower(cs).used()
    }

    /// Returns the number of bytes that can still be put.
    #[must_use]
    pub fn free(&self, cs: CriticalSection<'_>) -> usize {
        self.lower(cs).free()
    }

    #[must_use]
    pub fn is_empty(&self, cs: CriticalSection<'_>) -> bool {
        self.lower(cs).is_empty()
    }

    #[must_use]
    pub fn is_full(&self, cs: CriticalSection<'_>) -> bool {
        self.lower(cs).is_full()
    }

    /// Returns the number of threads blocked waiting for data.
    #[must_use]
    pub fn waiters(&self, cs: CriticalSection<'_>) -> usize {
        self.lower(cs).waiters()
    }

    /// Reads one byte, suspending the calling thread for up to `timeout`
    /// while the queue is empty.
    ///
    /// The notify callback runs first, before the queue is checked.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Timeout`] if no byte arrived in time.
    /// - [`QueueError::Reset`] if the queue was reset while waiting.
    pub fn get_timeout(&self, timeout: Timeout) -> Result<u8, QueueError> {
        queue::transfer(
            &self.shared,
            timeout,
            |shared| shared.notify.notify(&mut shared.lower),
            |shared| shared.lower.pop(),
        )
    }

    /// Reads one byte, waiting for as long as it takes.
    ///
    /// # Errors
    ///
    /// [`QueueError::Reset`] if the queue was reset while waiting.
    #[inline]
    pub fn get(&self) -> Result<u8, QueueError> {
        self.get_timeout(Timeout::Infinite)
    }

    /// Reads up to `buf.len()` bytes, one at a time, returning how many were
    /// read.
    ///
    /// Each byte is taken exactly as by [`get_timeout`](Self::get_timeout)
    /// with the same `timeout`, so the total time spent may exceed it. The
    /// transfer stops early, without an error, the first time a wait times
    /// out or the queue is reset. The critical section is released between
    /// bytes, so this is not atomic with respect to other readers.
    ///
    /// `buf` must not be empty.
    pub fn read_timeout(&self, buf: &mut [u8], timeout: Timeout) -> usize {
        debug_assert!(!buf.is_empty(), "bulk read must request at least one byte");

        let mut read = 0;
        for slot in buf.iter_mut() {
            match self.get_timeout(timeout) {
                Ok(byte) => *slot = byte,
                Err(error) => {
                    tracing::trace!(read, %error, "input queue read stopped early");
                    break;
                }
            }
            read += 1;
        }
        read
    }

    /// Reads `buf.len()` bytes, waiting for as long as it takes. Returns
    /// fewer only if the queue is reset.
    #[inline]
    pub fn read(&self, buf: &mut [u8]) -> usize {
        self.read_timeout(buf, Timeout::Infinite)
    }
}

impl<S: Scheduler, N> fmt::Debug for InputQueue<'_, S, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputQueue")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

// === impl InputLower ===

impl<S: Scheduler> InputLower<'_, S> {
    /// Writes a byte into the queue and wakes one waiting reader.
    ///
    /// Never blocks.
    ///
    /// # Errors
    ///
    /// [`QueueError::Full`] if there is no room, in which case the queue is
    /// left untouched.
    pub fn put(&mut self, byte: u8) -> Result<(), QueueError> {
        if self.is_full() {
            return Err(QueueError::Full);
        }

        self.ring.inc();
        self.ring.write(byte);
        self.waiting.wake_one::<S>(Wakeup::Ok);
        Ok(())
    }

    /// Discards everything in the queue and wakes every waiting reader with
    /// [`QueueError::Reset`].
    ///
    /// A driver can use this to get the attention of the threads reading
    /// from it, e.g. after a line error.
    pub fn reset(&mut self) {
        self.ring.reset(0);
        let woken = self.waiting.wake_all::<S>(Wakeup::Reset);
        if woken > 0 {
            tracing::debug!(woken, "input queue reset");
        }
    }

    pub(crate) fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }

        self.ring.dec();
        Some(self.ring.read())
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.ring.size()
    }

    /// Returns the raw queue counter, which for an input queue is the number
    /// of unread bytes.
    #[inline]
    #[must_use]
    pub fn space(&self) -> usize {
        self.ring.counter()
    }

    #[inline]
    #[must_use]
    pub fn used(&self) -> usize {
        self.ring.counter()
    }

    #[inline]
    #[must_use]
    pub fn free(&self) -> usize {
        self.ring.size() - self.ring.counter()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.counter() == 0
    }

    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.ring.counter() >= self.ring.size()
    }

    #[inline]
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.waiting.len()
    }
}

impl<S: Scheduler> Lower for InputLower<'_, S> {
    type Sched = S;

    #[inline]
    fn wait_list(&mut self) -> &mut WaitList<S::Thread> {
        &mut self.waiting
    }
}

impl<S: Scheduler> fmt::Debug for InputLower<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputLower")
            .field("ring", &self.ring)
            .field("waiting", &self.waiting)
            .finish()
    }
}
