//! Output queues: filled by threads, drained from interrupt context.
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

/// A byte queue written by threads and read by a lower-level driver
/// (typically a transmit interrupt handler).
///
/// Writers use [`put_timeout`](Self::put_timeout) or
/// [`write_timeout`](Self::write_timeout), which suspend the calling thread
/// while the queue is full. The driver drains it with
/// [`try_get`](Self::try_get) from interrupt context.
///
/// Internally the queue counts *free* slots rather than stored bytes, so a
/// freshly created or reset output queue has a counter equal to its size.
pub struct OutputQueue<'buf, S: Scheduler, N = NoNotify> {
    shared: Mutex<RefCell<Shared<OutputLower<'buf, S>, N>>>,
    size: usize,
}

/// The lower half of an [`OutputQueue`].
///
/// Only reachable while the critical section is held: through
/// [`OutputQueue::lower`], or as the argument to the queue's notify callback.
pub struct OutputLower<'buf, S: Scheduler> {
    ring: RingBuffer<'buf>,
    waiting: WaitList<S::Thread>,
}

// === impl OutputQueue ===

impl<'buf, S: Scheduler> OutputQueue<'buf, S> {
    /// Returns a new, empty output queue storing its bytes in `buf`, without
    /// a notify callback.
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

impl<'buf, S, N> OutputQueue<'buf, S, N>
where
    S: Scheduler,
    N: Notify<OutputLower<'buf, S>>,
{
    /// Returns a new, empty output queue storing its bytes in `buf`.
    ///
    /// `notify` is called every time a thread has written a byte into the
    /// queue.
    ///
    /// # Panics
    ///
    /// If `buf` is empty.
    #[track_caller]
    #[must_use]
    pub fn with_notify(buf: &'buf mut [u8], notify: N) -> Self {
        let size = buf.len();
        let lower = OutputLower {
            ring: RingBuffer::new(buf, size),
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
    pub fn lower<'cs>(&'cs self, cs: CriticalSection<'cs>) -> RefMut<'cs, OutputLower<'buf, S>> {
        RefMut::map(self.shared.borrow_ref_mut(cs), |shared| &mut shared.lower)
    }

    /// Takes a byte out of the queue without blocking, waking one waiting
    /// writer. See [`OutputLower::get`].
    #[inline]
    pub fn try_get(&self, cs: CriticalSection<'_>) -> Result<u8, QueueError> {
        self.lower(cs).get()
    }

    /// Discards everything in the queue and wakes all waiting writers with
    /// [`QueueError::Reset`]. See [`OutputLower::reset`].
    #[inline]
    pub fn reset(&self, cs: CriticalSection<'_>) {
        self.lower(cs).reset()
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the raw queue counter: the number of free slots.
    #[must_use]
    pub fn space(&self, cs: CriticalSection<'_>) -> usize {
        self.lower(cs).space()
    }

    /// Returns the number of bytes waiting to be transmitted.
    #[must_use]
    pub fn used(&self, cs: CriticalSection<'_>) -> usize {
        self.lower(cs).used()
    }

    /// Returns the number of bytes that can be written without blocking.
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

    /// Returns the number of threads blocked waiting for space.
    #[must_use]
    pub fn waiters(&self, cs: CriticalSection<'_>) -> usize {
        self.lower(cs).waiters()
    }

    /// Writes one byte, suspending the calling thread for up to `timeout`
    /// while the queue is full.
    ///
    /// The notify callback runs after the byte has been written.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Timeout`] if no space became available in time.
    /// - [`QueueError::Reset`] if the queue was reset while waiting.
    pub fn put_timeout(&self, byte: u8, timeout: Timeout) -> Result<(), QueueError> {
        queue::transfer(
            &self.shared,
            timeout,
            |_| {},
            |shared| {
                if !shared.lower.push(byte) {
                    return None;
                }
                shared.notify.notify(&mut shared.lower);
                Some(())
            },
        )
    }

    /// Writes one byte, waiting for as long as it takes.
    ///
    /// # Errors
    ///
    /// [`QueueError::Reset`] if the queue was reset while waiting.
    #[inline]
    pub fn put(&self, byte: u8) -> Result<(), QueueError> {
        self.put_timeout(byte, Timeout::Infinite)
    }

    /// Writes up to `buf.len()` bytes, one at a time, returning how many were
    /// written.
    ///
    /// Each byte is written exactly as by [`put_timeout`](Self::put_timeout)
    /// with the same `timeout`, so the notify callback runs once per byte.
    /// The transfer stops early, without an error, the first time a wait
    /// times out or the queue is reset. The critical section is released
    /// between bytes, so this is not atomic with respect to other writers.
    ///
    /// `buf` must not be empty.
    pub fn write_timeout(&self, buf: &[u8], timeout: Timeout) -> usize {
        debug_assert!(!buf.is_empty(), "bulk write must offer at least one byte");

        let mut written = 0;
        for &byte in buf {
            if let Err(error) = self.put_timeout(byte, timeout) {
                tracing::trace!(written, %error, "output queue write stopped early");
                break;
            }
            written += 1;
        }
        written
    }

    /// Writes all of `buf`, waiting for as long as it takes. Returns fewer
    /// bytes only if the queue is reset.
    #[inline]
    pub fn write(&self, buf: &[u8]) -> usize {
        self.write_timeout(buf, Timeout::Infinite)
    }
}

impl<S: Scheduler, N> fmt::Debug for OutputQueue<'_, S, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputQueue")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

// === impl OutputLower ===

impl<S: Scheduler> OutputLower<'_, S> {
    /// Takes the oldest byte out of the queue and wakes one waiting writer.
    ///
    /// Never blocks.
    ///
    /// # Errors
    ///
    /// [`QueueError::Empty`] if there is nothing to take, in which case the
    /// queue is left untouched.
    pub fn get(&mut self) -> Result<u8, QueueError> {
        if self.is_empty() {
            return Err(QueueError::Empty);
        }

        self.ring.inc();
        let byte = self.ring.read();
        self.waiting.wake_one::<S>(Wakeup::Ok);
        Ok(byte)
    }

    /// Discards everything in the queue and wakes every waiting writer with
    /// [`QueueError::Reset`].
    pub fn reset(&mut self) {
        let size = self.ring.size();
        self.ring.reset(size);
        let woken = self.waiting.wake_all::<S>(Wakeup::Reset);
        if woken > 0 {
            tracing::debug!(woken, "output queue reset");
        }
    }

    pub(crate) fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }

        self.ring.dec();
        self.ring.write(byte);
        true
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.ring.size()
    }

    /// Returns the raw queue counter, which for an output queue is the
    /// number of free slots.
    #[inline]
    #[must_use]
    pub fn space(&self) -> usize {
        self.ring.counter()
    }

    #[inline]
    #[must_use]
    pub fn used(&self) -> usize {
        self.ring.size() - self.ring.counter()
    }

    #[inline]
    #[must_use]
    pub fn free(&self) -> usize {
        self.ring.counter()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.counter() >= self.ring.size()
    }

    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.ring.counter() == 0
    }

    #[inline]
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.waiting.len()
    }
}

impl<S: Scheduler> Lower for OutputLower<'_, S> {
    type Sched = S;

    #[inline]
    fn wait_list(&mut self) -> &mut WaitList<S::Thread> {
        &mut self.waiting
    }
}

impl<S: Scheduler> fmt::Debug for OutputLower<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputLower")
            .field("ring", &self.ring)
            .field("waiting", &self.waiting)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sched::StdScheduler,
        test_util::{trace_init, wait_until},
    };
    use proptest::{collection::vec, prop_assert_eq, proptest};
    use std::{collections::VecDeque, thread, time::Duration};

    type Queue<'buf> = OutputQueue<'buf, StdScheduler>;

    #[test]
    fn empty_get_fails_and_leaves_queue_alone() {
        trace_init();
        let mut buf = [0u8; 3];
        let q: Queue<'_> = OutputQueue::new(&mut buf);

        critical_section::with(|cs| {
            assert!(q.is_empty(cs));
            assert_eq!(q.space(cs), 3);
            assert_eq!(q.try_get(cs), Err(QueueError::Empty));
            assert_eq!(q.lower(cs).space(), 3);
            assert_eq!(q.free(cs), 3);
            assert_eq!(q.used(cs), 0);
        });
    }

    #[test]
    fn put_then_drain_in_order() {
        trace_init();
        let mut buf = [0u8; 3];
        let q: Queue<'_> = OutputQueue::new(&mut buf);

        assert_eq!(q.write_timeout(b"abc", Timeout::Immediate), 3);
        critical_section::with(|cs| {
            assert!(q.is_full(cs));
            assert_eq!(q.lower(cs).space(), 0);
        });
        assert_eq!(q.put_timeout(b'd', Timeout::Immediate), Err(QueueError::Timeout));

        critical_section::with(|cs| {
            assert_eq!(q.try_get(cs), Ok(b'a'));
            assert_eq!(q.free(cs), 1);
        });
        q.put_timeout(b'd', Timeout::Immediate).unwrap();

        let drained: Vec<u8> = critical_section::with(|cs| {
            core::iter::from_fn(|| q.try_get(cs).ok()).collect()
        });
        assert_eq!(drained, b"bcd");
    }

    #[test]
    fn put_on_full_queue_times_out() {
        trace_init();
        let mut buf = [0u8; 1];
        let q: Queue<'_> = OutputQueue::new(&mut buf);
        q.put(1).unwrap();

        let timeout = Duration::from_millis(20);
        let start = StdScheduler::now();
        assert_eq!(q.put_timeout(2, timeout.into()), Err(QueueError::Timeout));
        assert!(StdScheduler::now() - start >= timeout);

        critical_section::with(|cs| {
            assert_eq!(q.waiters(cs), 0);
            assert_eq!(q.try_get(cs), Ok(1));
        });
    }

    #[test]
    fn get_wakes_blocked_writer() {
        trace_init();
        let mut buf = [0u8; 2];
        let q: Queue<'_> = OutputQueue::new(&mut buf);
        assert_eq!(q.write(&[1, 2]), 2);

        thread::scope(|s| {
            let writer = s.spawn(|| q.put_timeout(3, Timeout::Infinite));

            wait_until(|| critical_section::with(|cs| q.waiters(cs) == 1));
            assert_eq!(critical_section::with(|cs| q.try_get(cs)), Ok(1));

            assert_eq!(writer.join().unwrap(), Ok(()));
        });

        critical_section::with(|cs| {
            assert_eq!(q.try_get(cs), Ok(2));
            assert_eq!(q.try_get(cs), Ok(3));
            assert!(q.is_empty(cs));
        });
    }

    #[test]
    fn reset_wakes_all_writers_and_frees_queue() {
        trace_init();
        let mut buf = [0u8; 1];
        let q: Queue<'_> = OutputQueue::new(&mut buf);
        q.put(0xFF).unwrap();

        thread::scope(|s| {
            let writers: Vec<_> = (0..3u8)
                .map(|i| {
                    let q = &q;
                    s.spawn(move || q.put_timeout(i, Duration::from_secs(5).into()))
                })
                .collect();

            wait_until(|| critical_section::with(|cs| q.waiters(cs) == 3));
            critical_section::with(|cs| q.reset(cs));

            for writer in writers {
                assert_eq!(writer.join().unwrap(), Err(QueueError::Reset));
            }
        });

        critical_section::with(|cs| {
            assert!(q.is_empty(cs));
            assert_eq!(q.lower(cs).space(), q.size());
            assert_eq!(q.try_get(cs), Err(QueueError::Empty));
        });
    }

    #[test]
    fn bulk_write_drained_by_interrupt_side() {
        trace_init();
        let mut buf = [0u8; 3];
        let q: Queue<'_> = OutputQueue::new(&mut buf);
        let data: Vec<u8> = (0..=255).collect();

        thread::scope(|s| {
            let drain = s.spawn(|| {
                let mut out = Vec::new();
                while out.len() < data.len() {
                    match critical_section::with(|cs| q.try_get(cs)) {
                        Ok(b) => out.push(b),
                        Err(_) => thread::yield_now(),
                    }
                }
                out
            });

            assert_eq!(q.write(&data), data.len());
            assert_eq!(drain.join().unwrap(), data);
        });
    }

    #[test]
    fn timeout_cuts_bulk_write_short() {
        trace_init();
        let mut buf = [0u8; 4];
        let q: Queue<'_> = OutputQueue::new(&mut buf);

        let n = q.write_timeout(b"0123456789", Duration::from_millis(5).into());
        assert_eq!(n, 4);

        let drained: Vec<u8> = critical_section::with(|cs| {
            core::iter::from_fn(|| q.try_get(cs).ok()).collect()
        });
        assert_eq!(drained, b"0123");
    }

    #[test]
    fn notify_runs_after_each_write() {
        trace_init();
        // what the "transmitter" saw at each notification
        let mut seen = Vec::new();
        let mut buf = [0u8; 8];
        {
            let q = OutputQueue::<StdScheduler, _>::with_notify(
                &mut buf,
                |lower: &mut OutputLower<'_, StdScheduler>| {
                    // the byte is already in the queue when we're told about it
                    seen.push(lower.used());
                },
            );
            assert_eq!(q.write_timeout(b"xyz", Timeout::Immediate), 3);
        }
        assert_eq!(seen, [1, 2, 3]);
    }

    #[test]
    fn notify_can_transmit_immediately() {
        trace_init();
        let mut wire = Vec::new();
        let mut buf = [0u8; 1];
        {
            // a transmitter that drains the queue as soon as it's kicked, so
            // writers never have to wait even though the queue holds one byte
            let q = OutputQueue::<StdScheduler, _>::with_notify(
                &mut buf,
                |lower: &mut OutputLower<'_, StdScheduler>| {
                    while let Ok(b) = lower.get() {
                        wire.push(b);
                    }
                },
            );
            assert_eq!(q.write_timeout(b"hello", Timeout::Immediate), 5);
        }
        assert_eq!(wire, b"hello");
    }

    #[test]
    fn stolen_slot_restarts_full_timeout() {
        trace_init();
        let mut buf = [0u8; 1];
        let q: Queue<'_> = OutputQueue::new(&mut buf);
        q.put(1).unwrap();
        let timeout = Duration::from_millis(200);

        thread::scope(|s| {
            let writer = s.spawn(|| {
                let start = StdScheduler::now();
                let res = q.put_timeout(2, timeout.into());
                (res, StdScheduler::now() - start)
            });

            wait_until(|| critical_section::with(|cs| q.waiters(cs) == 1));
            thread::sleep(Duration::from_millis(150));
            // the writer is woken, but the slot is refilled before it gets to run
            critical_section::with(|cs| {
                assert_eq!(q.try_get(cs), Ok(1));
                assert!(q.lower(cs).push(9));
            });

            let (res, elapsed) = writer.join().unwrap();
            assert_eq!(res, Err(QueueError::Timeout));
            assert!(elapsed >= Duration::from_millis(350), "waited {elapsed:?}");
        });

        critical_section::with(|cs| {
            assert_eq!(q.waiters(cs), 0);
            assert_eq!(q.try_get(cs), Ok(9));
            assert!(q.is_empty(cs));
        });
    }

    proptest! {
        #[test]
        fn counter_tracks_model(ops in vec(proptest::option::of(proptest::num::u8::ANY), 0..256)) {
            const SIZE: usize = 5;
            let mut buf = [0u8; SIZE];
            let q: Queue<'_> = OutputQueue::new(&mut buf);
            let mut model = VecDeque::new();

            for op in ops {
                match op {
                    Some(b) => {
                        let res = q.put_timeout(b, Timeout::Immediate);
                        if model.len() == SIZE {
                            prop_assert_eq!(res, Err(QueueError::Timeout));
                        } else {
                            prop_assert_eq!(res, Ok(()));
                            model.push_back(b);
                        }
                    }
                    None => {
                        let res = critical_section::with(|cs| q.try_get(cs));
                        match model.pop_front() {
                            Some(b) => prop_assert_eq!(res, Ok(b)),
                            None => prop_assert_eq!(res, Err(QueueError::Empty)),
                        }
                    }
                }

                let (space, used) = critical_section::with(|cs| {
                    let lower = q.lower(cs);
                    (lower.space(), lower.used())
                });
                prop_assert_eq!(space, SIZE - model.len());
                prop_assert_eq!(used, model.len());
            }
        }
    }
}
