//! The byte ring shared by both queue kinds.
//!
//! A [`RingBuffer`] does not know whether it backs an input or an output
//! queue. It only moves bytes in and out of a caller-provided slice and keeps
//! a `counter` that the owning queue interprets: for an input queue the
//! counter is the number of unread bytes, for an output queue it is the
//! number of free slots. All bounds checks against the counter are the
//! owning queue's job.

use core::fmt;

pub struct RingBuffer<'buf> {
    buf: &'buf mut [u8],
    /// Index of the next byte to read. Always `< buf.len()`.
    rd: usize,
    /// Index of the next slot to write. Always `< buf.len()`.
    wr: usize,
    counter: usize,
}

impl<'buf> RingBuffer<'buf> {
    /// Wraps `buf` with both cursors at its start and the given initial
    /// counter value.
    ///
    /// # Panics
    ///
    /// If `buf` is empty, or if `counter` exceeds `buf.len()`.
    #[track_caller]
    pub(crate) fn new(buf: &'buf mut [u8], counter: usize) -> Self {
        assert!(!buf.is_empty(), "queue buffer must not be empty");
        assert!(counter <= buf.len());
        Self {
            buf,
            rd: 0,
            wr: 0,
            counter,
        }
    }

    /// The fixed capacity of the ring, in bytes.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.buf.len()
    }

    /// The raw counter. Its meaning depends on the queue kind.
    #[inline]
    #[must_use]
    pub fn counter(&self) -> usize {
        self.counter
    }

    #[inline]
    pub(crate) fn inc(&mut self) {
        debug_assert!(self.counter < self.buf.len(), "ring counter overflow");
        self.counter += 1;
    }

    #[inline]
    pub(crate) fn dec(&mut self) {
        debug_assert!(self.counter > 0, "ring counter underflow");
        self.counter -= 1;
    }

    /// Stores `byte` at the write cursor and advances it, wrapping at the end
    /// of the buffer. Does not touch the counter.
    #[inline]
    pub(crate) fn write(&mut self, byte: u8) {
        self.buf[self.wr] = byte;
        self.wr = advance(self.wr, self.buf.len());
    }

    /// Loads the byte at the read cursor and advances it, wrapping at the end
    /// of the buffer. Does not touch the counter.
    #[inline]
    pub(crate) fn read(&mut self) -> u8 {
        let byte = self.buf[self.rd];
        self.rd = advance(self.rd, self.buf.len());
        byte
    }

    /// Rewinds both cursors to the start of the buffer and sets the counter.
    /// Buffered content is not cleared, only forgotten.
    pub(crate) fn reset(&mut self, counter: usize) {
        debug_assert!(counter <= self.buf.len());
        self.rd = 0;
        self.wr = 0;
        self.counter = counter;
    }

    #[cfg(test)]
    pub(crate) fn cursors(&self) -> (usize, usize) {
        (self.rd, self.wr)
    }
}

#[inline(always)]
fn advance(idx: usize, top: usize) -> usize {
    let next = idx + 1;
    if next >= top {
        0
    } else {
        next
    }
}

impl fmt::Debug for RingBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("size", &self.buf.len())
            .field("rd", &self.rd)
            .field("wr", &self.wr)
            .field("counter", &self.counter)
            .finish()
    }
}
