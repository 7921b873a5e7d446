//! Driver callbacks invoked as bytes move through a queue.
//!
//! A notify callback receives the queue's lower half ([`InputLower`] or
//! [`OutputLower`]) while the critical section is held, so it may move bytes
//! between the queue and the hardware directly. It must not call back into
//! the queue it was invoked from through the queue handle itself (the lower
//! half is already borrowed, and doing so panics).
//!
//! Any context the driver needs (the C-style "link" pointer) is simply
//! captured by the closure.
//!
//! [`InputLower`]: crate::InputLower
//! [`OutputLower`]: crate::OutputLower

/// A callback invoked by a queue on every element transfer.
///
/// - Input queues call it once per element a reader asks for, *before*
///   checking whether the queue is empty, so that the driver can refill it.
/// - Output queues call it *after* each byte is written, so that the driver
///   can start (or keep) transmitting.
pub trait Notify<L: ?Sized> {
    fn notify(&mut self, lower: &mut L);
}

/// A [`Notify`] implementation that does nothing.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct NoNotify;

impl<L: ?Sized> Notify<L> for NoNotify {
    #[inline(always)]
    fn notify(&mut self, _: &mut L) {}
}

impl<L, F> Notify<L> for F
where
    L: ?Sized,
    F: FnMut(&mut L),
{
    #[inline]
    fn notify(&mut self, lower: &mut L) {
        (self)(lower)
    }
}
