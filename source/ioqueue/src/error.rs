use core::fmt;

/// Errors returned by queue operations.
///
/// Errors are never retried internally. A caller that wants to keep waiting
/// after a [`Timeout`](QueueError::Timeout) must call again.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum QueueError {
    /// An interrupt-side put found the input queue full.
    Full,
    /// An interrupt-side get found the output queue empty.
    Empty,
    /// A blocking operation waited for its whole timeout without the queue
    /// becoming ready.
    Timeout,
    /// The queue was reset while the caller was waiting on it.
    Reset,
}

// === impl QueueError ===

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.pad("queue full"),
            Self::Empty => f.pad("queue empty"),
            Self::Timeout => f.pad("timed out"),
            Self::Reset => f.pad("queue reset"),
        }
    }
}
