use core::time::Duration;

/// How long a blocking queue operation may suspend the calling thread.
///
/// The timeout applies to each individual suspension, not to the whole
/// operation: a thread that is woken but finds the queue still not ready
/// waits again for the full duration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Timeout {
    /// Never suspend. If the queue is not ready the operation fails (or, for
    /// bulk transfers, stops) at once.
    Immediate,
    /// Suspend for as long as it takes.
    Infinite,
    /// Suspend for at most this long.
    After(Duration),
}

impl Timeout {
    /// Returns the absolute deadline for a suspension starting at `now`, or
    /// `None` if it may wait forever.
    ///
    /// Callers must handle [`Timeout::Immediate`] before asking for a deadline.
    pub(crate) fn deadline(self, now: Duration) -> Option<Duration> {
        match self {
            Self::Infinite => None,
            Self::After(d) => Some(now.saturating_add(d)),
            Self::Immediate => Some(now),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn is_immediate(self) -> bool {
        match self {
            Self::Immediate => true,
            Self::After(d) => d.is_zero(),
            Self::Infinite => false,
        }
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Self::After(d)
    }
}

impl From<Option<Duration>> for Timeout {
    /// `None` means [`Timeout::Infinite`].
    fn from(d: Option<Duration>) -> Self {
        match d {
            Some(d) => Self::After(d),
            None => Self::Infinite,
        }
    }
}
