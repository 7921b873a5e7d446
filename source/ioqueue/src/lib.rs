//! Interrupt-safe byte queues between device drivers and threads.
//!
//! Each queue has two halves:
//!
//! - The **lower half** is driven by an interrupt handler (or anything else
//!   that cannot block). Its operations take a [`CriticalSection`] token and
//!   never suspend: [`InputQueue::try_put`], [`OutputQueue::try_get`], the
//!   `reset`s and the status queries.
//! - The **upper half** is used by threads. Its operations take the critical
//!   section themselves and park the calling thread, with a [`Timeout`],
//!   until the queue is ready: [`InputQueue::get_timeout`],
//!   [`InputQueue::read_timeout`], [`OutputQueue::put_timeout`] and
//!   [`OutputQueue::write_timeout`].
//!
//! An [`InputQueue`] carries bytes from a driver up to threads, and an
//! [`OutputQueue`] carries bytes from threads down to a driver. A
//! [`DuplexQueue`] bundles one of each.
//!
//! Drivers can attach a [`Notify`] callback to a queue. It runs under the
//! critical section with the queue's lower half, just before a reader checks
//! an input queue for data, or just after a writer stores a byte in an output
//! queue.
//!
//! Suspending and resuming threads goes through the [`Scheduler`] trait.
//! With the `std` feature, [`StdScheduler`] implements it with OS threads.
//!
//! [`CriticalSection`]: critical_section::CriticalSection
#![cfg_attr(
    feature = "std",
    doc = r#"
# Examples

```rust
use mnemos_ioqueue::{InputQueue, StdScheduler, Timeout};
use std::time::Duration;

let mut buf = [0u8; 16];
let rx = InputQueue::<StdScheduler>::new(&mut buf);

// in the UART receive interrupt:
critical_section::with(|cs| rx.try_put(cs, b'!')).unwrap();

// in a thread:
let byte = rx.get_timeout(Timeout::After(Duration::from_millis(10)));
assert_eq!(byte, Ok(b'!'));
```
"#
)]
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_debug_implementations)]

mod duplex;
pub mod error;
pub mod input;
pub mod notify;
pub mod output;
mod queue;
mod ring;
pub mod sched;
pub mod timeout;
pub mod wait;

#[cfg(test)]
mod test_util;

pub use self::{
    duplex::DuplexQueue,
    error::QueueError,
    input::{InputLower, InputQueue},
    notify::{NoNotify, Notify},
    output::{OutputLower, OutputQueue},
    sched::Scheduler,
    timeout::Timeout,
    wait::WaitList,
};

#[cfg(any(test, feature = "std"))]
pub use self::sched::StdScheduler;
