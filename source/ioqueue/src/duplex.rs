//! Full-duplex queues: an input queue and an output queue used as a pair,
//! e.g. the receive and transmit sides of a serial port.
use crate::{
    input::{InputLower, InputQueue},
    notify::{NoNotify, Notify},
    output::{OutputLower, OutputQueue},
    sched::Scheduler,
};
use critical_section::CriticalSection;

#[derive(Debug)]
pub struct DuplexQueue<'ib, 'ob, S: Scheduler, IN = NoNotify, ON = NoNotify> {
    input: InputQueue<'ib, S, IN>,
    output: OutputQueue<'ob, S, ON>,
}

impl<'ib, 'ob, S, IN, ON> DuplexQueue<'ib, 'ob, S, IN, ON>
where
    S: Scheduler,
    IN: Notify<InputLower<'ib, S>>,
    ON: Notify<OutputLower<'ob, S>>,
{
    #[must_use]
    pub fn new(input: InputQueue<'ib, S, IN>, output: OutputQueue<'ob, S, ON>) -> Self {
        Self { input, output }
    }

    /// The receive side: filled by the driver, read by threads.
    #[inline]
    #[must_use]
    pub fn input(&self) -> &InputQueue<'ib, S, IN> {
        &self.input
    }

    /// The transmit side: written by threads, drained by the driver.
    #[inline]
    #[must_use]
    pub fn output(&self) -> &OutputQueue<'ob, S, ON> {
        &self.output
    }

    /// Resets both directions, waking every blocked reader and writer with
    /// [`QueueError::Reset`](crate::QueueError::Reset).
    pub fn reset(&self, cs: CriticalSection<'_>) {
        self.input.reset(cs);
        self.output.reset(cs);
    }

    #[must_use]
    pub fn into_parts(self) -> (InputQueue<'ib, S, IN>, OutputQueue<'ob, S, ON>) {
        (self.input, self.output)
    }
}
