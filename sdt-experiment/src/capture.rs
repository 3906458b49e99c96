use crate::error::RunError;
use crate::surface::{InputSource, KeyMonitor};
use sdt_core::{CapturedResponse, Key};
use sdt_timing::Timer;
use std::time::Duration;

/// Cooperative poll loop for one response window.
///
/// The loop always runs until the deadline: the window doubles as the
/// interstimulus interval, so an early response does not end it.
#[derive(Debug, Clone, Copy)]
pub struct ResponseCapture {
    pub response_key: Key,
    pub abort_key: Key,
    pub poll_interval: Duration,
}

impl ResponseCapture {
    pub fn new(response_key: Key, abort_key: Key, poll_interval: Duration) -> Self {
        Self {
            response_key,
            abort_key,
            poll_interval,
        }
    }

    /// Polls until `deadline` (session-clock ns). Returns the first press of
    /// the response key, ignoring any later ones.
    pub fn await_response<I, T>(
        &self,
        input: &mut KeyMonitor<I>,
        timer: &T,
        deadline: u64,
    ) -> Result<CapturedResponse, RunError>
    where
        I: InputSource,
        T: Timer,
    {
        self.continue_window(CapturedResponse::none(), input, timer, deadline)
    }

    /// Keeps a window open until `deadline`, starting from what it has
    /// captured so far. A deadline already in the past returns at once.
    pub fn continue_window<I, T>(
        &self,
        mut response: CapturedResponse,
        input: &mut KeyMonitor<I>,
        timer: &T,
        deadline: u64,
    ) -> Result<CapturedResponse, RunError>
    where
        I: InputSource,
        T: Timer,
    {
        if timer.now() >= deadline {
            return Ok(response);
        }
        loop {
            let sample = input.poll()?;
            let now = timer.now();
            if sample.is_down(self.abort_key) {
                return Err(RunError::Aborted);
            }
            if now >= deadline {
                return Ok(response);
            }
            if !response.pressed && sample.was_pressed(self.response_key) {
                response = CapturedResponse::at(now);
            }
            let remaining = Duration::from_nanos(deadline - now);
            timer.sleep(self.poll_interval.min(remaining));
        }
    }
}
