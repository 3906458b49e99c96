use crate::error::RunError;
use sdt_core::{Key, KeySet, TextRole};
use sdt_timing::Timer;
use std::time::Duration;
use tracing::debug;

/// Where stimuli and instructions are drawn.
pub trait DisplaySurface {
    fn show_text(&mut self, text: &str, role: TextRole) -> anyhow::Result<()>;
    fn clear(&mut self) -> anyhow::Result<()>;
    /// Presents the pending frame and returns the instant it was committed,
    /// on the session timer's clock.
    fn commit_frame(&mut self) -> anyhow::Result<u64>;
}

/// Polled keyboard (or button box) state.
pub trait InputSource {
    /// Keys asserted right now.
    fn poll_keys(&mut self) -> anyhow::Result<KeySet>;
}

/// Keys asserted at one poll, plus the ones that went down since the poll
/// before it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySample {
    pub down: KeySet,
    pub pressed: KeySet,
}

impl KeySample {
    pub fn is_down(&self, key: Key) -> bool {
        self.down.contains(&key)
    }

    pub fn was_pressed(&self, key: Key) -> bool {
        self.pressed.contains(&key)
    }
}

/// Turns level samples into press edges. Lives for the whole run, so a key
/// held across a stimulus boundary is not pressed again.
pub struct KeyMonitor<I: InputSource> {
    source: I,
    previous: KeySet,
}

impl<I: InputSource> KeyMonitor<I> {
    pub fn new(source: I) -> Self {
        Self {
            source,
            previous: KeySet::new(),
        }
    }

    pub fn poll(&mut self) -> anyhow::Result<KeySample> {
        let down = self.source.poll_keys()?;
        let pressed = down.difference(&self.previous).copied().collect();
        self.previous = down.clone();
        Ok(KeySample { down, pressed })
    }

    pub fn source(&self) -> &I {
        &self.source
    }
}

/// Display, input and clock of one session, threaded explicitly through the
/// engine instead of living in globals.
pub struct Rig<D, I, T>
where
    D: DisplaySurface,
    I: InputSource,
    T: Timer,
{
    pub display: D,
    pub input: KeyMonitor<I>,
    pub timer: T,
}

impl<D, I, T> Rig<D, I, T>
where
    D: DisplaySurface,
    I: InputSource,
    T: Timer,
{
    pub fn new(display: D, input: I, timer: T) -> Self {
        Self {
            display,
            input: KeyMonitor::new(input),
            timer,
        }
    }

    /// Shows `text` (or a blank screen for `None`) and returns the committed
    /// onset.
    pub fn present(&mut self, text: Option<(&str, TextRole)>) -> anyhow::Result<u64> {
        match text {
            Some((t, role)) => self.display.show_text(t, role)?,
            None => self.display.clear()?,
        }
        self.display.commit_frame()
    }

    /// Mean interval between committed frames as measured by
    /// [`Rig::calibrate`]. Zero before calibration.
    pub fn frame_period(&self) -> Duration {
        Duration::from_nanos(self.timer.calibration_stats().average_frame_time_ns as u64)
    }

    /// Commits `frames` blank frames back to back and feeds the intervals
    /// between them to the timer's frame log.
    pub fn calibrate(&mut self, frames: usize) -> anyhow::Result<()> {
        let mut previous = None;
        for _ in 0..frames {
            let onset = self.present(None)?;
            if let Some(prev) = previous {
                self.timer
                    .record_frame(Duration::from_nanos(onset.saturating_sub(prev)));
            }
            previous = Some(onset);
        }
        Ok(())
    }

    /// Blocks until `key` goes down. `abort` is honoured at every poll.
    pub fn wait_for_key(
        &mut self,
        key: Key,
        abort: Key,
        poll_interval: Duration,
    ) -> Result<(), RunError> {
        loop {
            let sample = self.input.poll()?;
            if sample.is_down(abort) {
                return Err(RunError::Aborted);
            }
            if sample.was_pressed(key) {
                debug!(?key, "continue");
                return Ok(());
            }
            self.timer.sleep(poll_interval);
        }
    }
}
