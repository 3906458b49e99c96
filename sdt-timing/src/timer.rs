use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Session clock. Timestamps are nanoseconds since the timer was created;
/// clones share the same origin.
pub trait Timer: Clone + Send + Sync {
    fn now(&self) -> u64;
    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
    fn sleep(&self, d: Duration);
    fn record_frame(&mut self, d: Duration);
    fn calibration_stats(&self) -> CalibrationStats;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CalibrationStats {
    pub samples: usize,
    pub average_frame_time_ns: f64,
    pub jitter_ns: f64,
    pub min_frame_time_ns: f64,
    pub max_frame_time_ns: f64,
    pub effective_fps: f64,
}

/// Rolling window of frame-to-frame intervals.
#[derive(Debug, Clone)]
pub struct FrameLog {
    frame_times: Vec<Duration>,
    max_samples: usize,
}

impl FrameLog {
    pub fn new(max_samples: usize) -> Self {
        Self {
            frame_times: Vec::with_capacity(max_samples),
            max_samples,
        }
    }

    pub fn record(&mut self, d: Duration) {
        if self.max_samples == 0 {
            return;
        }
        if self.frame_times.len() >= self.max_samples {
            self.frame_times.remove(0);
        }
        self.frame_times.push(d);
    }

    pub fn len(&self) -> usize {
        self.frame_times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame_times.is_empty()
    }

    pub fn stats(&self) -> CalibrationStats {
        if self.frame_times.is_empty() {
            return CalibrationStats::default();
        }
        let times: Vec<f64> = self
            .frame_times
            .iter()
            .map(|d| d.as_nanos() as f64)
            .collect();
        let n = times.len() as f64;
        let avg = times.iter().sum::<f64>() / n;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / n;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        CalibrationStats {
            samples: times.len(),
            average_frame_time_ns: avg,
            jitter_ns: var.sqrt(),
            min_frame_time_ns: min,
            max_frame_time_ns: max,
            effective_fps: if avg > 0.0 { 1e9 / avg } else { 0.0 },
        }
    }
}

impl Default for FrameLog {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Wall-clock timer backed by `Instant`, with a platform sleep that
/// undershoots less than `std::thread::sleep`.
#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    start: Instant,
    frames: FrameLog,
}

impl Timer for HighPrecisionTimer {
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
    fn record_frame(&mut self, d: Duration) {
        self.frames.record(d);
    }
    fn calibration_stats(&self) -> CalibrationStats {
        self.frames.stats()
    }
}

impl HighPrecisionTimer {
    /// Below this, sleeping is replaced by spinning on the clock.
    const SPIN_THRESHOLD: Duration = Duration::from_micros(200);

    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            frames: FrameLog::default(),
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        if duration < Self::SPIN_THRESHOLD {
            self.spin_for(duration);
            return;
        }
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        {
            let target = Instant::now() + duration;
            std::thread::sleep(duration - Self::SPIN_THRESHOLD);
            let left = target.saturating_duration_since(Instant::now());
            self.spin_for(left);
        }
    }

    fn spin_for(&self, duration: Duration) {
        let start = Instant::now();
        while start.elapsed() < duration {
            std::hint::spin_loop();
        }
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{CLOCK_MONOTONIC, clock_nanosleep, timespec};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        // SAFETY: `req` is a valid timespec and a null remainder is allowed
        // for relative sleeps.
        unsafe {
            clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Virtual clock that only moves when told to. `sleep` advances it, so a
/// poll loop driven by a `ManualTimer` runs instantly and deterministically.
/// A zero sleep still moves the clock by one tick, so a spin loop reaches
/// its deadline.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    now_ns: Arc<AtomicU64>,
    frames: FrameLog,
}

impl ManualTimer {
    const MIN_TICK: Duration = Duration::from_nanos(1);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns
            .fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Timer for ManualTimer {
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
    fn sleep(&self, d: Duration) {
        self.advance(d.max(Self::MIN_TICK));
    }
    fn record_frame(&mut self, d: Duration) {
        self.frames.record(d);
    }
    fn calibration_stats(&self) -> CalibrationStats {
        self.frames.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_timer_clones_share_the_clock() {
        let a = ManualTimer::new();
        let b = a.clone();
        a.advance(Duration::from_millis(3));
        b.sleep(Duration::from_millis(2));
        assert_eq!(a.now(), 5_000_000);
        assert_eq!(b.elapsed(1_000_000), Duration::from_millis(4));
    }

    #[test]
    fn zero_sleep_still_moves_the_virtual_clock() {
        let timer = ManualTimer::new();
        timer.sleep(Duration::ZERO);
        timer.sleep(Duration::ZERO);
        assert_eq!(timer.now(), 2);
    }

    #[test]
    fn frame_log_is_bounded() {
        let mut log = FrameLog::new(3);
        for ms in 1..=5 {
            log.record(Duration::from_millis(ms));
        }
        assert_eq!(log.len(), 3);
        let stats = log.stats();
        assert_eq!(stats.min_frame_time_ns, 3_000_000.0);
        assert_eq!(stats.max_frame_time_ns, 5_000_000.0);
    }

    #[test]
    fn stats_of_a_steady_60hz_display() {
        let mut timer = ManualTimer::new();
        for _ in 0..10 {
            timer.record_frame(Duration::from_nanos(16_666_667));
        }
        let stats = timer.calibration_stats();
        assert_eq!(stats.samples, 10);
        assert!(stats.jitter_ns < 1.0);
        assert!((stats.effective_fps - 60.0).abs() < 0.01);
    }

    #[test]
    fn empty_stats_are_zero() {
        assert_eq!(FrameLog::default().stats(), CalibrationStats::default());
    }

    #[test]
    fn high_precision_sleep_does_not_undershoot() {
        let timer = HighPrecisionTimer::new();
        let t = timer.now();
        timer.sleep(Duration::from_millis(2));
        assert!(timer.elapsed(t) >= Duration::from_millis(2));
    }
}
