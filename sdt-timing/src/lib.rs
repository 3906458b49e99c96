pub mod timer;

pub use timer::{CalibrationStats, FrameLog, HighPrecisionTimer, ManualTimer, Timer};
