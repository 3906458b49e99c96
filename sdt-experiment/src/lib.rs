//! Timing engine for the semantic dual task: counterbalancing, ISI
//! sampling, trial sequencing with response capture, and persistence.

pub mod capture;
pub mod config;
pub mod counterbalance;
pub mod cue;
pub mod error;
pub mod interval;
pub mod materials;
pub mod recorder;
pub mod scripted;
pub mod sequencer;
pub mod session;
pub mod sink;
pub mod surface;

pub use capture::ResponseCapture;
pub use config::{ExperimentConfig, IsiProfile, IsiRange, PathsConfig};
pub use counterbalance::{Assignment, CounterbalanceResolver};
pub use cue::{CueLog, LoggedCue, TrackCue};
pub use error::{ConfigError, RunError};
pub use interval::IntervalSampler;
pub use materials::{Instructions, Materials, SKIP_SCREEN, WordLists};
pub use recorder::DataRecorder;
pub use scripted::{Glance, ScriptedDisplay, ScriptedInput, continue_after};
pub use sequencer::{Block, TrialSequencer};
pub use session::{RunSummary, Session, SessionPlan};
pub use sink::{FileSink, MemorySink, PersistenceSink};
pub use surface::{DisplaySurface, InputSource, KeyMonitor, KeySample, Rig};
