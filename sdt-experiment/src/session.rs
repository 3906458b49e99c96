use crate::capture::ResponseCapture;
use crate::config::{ExperimentConfig, IsiProfile, IsiRange};
use crate::counterbalance::{Assignment, CounterbalanceResolver};
use crate::cue::TrackCue;
use crate::error::{ConfigError, RunError};
use crate::interval::IntervalSampler;
use crate::materials::{Instructions, WordLists};
use crate::recorder::DataRecorder;
use crate::sequencer::{Block, TrialSequencer};
use crate::sink::PersistenceSink;
use crate::surface::{DisplaySurface, InputSource, Rig};
use rand::SeedableRng;
use rand::rngs::StdRng;
use sdt_core::{SessionPhase, Stimulus, TextRole};
use sdt_timing::{CalibrationStats, Timer};
use serde::Serialize;
use tracing::{info, warn};

/// Everything decided before the first stimulus: block order, word lists
/// and the full ISI sequence. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct SessionPlan {
    pub participant: String,
    pub seed: u64,
    pub profile: IsiProfile,
    pub isi_range: IsiRange,
    pub assignment: Assignment,
    pub blocks: Vec<Block>,
}

impl SessionPlan {
    pub fn prepare(
        participant: &str,
        config: &ExperimentConfig,
        word_lists: &WordLists,
        resolver: &CounterbalanceResolver,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let assignment = resolver.resolve(participant)?;
        if assignment.track_order.len() < config.num_blocks
            || assignment.list_order.len() < config.num_blocks
        {
            return Err(ConfigError::MalformedAssignment {
                participant: participant.to_string(),
                reason: format!("fewer than {} conditions", config.num_blocks),
            });
        }

        let seed = config.seed.unwrap_or_else(rand::random);
        let isi_range = config.isi_range();
        let mut sampler = IntervalSampler::new(isi_range, StdRng::seed_from_u64(seed));
        let isis = sampler.sample(config.total_slots());
        let slots = config.slots_per_block();

        let blocks = (0..config.num_blocks)
            .map(|i| {
                let list = assignment.list_order[i];
                let words = word_lists.get(list).ok_or_else(|| {
                    ConfigError::WordList(format!("no word list with index {list}"))
                })?;
                if words.len() < config.words_per_list {
                    return Err(ConfigError::WordList(format!(
                        "list {list} has {} words, {} required",
                        words.len(),
                        config.words_per_list
                    )));
                }
                Ok(Block {
                    index: i,
                    track: assignment.track_order[i],
                    list,
                    stimuli: Stimulus::sequence(words[..config.words_per_list].iter().cloned()),
                    isis: isis[i * slots..(i + 1) * slots].to_vec(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            participant: participant.to_string(),
            seed,
            profile: config.isi_profile,
            isi_range,
            assignment,
            blocks,
        })
    }

    pub fn total_slots(&self) -> usize {
        self.blocks.iter().map(|b| b.stimuli.len()).sum()
    }

    pub fn total_words(&self) -> usize {
        self.blocks.iter().map(Block::word_count).sum()
    }
}

/// What the sink receives next to the records.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub plan: SessionPlan,
    pub calibration: CalibrationStats,
    pub slots_presented: usize,
}

/// Runs a whole session: instruction screens, blocks, persistence.
pub struct Session<D, I, T>
where
    D: DisplaySurface,
    I: InputSource,
    T: Timer,
{
    config: ExperimentConfig,
    instructions: Instructions,
    rig: Rig<D, I, T>,
    sequencer: TrialSequencer,
}

impl<D, I, T> Session<D, I, T>
where
    D: DisplaySurface,
    I: InputSource,
    T: Timer,
{
    pub fn new(
        config: ExperimentConfig,
        instructions: Instructions,
        rig: Rig<D, I, T>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        instructions.validate(config.num_blocks)?;
        let sequencer = TrialSequencer::new(ResponseCapture::new(
            config.response_key,
            config.abort_key,
            config.poll_interval(),
        ));
        Ok(Self {
            config,
            instructions,
            rig,
            sequencer,
        })
    }

    pub fn rig(&self) -> &Rig<D, I, T> {
        &self.rig
    }

    pub fn into_rig(self) -> Rig<D, I, T> {
        self.rig
    }

    /// Runs `plan` to completion and hands the records to `sink` exactly
    /// once. On abort nothing reaches the sink.
    pub fn run<C, S>(
        &mut self,
        plan: &SessionPlan,
        cue: &mut C,
        sink: &mut S,
    ) -> Result<RunSummary, RunError>
    where
        C: TrackCue,
        S: PersistenceSink,
    {
        info!(
            participant = %plan.participant,
            profile = ?plan.profile,
            seed = plan.seed,
            blocks = plan.blocks.len(),
            "session starting"
        );
        let result = self.run_phases(plan, cue, sink);
        if let Err(RunError::Aborted) = &result {
            warn!(participant = %plan.participant, "session aborted, no data written");
        }
        result
    }

    fn run_phases<C, S>(
        &mut self,
        plan: &SessionPlan,
        cue: &mut C,
        sink: &mut S,
    ) -> Result<RunSummary, RunError>
    where
        C: TrackCue,
        S: PersistenceSink,
    {
        self.rig.calibrate(self.config.calibration_frames)?;
        let calibration = self.rig.timer.calibration_stats();
        if calibration.samples > 0 {
            info!(
                frame_ms = calibration.average_frame_time_ns / 1e6,
                fps = calibration.effective_fps,
                jitter_ms = calibration.jitter_ns / 1e6,
                "display calibrated"
            );
        }

        let mut recorder = DataRecorder::with_capacity(plan.total_words());
        let mut slots_presented = 0;
        let mut summary = None;

        for phase in SessionPhase::schedule(plan.blocks.len()) {
            match phase {
                SessionPhase::Block(i) => {
                    let block = &plan.blocks[i];
                    let name = self
                        .config
                        .tracks
                        .get(block.track)
                        .map(String::as_str)
                        .unwrap_or_default();
                    cue.start(block.track, name)?;
                    let outcome = self.sequencer.run_block(&mut self.rig, block, &mut recorder);
                    let stopped = cue.stop();
                    slots_presented += outcome?;
                    stopped?;
                }
                SessionPhase::Debrief => {
                    let done = RunSummary {
                        plan: plan.clone(),
                        calibration: calibration.clone(),
                        slots_presented,
                    };
                    sink.persist(&done, recorder.snapshot())
                        .map_err(RunError::Persist)?;
                    info!(records = recorder.len(), "results saved");
                    summary = Some(done);
                    self.show_instruction(phase)?;
                }
                _ => self.show_instruction(phase)?,
            }
        }

        summary.ok_or_else(|| RunError::Surface(anyhow::anyhow!("session ended before debrief")))
    }

    /// Shows the instruction text for `phase` until the continue key is
    /// pressed. Screens marked as skipped are not shown at all.
    fn show_instruction(&mut self, phase: SessionPhase) -> Result<(), RunError> {
        let Some(key) = phase.instruction_key() else {
            return Ok(());
        };
        let Some(text) = self.instructions.get(&key)? else {
            return Ok(());
        };
        self.rig.present(Some((text, TextRole::Instruction)))?;
        self.rig.wait_for_key(
            self.config.continue_key,
            self.config.abort_key,
            self.config.poll_interval(),
        )?;
        self.rig.present(None)?;
        Ok(())
    }
}
