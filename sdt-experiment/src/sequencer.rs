use crate::capture::ResponseCapture;
use crate::error::RunError;
use crate::recorder::DataRecorder;
use crate::surface::{DisplaySurface, InputSource, Rig};
use sdt_core::{ResponseRecord, Stimulus, TextRole};
use sdt_timing::Timer;
use serde::Serialize;
use tracing::{debug, info};

/// One word list paired with one background track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub index: usize,
    pub track: usize,
    pub list: usize,
    /// `[Dummy] + words`.
    pub stimuli: Vec<Stimulus>,
    /// ISI in ms for each entry of `stimuli`.
    pub isis: Vec<u64>,
}

impl Block {
    pub fn word_count(&self) -> usize {
        self.stimuli.iter().filter(|s| !s.is_dummy()).count()
    }
}

/// Presents the stimuli of a block back to back, one countdown each.
#[derive(Debug, Clone, Copy)]
pub struct TrialSequencer {
    capture: ResponseCapture,
}

impl TrialSequencer {
    pub fn new(capture: ResponseCapture) -> Self {
        Self { capture }
    }

    /// Runs every stimulus of `block`, appending one record per word. Returns
    /// the number of stimulus slots presented.
    pub fn run_block<D, I, T>(
        &self,
        rig: &mut Rig<D, I, T>,
        block: &Block,
        recorder: &mut DataRecorder,
    ) -> Result<usize, RunError>
    where
        D: DisplaySurface,
        I: InputSource,
        T: Timer,
    {
        info!(
            block = block.index + 1,
            list = block.list,
            track = block.track,
            words = block.word_count(),
            "block started"
        );

        let frame_ns = rig.frame_period().as_nanos() as u64;
        for (position, (stimulus, &isi_ms)) in block.stimuli.iter().zip(&block.isis).enumerate() {
            let onset = rig.present(Some((stimulus.text(), TextRole::Stimulus)))?;
            let next_onset = onset + isi_ms * 1_000_000;
            // The clear and the next stimulus each take one frame to commit.
            let response = self.capture.await_response(
                &mut rig.input,
                &rig.timer,
                next_onset.saturating_sub(2 * frame_ns),
            )?;
            rig.present(None)?;
            let response = self.capture.continue_window(
                response,
                &mut rig.input,
                &rig.timer,
                next_onset.saturating_sub(frame_ns),
            )?;

            if let Stimulus::Word(word) = stimulus {
                let record = ResponseRecord {
                    block: block.index,
                    position,
                    word: word.clone(),
                    track: block.track,
                    list: block.list,
                    pressed: response.pressed,
                    reaction_time_ms: ResponseRecord::reaction_time_ms(&response, onset),
                };
                debug!(
                    word = %record.word,
                    pressed = record.pressed,
                    rt_ms = record.reaction_time_ms,
                    isi_ms,
                    "trial"
                );
                recorder.append(record);
            }
        }
        Ok(block.stimuli.len())
    }
}
