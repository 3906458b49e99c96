use clap::Parser;
use sdt_experiment::{ExperimentConfig, IsiProfile};
use std::path::PathBuf;

/// Semantic dual task: word-by-word noun decisions under background tracks
#[derive(Parser, Debug, Clone)]
#[command(name = "sdt")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Participant ID, looked up in the counterbalancing tape
    #[arg(short, long)]
    pub participant: String,

    /// Path to config JSON (material paths are relative to it)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// ISI profile: "debug" (10-20 ms) or "session" (2500-3500 ms)
    #[arg(long)]
    pub profile: Option<IsiProfile>,

    /// Directory results are written to (overrides config)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// TrueType font used for all text (overrides config)
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Seed for the ISI sequence (overrides config)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Run in a window instead of borderless fullscreen
    #[arg(long, default_value_t = false)]
    pub windowed: bool,

    /// Headless dry run with a scripted participant and a virtual clock
    #[arg(long, default_value_t = false)]
    pub simulate: bool,

    /// Enable debug-level output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Command-line values win over the config file. Choosing a profile
    /// drops any explicit ISI range from the file.
    pub fn apply(&self, config: &mut ExperimentConfig) {
        if let Some(profile) = self.profile {
            config.isi_profile = profile;
            config.isi_override = None;
        }
        if let Some(dir) = &self.data_dir {
            config.paths.data_dir = dir.clone();
        }
        if let Some(font) = &self.font {
            config.paths.font = Some(font.clone());
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
    }
}
