mod cli;
mod simulate;
mod window;

use anyhow::Context;
use clap::Parser;
use cli::Args;
use sdt_experiment::{
    ExperimentConfig, FileSink, LoggedCue, Materials, Rig, RunError, RunSummary, ScriptedDisplay,
    ScriptedInput, Session, SessionPlan,
};
use sdt_render::{TextRenderer, load_font};
use sdt_timing::{HighPrecisionTimer, ManualTimer, Timer};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => ExperimentConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ExperimentConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    let materials = Materials::load(&config)?;
    let plan = SessionPlan::prepare(
        &args.participant,
        &config,
        &materials.word_lists,
        &materials.resolver,
    )?;
    info!(
        participant = %plan.participant,
        seed = plan.seed,
        track_order = ?plan.assignment.track_order,
        list_order = ?plan.assignment.list_order,
        "session planned"
    );

    let outcome = if args.simulate {
        run_simulated(&config, materials, &plan)
    } else {
        run_windowed(&config, materials, &plan, args.windowed)
    };

    match outcome {
        Ok(summary) => {
            info!(
                slots = summary.slots_presented,
                data_dir = %config.paths.data_dir.display(),
                "session complete"
            );
            Ok(())
        }
        Err(e) if e.is_abort() => {
            warn!("session aborted by user");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn run_windowed(
    config: &ExperimentConfig,
    materials: Materials,
    plan: &SessionPlan,
    windowed: bool,
) -> Result<RunSummary, RunError> {
    let font = load_font(config.paths.font.as_deref())?;
    let renderer = TextRenderer::new(font, 1, 1)?;
    let timer = HighPrecisionTimer::new();
    let (display, keys) = window::open(renderer, windowed, config.abort_key, timer.clone())?;

    let rig = Rig::new(display, keys, timer);
    let mut session = Session::new(config.clone(), materials.instructions, rig)?;
    session.run(
        plan,
        &mut LoggedCue::default(),
        &mut FileSink::new(&config.paths.data_dir),
    )
}

fn run_simulated(
    config: &ExperimentConfig,
    materials: Materials,
    plan: &SessionPlan,
) -> Result<RunSummary, RunError> {
    let timer = ManualTimer::new();
    let display = ScriptedDisplay::new(timer.clone()).with_frame_time(simulate::FRAME_TIME);
    let responder = simulate::participant(
        config.continue_key,
        Duration::from_millis(500),
        (350, 900),
        plan.seed,
    );
    let input = ScriptedInput::new(timer.clone(), display.screen(), responder);

    let rig = Rig::new(display, input, timer);
    let mut session = Session::new(config.clone(), materials.instructions, rig)?;
    let summary = session.run(
        plan,
        &mut LoggedCue::default(),
        &mut FileSink::new(&config.paths.data_dir),
    )?;
    let rig = session.rig();
    info!(
        polls = rig.input.source().polls(),
        virtual_secs = rig.timer.now() as f64 / 1e9,
        "simulation finished"
    );
    Ok(summary)
}
