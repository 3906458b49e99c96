use sdt_core::{Key, SessionPhase, TextRole};
use sdt_experiment::scripted::Presentation;
use sdt_experiment::{
    ConfigError, CounterbalanceResolver, CueLog, ExperimentConfig, Instructions, IsiRange,
    MemorySink, Glance, Rig, RunError, SKIP_SCREEN, ScriptedDisplay, ScriptedInput, Session,
    SessionPlan, WordLists, continue_after,
};
use sdt_timing::ManualTimer;
use std::collections::HashMap;
use std::time::Duration;

const BLOCKS: usize = 4;
const WORDS: usize = 3;

fn config() -> ExperimentConfig {
    ExperimentConfig {
        num_blocks: BLOCKS,
        words_per_list: WORDS,
        isi_override: Some(IsiRange::new(10, 20, 1).unwrap()),
        poll_interval_us: 1_000,
        calibration_frames: 5,
        seed: Some(42),
        ..ExperimentConfig::default()
    }
}

fn word_lists() -> WordLists {
    WordLists::new(
        (0..BLOCKS)
            .map(|l| (0..WORDS).map(|w| format!("l{l}w{w}")).collect())
            .collect(),
    )
}

fn resolver() -> CounterbalanceResolver {
    let tape = HashMap::from([("101".to_string(), "2/B".to_string())]);
    let tracks = HashMap::from([
        ("1".to_string(), vec![0, 1, 2, 3]),
        ("2".to_string(), vec![1, 0, 2, 3]),
    ]);
    let lists = HashMap::from([
        ("A".to_string(), vec![0, 1, 2, 3]),
        ("B".to_string(), vec![2, 1, 0, 3]),
    ]);
    CounterbalanceResolver::new(tape, tracks, lists, BLOCKS)
}

fn instructions(shown: &[(&str, &str)]) -> Instructions {
    let mut texts: HashMap<String, String> = SessionPhase::schedule(BLOCKS)
        .iter()
        .filter_map(SessionPhase::instruction_key)
        .map(|k| (k, SKIP_SCREEN.to_string()))
        .collect();
    for (k, v) in shown {
        texts.insert(k.to_string(), v.to_string());
    }
    Instructions::new(texts)
}

type TestSession = Session<ScriptedDisplay, ScriptedInput, ManualTimer>;

fn session(
    instructions: Instructions,
    responder: impl FnMut(&Glance) -> Vec<Key> + 'static,
) -> TestSession {
    let timer = ManualTimer::new();
    let display = ScriptedDisplay::new(timer.clone()).with_frame_time(Duration::from_millis(1));
    let input = ScriptedInput::new(timer.clone(), display.screen(), responder);
    Session::new(config(), instructions, Rig::new(display, input, timer)).unwrap()
}

fn stimuli(presentations: &[Presentation]) -> Vec<&Presentation> {
    presentations
        .iter()
        .filter(|p| p.role == TextRole::Stimulus)
        .collect()
}

/// Continues instruction screens after 5 ms and marks every second word
/// of a list 2 ms after it appears.
fn participant() -> impl FnMut(&Glance) -> Vec<Key> {
    let mut proceed = continue_after(Key::Space, Duration::from_millis(5));
    move |glance| {
        let marked = glance
            .text
            .as_deref()
            .is_some_and(|t| t.ends_with("w1"));
        if marked && glance.since_onset >= Duration::from_millis(2) {
            vec![Key::Space]
        } else {
            proceed(glance)
        }
    }
}

#[test]
fn full_session_records_every_word_in_order() {
    let plan = SessionPlan::prepare("101", &config(), &word_lists(), &resolver()).unwrap();
    let ins = instructions(&[("welcome", "Welcome"), ("after_experiment", "Thank you")]);
    let mut session = session(ins, participant());
    let mut cue = CueLog::default();
    let mut sink = MemorySink::default();

    let summary = session.run(&plan, &mut cue, &mut sink).unwrap();

    assert_eq!(summary.slots_presented, BLOCKS * (WORDS + 1));
    assert_eq!(cue.started, vec![1, 0, 2, 3]);
    assert_eq!(cue.stops, BLOCKS);
    assert_eq!(sink.writes.len(), 1);

    let records = &sink.writes[0].1;
    assert_eq!(records.len(), BLOCKS * WORDS);
    let first: Vec<_> = records[..WORDS].iter().map(|r| r.word.as_str()).collect();
    assert_eq!(first, ["l2w0", "l2w1", "l2w2"]);
    for (i, r) in records.iter().enumerate() {
        assert_eq!(r.block, i / WORDS);
        assert_eq!(r.position, i % WORDS + 1);
        assert_eq!(r.list, plan.assignment.list_order[r.block]);
        assert_eq!(r.track, plan.assignment.track_order[r.block]);
        if r.word.ends_with("w1") {
            assert!(r.pressed);
            assert!((r.reaction_time_ms - 2.0).abs() < 1e-9);
        } else {
            assert!(!r.pressed);
            assert_eq!(r.reaction_time_ms, -1.0);
        }
    }

    let presentations = session.rig().display.presentations();
    assert_eq!(stimuli(&presentations).len(), BLOCKS * (WORDS + 1));
    let last = presentations.last().unwrap();
    assert_eq!((last.text.as_str(), last.role), ("Thank you", TextRole::Instruction));
    assert_eq!(summary.calibration.samples, 4);
}

#[test]
fn stimuli_stay_up_for_their_sampled_interval() {
    let plan = SessionPlan::prepare("101", &config(), &word_lists(), &resolver()).unwrap();
    let mut session = session(instructions(&[]), |_| vec![]);
    session
        .run(&plan, &mut CueLog::default(), &mut MemorySink::default())
        .unwrap();

    let presentations = session.rig().display.presentations();
    let shown = stimuli(&presentations);
    assert_eq!(shown.len(), BLOCKS * (WORDS + 1));
    let frame = Duration::from_millis(1).as_nanos() as i128;
    for (onsets, block) in shown.chunks(WORDS + 1).zip(&plan.blocks) {
        assert!(block.isis.iter().all(|isi| (10..=20).contains(isi)));
        for (pair, isi) in onsets.windows(2).zip(&block.isis) {
            let gap = i128::from(pair[1].onset - pair[0].onset);
            let isi_ns = i128::from(*isi) * 1_000_000;
            assert!((gap - isi_ns).abs() < frame, "gap {gap} for isi {isi_ns}");
        }
    }
}

#[test]
fn plan_is_reproducible_from_its_seed() {
    let a = SessionPlan::prepare("101", &config(), &word_lists(), &resolver()).unwrap();
    let b = SessionPlan::prepare("101", &config(), &word_lists(), &resolver()).unwrap();
    assert_eq!(a.seed, 42);
    assert_eq!(a.blocks, b.blocks);
    assert!(a.blocks.iter().all(|blk| blk.isis.len() == WORDS + 1));
    assert_eq!(a.blocks[0].list, 2);
    assert_eq!(a.blocks[0].track, 1);
}

#[test]
fn unknown_participant_fails_before_anything_runs() {
    let err = SessionPlan::prepare("999", &config(), &word_lists(), &resolver()).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownParticipant(p) if p == "999"));
}

#[test]
fn abort_mid_block_writes_nothing() {
    let plan = SessionPlan::prepare("101", &config(), &word_lists(), &resolver()).unwrap();
    let mut session = session(instructions(&[]), |glance| {
        if glance.presentations == 5 && glance.since_onset >= Duration::from_millis(3) {
            vec![Key::Escape]
        } else {
            vec![]
        }
    });
    let mut cue = CueLog::default();
    let mut sink = MemorySink::default();

    let err = session.run(&plan, &mut cue, &mut sink).unwrap_err();

    assert!(err.is_abort());
    assert!(sink.writes.is_empty());
    assert_eq!(cue.started, vec![1, 0]);
    assert_eq!(cue.stops, 2);
    assert_eq!(session.rig().display.presentations().len(), 5);
}

#[test]
fn abort_on_instruction_screen() {
    let plan = SessionPlan::prepare("101", &config(), &word_lists(), &resolver()).unwrap();
    let ins = instructions(&[("welcome", "Welcome")]);
    let mut session = session(ins, |glance| match glance.role {
        Some(TextRole::Instruction) => vec![Key::Escape],
        _ => vec![],
    });
    let mut sink = MemorySink::default();

    let err = session
        .run(&plan, &mut CueLog::default(), &mut sink)
        .unwrap_err();
    assert!(matches!(err, RunError::Aborted));
    assert!(sink.writes.is_empty());
}

#[test]
fn every_provided_screen_waits_for_continue() {
    let plan = SessionPlan::prepare("101", &config(), &word_lists(), &resolver()).unwrap();
    let shown: Vec<(String, String)> = SessionPhase::schedule(BLOCKS)
        .iter()
        .filter_map(SessionPhase::instruction_key)
        .map(|k| (k.clone(), format!("screen {k}")))
        .collect();
    let pairs: Vec<(&str, &str)> = shown.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let mut session = session(instructions(&pairs), participant());

    session
        .run(&plan, &mut CueLog::default(), &mut MemorySink::default())
        .unwrap();

    let screens: Vec<String> = session
        .rig()
        .display
        .presentations()
        .into_iter()
        .filter(|p| p.role == TextRole::Instruction)
        .map(|p| p.text)
        .collect();
    assert_eq!(screens.len(), 3 + 2 * BLOCKS);
    assert_eq!(screens[0], "screen welcome");
    assert_eq!(screens[2], "screen before_block_1");
    assert_eq!(screens[3], "screen after_block_1");
    assert_eq!(screens.last().unwrap(), "screen after_experiment");
}

#[test]
fn missing_instruction_is_rejected_up_front() {
    let mut texts = HashMap::new();
    texts.insert("welcome".to_string(), "hi".to_string());
    let timer = ManualTimer::new();
    let display = ScriptedDisplay::new(timer.clone());
    let input = ScriptedInput::new(timer.clone(), display.screen(), |_| vec![]);
    let result = Session::new(
        config(),
        Instructions::new(texts),
        Rig::new(display, input, timer),
    );
    assert!(matches!(result, Err(ConfigError::MissingInstruction(_))));
}

#[test]
fn demo_materials_plan_a_session() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../demo/config.json");
    let config = ExperimentConfig::load(path).unwrap();
    let materials = sdt_experiment::Materials::load(&config).unwrap();
    let plan = SessionPlan::prepare(
        "102",
        &config,
        &materials.word_lists,
        &materials.resolver,
    )
    .unwrap();

    assert_eq!(plan.assignment.track_order, vec![1, 0, 2, 3]);
    assert_eq!(plan.blocks[0].list, 2);
    assert_eq!(plan.blocks[0].stimuli.len(), config.words_per_list + 1);
    assert_eq!(materials.instructions.get("before_practice").unwrap(), None);
}
