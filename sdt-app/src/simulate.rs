use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sdt_core::{Key, TextRole};
use sdt_experiment::{Glance, continue_after};
use std::time::Duration;

/// Frame period of the simulated display.
pub const FRAME_TIME: Duration = Duration::from_nanos(16_666_667);

/// A participant that reads each instruction for `read_time` and marks
/// roughly half of the words after a latency drawn from `latency_ms`.
pub fn participant(
    key: Key,
    read_time: Duration,
    latency_ms: (u64, u64),
    seed: u64,
) -> impl FnMut(&Glance) -> Vec<Key> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut proceed = continue_after(key, read_time);
    let mut seen = 0;
    let mut latency = None;
    move |glance| {
        if glance.role != Some(TextRole::Stimulus) {
            return proceed(glance);
        }
        if glance.presentations != seen {
            seen = glance.presentations;
            let is_word = glance.text.as_deref().is_some_and(|t| !t.is_empty());
            latency = (is_word && rng.random_bool(0.5))
                .then(|| Duration::from_millis(rng.random_range(latency_ms.0..=latency_ms.1)));
        }
        match latency {
            Some(after) if glance.since_onset >= after => vec![key],
            _ => Vec::new(),
        }
    }
}
