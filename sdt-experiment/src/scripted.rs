//! Deterministic stand-ins for the display and keyboard, driven by a
//! [`ManualTimer`]. Used by the tests and by headless dry runs.

use crate::surface::{DisplaySurface, InputSource};
use sdt_core::{Key, KeySet, TextRole};
use sdt_timing::{ManualTimer, Timer};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// A committed frame that carried text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub text: String,
    pub role: TextRole,
    pub onset: u64,
}

#[derive(Debug, Default)]
pub struct Screen {
    staged: Option<(String, TextRole)>,
    visible: Option<(String, TextRole)>,
    last_commit: u64,
    commits: usize,
    presentations: Vec<Presentation>,
}

pub type SharedScreen = Rc<RefCell<Screen>>;

/// What a scripted participant can see at a poll.
#[derive(Debug, Clone)]
pub struct Glance {
    /// Text on screen, `None` while the screen is blank.
    pub text: Option<String>,
    pub role: Option<TextRole>,
    /// Text frames committed so far, this one included.
    pub presentations: usize,
    pub since_onset: Duration,
}

pub struct ScriptedDisplay {
    timer: ManualTimer,
    frame_time: Duration,
    screen: SharedScreen,
}

impl ScriptedDisplay {
    pub fn new(timer: ManualTimer) -> Self {
        Self {
            timer,
            frame_time: Duration::ZERO,
            screen: SharedScreen::default(),
        }
    }

    /// Each commit advances the clock by `frame_time`, like waiting for a
    /// vertical blank.
    pub fn with_frame_time(mut self, frame_time: Duration) -> Self {
        self.frame_time = frame_time;
        self
    }

    pub fn screen(&self) -> SharedScreen {
        Rc::clone(&self.screen)
    }

    pub fn presentations(&self) -> Vec<Presentation> {
        self.screen.borrow().presentations.clone()
    }

    pub fn commits(&self) -> usize {
        self.screen.borrow().commits
    }
}

impl DisplaySurface for ScriptedDisplay {
    fn show_text(&mut self, text: &str, role: TextRole) -> anyhow::Result<()> {
        self.screen.borrow_mut().staged = Some((text.to_string(), role));
        Ok(())
    }

    fn clear(&mut self) -> anyhow::Result<()> {
        self.screen.borrow_mut().staged = None;
        Ok(())
    }

    fn commit_frame(&mut self) -> anyhow::Result<u64> {
        self.timer.advance(self.frame_time);
        let now = self.timer.now();
        let mut screen = self.screen.borrow_mut();
        screen.visible = screen.staged.clone();
        screen.last_commit = now;
        screen.commits += 1;
        if let Some((text, role)) = screen.visible.clone() {
            screen.presentations.push(Presentation {
                text,
                role,
                onset: now,
            });
        }
        Ok(now)
    }
}

type Responder = Box<dyn FnMut(&Glance) -> Vec<Key>>;

/// Keyboard whose state at each poll is decided by a responder closure.
pub struct ScriptedInput {
    timer: ManualTimer,
    screen: SharedScreen,
    responder: Responder,
    polls: usize,
}

impl ScriptedInput {
    pub fn new(
        timer: ManualTimer,
        screen: SharedScreen,
        responder: impl FnMut(&Glance) -> Vec<Key> + 'static,
    ) -> Self {
        Self {
            timer,
            screen,
            responder: Box::new(responder),
            polls: 0,
        }
    }

    pub fn polls(&self) -> usize {
        self.polls
    }
}

impl InputSource for ScriptedInput {
    fn poll_keys(&mut self) -> anyhow::Result<KeySet> {
        self.polls += 1;
        let glance = {
            let screen = self.screen.borrow();
            Glance {
                text: screen.visible.as_ref().map(|(t, _)| t.clone()),
                role: screen.visible.as_ref().map(|(_, r)| *r),
                presentations: screen.presentations.len(),
                since_onset: Duration::from_nanos(
                    self.timer.now().saturating_sub(screen.last_commit),
                ),
            }
        };
        Ok((self.responder)(&glance).into_iter().collect())
    }
}

/// Presses `key` once `delay` has passed on every instruction screen and
/// never responds to stimuli.
pub fn continue_after(key: Key, delay: Duration) -> impl FnMut(&Glance) -> Vec<Key> {
    move |glance| {
        if glance.role == Some(TextRole::Instruction) && glance.since_onset >= delay {
            vec![key]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_advances_by_frame_time() {
        let timer = ManualTimer::new();
        let mut display = ScriptedDisplay::new(timer.clone()).with_frame_time(Duration::from_millis(16));
        display.show_text("cat", TextRole::Stimulus).unwrap();
        assert_eq!(display.commit_frame().unwrap(), 16_000_000);
        display.clear().unwrap();
        assert_eq!(display.commit_frame().unwrap(), 32_000_000);
        assert_eq!(display.commits(), 2);
        assert_eq!(display.presentations().len(), 1);
    }

    #[test]
    fn glance_sees_what_is_on_screen() {
        let timer = ManualTimer::new();
        let mut display = ScriptedDisplay::new(timer.clone());
        let mut input = ScriptedInput::new(timer.clone(), display.screen(), |p: &Glance| {
            if p.text.as_deref() == Some("go") && p.since_onset >= Duration::from_millis(2) {
                vec![Key::Space]
            } else {
                vec![]
            }
        });
        display.show_text("go", TextRole::Stimulus).unwrap();
        display.commit_frame().unwrap();
        assert!(input.poll_keys().unwrap().is_empty());
        timer.advance(Duration::from_millis(2));
        assert!(input.poll_keys().unwrap().contains(&Key::Space));
        assert_eq!(input.polls(), 2);
    }
}
