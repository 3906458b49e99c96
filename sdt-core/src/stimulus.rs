use serde::{Deserialize, Serialize};

/// One slot of a block's presentation sequence.
///
/// Every block opens with a `Dummy` so that the first real word is preceded
/// by a full interstimulus interval. Dummies are shown and timed like words
/// but never produce a response record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stimulus {
    Dummy,
    Word(String),
}

impl Stimulus {
    /// Text handed to the display surface; empty for the dummy.
    pub fn text(&self) -> &str {
        match self {
            Stimulus::Dummy => "",
            Stimulus::Word(word) => word,
        }
    }

    pub fn is_dummy(&self) -> bool {
        matches!(self, Stimulus::Dummy)
    }

    /// Builds `[Dummy] + words`.
    pub fn sequence<I, S>(words: I) -> Vec<Stimulus>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        std::iter::once(Stimulus::Dummy)
            .chain(words.into_iter().map(|w| Stimulus::Word(w.into())))
            .collect()
    }
}

/// How a piece of text is laid out on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextRole {
    /// A single centred word.
    Stimulus,
    /// A wrapped paragraph of instructions.
    Instruction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_starts_with_dummy() {
        let seq = Stimulus::sequence(["apple", "run"]);
        assert_eq!(seq.len(), 3);
        assert!(seq[0].is_dummy());
        assert_eq!(seq[0].text(), "");
        assert_eq!(seq[2], Stimulus::Word("run".into()));
    }

    #[test]
    fn word_that_is_empty_is_still_a_word() {
        let stim = Stimulus::Word(String::new());
        assert!(!stim.is_dummy());
    }
}
