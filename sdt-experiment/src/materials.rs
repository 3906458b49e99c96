use crate::config::ExperimentConfig;
use crate::counterbalance::CounterbalanceResolver;
use crate::error::ConfigError;
use sdt_core::SessionPhase;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Instruction value meaning "skip this screen".
pub const SKIP_SCREEN: &str = "N/A";

/// Instruction texts keyed by screen name.
#[derive(Debug, Clone, Default)]
pub struct Instructions {
    texts: HashMap<String, String>,
}

impl Instructions {
    pub fn new(texts: HashMap<String, String>) -> Self {
        Self { texts }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let texts = serde_json::from_str(&text).map_err(|e| ConfigError::json(path, e))?;
        Ok(Self { texts })
    }

    /// Text for `key`, or `None` when the screen is marked as skipped.
    pub fn get(&self, key: &str) -> Result<Option<&str>, ConfigError> {
        match self.texts.get(key) {
            None => Err(ConfigError::MissingInstruction(key.to_string())),
            Some(t) if t.trim() == SKIP_SCREEN => Ok(None),
            Some(t) => Ok(Some(t.as_str())),
        }
    }

    /// Fails on the first screen of the schedule without an entry.
    pub fn validate(&self, num_blocks: usize) -> Result<(), ConfigError> {
        SessionPhase::schedule(num_blocks)
            .iter()
            .filter_map(SessionPhase::instruction_key)
            .try_for_each(|key| self.get(&key).map(|_| ()))
    }
}

/// Word lists, one per column of the source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordLists {
    lists: Vec<Vec<String>>,
}

impl WordLists {
    pub fn new(lists: Vec<Vec<String>>) -> Self {
        Self { lists }
    }

    pub fn load(
        path: impl AsRef<Path>,
        num_lists: usize,
        words_per_list: usize,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        Self::parse_csv(&text, num_lists, words_per_list)
    }

    /// Reads a header row followed by data rows. Only the first `num_lists`
    /// columns are used; each is cut to `words_per_list` words.
    pub fn parse_csv(
        text: &str,
        num_lists: usize,
        words_per_list: usize,
    ) -> Result<Self, ConfigError> {
        let mut rows = text.lines().filter(|l| !l.trim().is_empty());
        let header = rows
            .next()
            .ok_or_else(|| ConfigError::WordList("table is empty".into()))?;
        let columns = split_row(header).len();
        if columns < num_lists {
            return Err(ConfigError::WordList(format!(
                "{num_lists} lists required, table has {columns} columns"
            )));
        }

        let mut lists = vec![Vec::with_capacity(words_per_list); num_lists];
        for row in rows {
            for (list, cell) in lists.iter_mut().zip(split_row(row)) {
                if !cell.is_empty() && list.len() < words_per_list {
                    list.push(cell);
                }
            }
        }

        if let Some((idx, short)) = lists
            .iter()
            .enumerate()
            .find(|(_, l)| l.len() < words_per_list)
        {
            return Err(ConfigError::WordList(format!(
                "list {} has {} words, {} required",
                idx + 1,
                short.len(),
                words_per_list
            )));
        }
        Ok(Self { lists })
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&[String]> {
        self.lists.get(index).map(Vec::as_slice)
    }
}

/// Everything read from disk before a session starts.
#[derive(Debug, Clone)]
pub struct Materials {
    pub instructions: Instructions,
    pub word_lists: WordLists,
    pub resolver: CounterbalanceResolver,
}

impl Materials {
    /// Loads and checks all material files named by `config`. One list and
    /// one track ordering entry is expected per block.
    pub fn load(config: &ExperimentConfig) -> Result<Self, ConfigError> {
        let paths = &config.paths;
        let instructions = Instructions::load(&paths.instructions)?;
        instructions.validate(config.num_blocks)?;
        let word_lists =
            WordLists::load(&paths.word_lists, config.num_blocks, config.words_per_list)?;
        let resolver = CounterbalanceResolver::load(
            &paths.tape,
            &paths.track_orders,
            &paths.list_orders,
            config.num_blocks,
        )?;
        info!(
            lists = word_lists.len(),
            words_per_list = config.words_per_list,
            "materials loaded"
        );
        Ok(Self {
            instructions,
            word_lists,
            resolver,
        })
    }
}

/// Splits one CSV line. Commas inside double quotes stay in the cell and
/// `""` inside quotes is a literal quote. Cells are trimmed.
fn split_row(row: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut chars = row.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                chars.next();
                cell.push('"');
            }
            '"' => quoted = !quoted,
            ',' if !quoted => cells.push(std::mem::take(&mut cell).trim().to_string()),
            _ => cell.push(c),
        }
    }
    cells.push(cell.trim().to_string());
    cells
}
