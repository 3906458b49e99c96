use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Keys the experiment cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Space,
    Escape,
    Return,
    Char(char),
}

/// Keys asserted at one poll.
pub type KeySet = HashSet<Key>;
