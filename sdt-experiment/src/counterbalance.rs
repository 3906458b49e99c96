use crate::error::ConfigError;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Condition orderings for one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub track_order: Vec<usize>,
    pub list_order: Vec<usize>,
}

/// Table-driven counterbalancing.
///
/// The tape maps a participant to a pair of permutation indices
/// (`"<track>/<list>"`); each index is looked up in its own permutation
/// table. Swapping a permutation table re-balances a cohort without
/// re-keying participants.
#[derive(Debug, Clone, Default)]
pub struct CounterbalanceResolver {
    tape: HashMap<String, String>,
    track_orders: HashMap<String, Vec<usize>>,
    list_orders: HashMap<String, Vec<usize>>,
    conditions: usize,
}

impl CounterbalanceResolver {
    pub fn new(
        tape: HashMap<String, String>,
        track_orders: HashMap<String, Vec<usize>>,
        list_orders: HashMap<String, Vec<usize>>,
        conditions: usize,
    ) -> Self {
        Self {
            tape,
            track_orders,
            list_orders,
            conditions,
        }
    }

    pub fn load(
        tape: impl AsRef<Path>,
        track_orders: impl AsRef<Path>,
        list_orders: impl AsRef<Path>,
        conditions: usize,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            read_json(tape.as_ref())?,
            read_json(track_orders.as_ref())?,
            read_json(list_orders.as_ref())?,
            conditions,
        ))
    }

    pub fn resolve(&self, participant: &str) -> Result<Assignment, ConfigError> {
        let key = self
            .tape
            .get(participant)
            .ok_or_else(|| ConfigError::UnknownParticipant(participant.to_string()))?;

        let (track_idx, list_idx) =
            key.split_once('/')
                .ok_or_else(|| ConfigError::MalformedAssignment {
                    participant: participant.to_string(),
                    reason: format!("tape entry {key:?} is not of the form \"<track>/<list>\""),
                })?;

        let track_order = lookup(&self.track_orders, "track", track_idx.trim())?;
        let list_order = lookup(&self.list_orders, "word-list", list_idx.trim())?;

        for (name, order) in [("track", track_order), ("word-list", list_order)] {
            if !is_permutation(order, self.conditions) {
                return Err(ConfigError::MalformedAssignment {
                    participant: participant.to_string(),
                    reason: format!(
                        "{name} order {order:?} is not a permutation of 0..{}",
                        self.conditions
                    ),
                });
            }
        }

        Ok(Assignment {
            track_order: track_order.clone(),
            list_order: list_order.clone(),
        })
    }
}

fn lookup<'a>(
    table: &'a HashMap<String, Vec<usize>>,
    name: &'static str,
    key: &str,
) -> Result<&'a Vec<usize>, ConfigError> {
    table.get(key).ok_or_else(|| ConfigError::UnknownPermutation {
        table: name,
        key: key.to_string(),
    })
}

fn is_permutation(order: &[usize], n: usize) -> bool {
    let mut seen = vec![false; n];
    order.len() == n
        && order.iter().all(|&i| {
            i < n && !std::mem::replace(&mut seen[i], true)
        })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| ConfigError::json(path, e))
}
