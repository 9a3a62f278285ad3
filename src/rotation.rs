use crate::error::{FormationError, FormationResult};
use crate::types::Position;
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Pick the next position for a player and return it with the extended history.
///
/// Players with a single eligible position always get it and their history is
/// left alone. Everyone else gets a uniformly random pick among the eligible
/// positions they have not played since the last reset; once every position has
/// been played the history is cleared and the full eligible set is open again.
pub fn next_position(
    eligible: &BTreeSet<Position>,
    recent_history: &[Position],
    rng: &mut impl Rng,
) -> FormationResult<(Position, Vec<Position>)> {
    if eligible.len() == 1 {
        if let Some(&only) = eligible.iter().next() {
            return Ok((only, recent_history.to_vec()));
        }
    }

    let mut history = recent_history.to_vec();
    let mut remaining: Vec<Position> = eligible
        .iter()
        .copied()
        .filter(|pos| !history.contains(pos))
        .collect();

    if remaining.is_empty() {
        debug!("Rotation exhausted after {} entries, resetting history", history.len());
        history.clear();
        remaining = eligible.iter().copied().collect();
    }

    let chosen = *remaining
        .choose(rng)
        .ok_or(FormationError::NoEligiblePositions)?;
    history.push(chosen);

    Ok((chosen, history))
}

/// Per-player rotation record, owned and persisted by the caller
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationState {
    /// Round-robin order of positions; the front is the one owed next.
    ///
    /// Advisory only: `advance` keeps it in step with the picks so a caller
    /// can show what is due, but the pick itself is a uniform draw over the
    /// positions missing from `recent_history`.
    pub rotation_queue: Vec<Position>,
    /// Positions actually played, oldest first
    pub recent_history: Vec<Position>,
}

impl RotationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(history: impl IntoIterator<Item = Position>) -> Self {
        Self {
            rotation_queue: Vec::new(),
            recent_history: history.into_iter().collect(),
        }
    }

    /// Position at the front of the round-robin queue. Not consulted by `advance`.
    pub fn next_due(&self) -> Option<Position> {
        self.rotation_queue.first().copied()
    }

    /// Choose the position for this run and record it
    pub fn advance(
        &mut self,
        eligible: &BTreeSet<Position>,
        rng: &mut impl Rng,
    ) -> FormationResult<Position> {
        let (chosen, history) = next_position(eligible, &self.recent_history, rng)?;
        if eligible.len() > 1 {
            self.recent_history = history;
            self.sync_queue(eligible);
            self.rotation_queue.retain(|&pos| pos != chosen);
            self.rotation_queue.push(chosen);
        }
        Ok(chosen)
    }

    /// Drop all but the most recent `limit` history entries
    pub fn trim_history(&mut self, limit: usize) {
        let excess = self.recent_history.len().saturating_sub(limit);
        self.recent_history.drain(..excess);
    }

    fn sync_queue(&mut self, eligible: &BTreeSet<Position>) {
        self.rotation_queue.retain(|pos| eligible.contains(pos));
        for &pos in eligible {
            if !self.rotation_queue.contains(&pos) {
                self.rotation_queue.push(pos);
            }
        }
    }
}
