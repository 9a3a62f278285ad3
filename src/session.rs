use crate::balancer::TeamBalancer;
use crate::error::{check_group_count, FormationError, FormationResult};
use crate::roster::{resolve_roster, FormationSink, PreferenceStore, ProfileLookup};
use crate::rotation::RotationState;
use crate::types::*;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A request to form groups for one event
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormationRequest {
    pub event_id: String,
    /// Confirmed roster, in sign-up order
    pub player_ids: Vec<String>,
    pub group_count: i64,
    /// Falls back to the configured default policy
    #[serde(default)]
    pub policy: Option<Policy>,
}

/// Everything a formation run produces for the caller to persist
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormationOutcome {
    pub event_id: String,
    pub formation: Formation,
    /// Updated rotation state for each player whose position rotated
    pub rotations: BTreeMap<String, RotationState>,
}

/// Drives formation runs with a seeded random source
pub struct FormationSession {
    pub config: FormationConfig,
    rng: StdRng,
    /// Random number generator seed
    rng_seed: u64,
}

impl FormationSession {
    pub fn new(config: FormationConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            rng_seed: seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.rng_seed
    }

    /// Restart the random sequence from a new seed
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
        self.rng_seed = seed;
    }

    /// Replace the configuration; the random sequence is kept
    pub fn update_config(&mut self, config: FormationConfig) {
        self.config = config;
    }

    /// Pick the next position for a single player
    pub fn next_position(
        &mut self,
        eligible: &BTreeSet<Position>,
        recent_history: &[Position],
    ) -> FormationResult<(Position, Vec<Position>)> {
        crate::rotation::next_position(eligible, recent_history, &mut self.rng)
    }

    /// Balance an already resolved roster
    pub fn form_teams(
        &mut self,
        policy: Policy,
        players: &[Player],
        group_count: i64,
    ) -> FormationResult<Formation> {
        let count = group_count_for(players.len(), group_count)?;
        let balancer = TeamBalancer::new(self.config.clone());
        balancer.form_teams(policy, players, count, &mut self.rng)
    }

    /// Resolve the roster and balance it, without persisting anything
    pub fn form(
        &mut self,
        request: &FormationRequest,
        profiles: &impl ProfileLookup,
        preferences: &impl PreferenceStore,
    ) -> FormationResult<FormationOutcome> {
        let policy = request.policy.unwrap_or(self.config.default_policy);
        // Reject a bad count before any rotation state is advanced
        let count = group_count_for(request.player_ids.len(), request.group_count)?;

        let roster = resolve_roster(&request.player_ids, policy, profiles, preferences, &mut self.rng)?;
        let balancer = TeamBalancer::new(self.config.clone());
        let formation = balancer.form_teams(policy, &roster.players, count, &mut self.rng)?;

        info!(
            "Event {}: formed {} groups from {} players ({:?})",
            request.event_id,
            formation.groups.len(),
            roster.players.len(),
            policy
        );

        Ok(FormationOutcome {
            event_id: request.event_id.clone(),
            formation,
            rotations: roster.rotations,
        })
    }

    /// Hand an outcome to the sink, trimming histories first when configured.
    ///
    /// A history is never trimmed below the player's rotation length, otherwise
    /// it could not fill up and reset.
    pub fn commit(&self, outcome: &mut FormationOutcome, sink: &mut impl FormationSink) -> FormationResult<()> {
        if let Some(limit) = self.config.history_retention {
            for rotation in outcome.rotations.values_mut() {
                let floor = rotation.rotation_queue.len();
                rotation.trim_history(limit.max(floor));
            }
        }
        sink.store(&outcome.event_id, &outcome.formation, &outcome.rotations)
    }

    /// Form and persist in one step against a store that plays every collaborator role
    pub fn run_event<D>(&mut self, request: &FormationRequest, directory: &mut D) -> FormationResult<FormationOutcome>
    where
        D: ProfileLookup + PreferenceStore + FormationSink,
    {
        let mut outcome = self.form(request, &*directory, &*directory)?;
        self.commit(&mut outcome, directory)?;
        Ok(outcome)
    }
}

fn group_count_for(roster_size: usize, group_count: i64) -> FormationResult<usize> {
    let count = usize::try_from(group_count).map_err(|_| FormationError::InvalidGroupCount {
        group_count,
        roster_size,
    })?;
    check_group_count(roster_size, count)?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balancer::NOTE_NO_GOALKEEPER;
    use crate::roster::InMemoryDirectory;

    fn directory() -> InMemoryDirectory {
        let mut directory = InMemoryDirectory::new();
        let roster = [
            ("u1", "Ana", "Professional", vec![Position::Goalkeeper]),
            ("u2", "Ben", "Beginner", vec![Position::Goalkeeper]),
            ("u3", "Cai", "Advanced", vec![Position::Defender, Position::Midfielder]),
            ("u4", "Dee", "Average", vec![Position::Defender]),
            ("u5", "Eli", "Intermediate", vec![Position::Midfielder, Position::Attacker]),
            ("u6", "Fay", "Advanced", vec![Position::Attacker, Position::Defender, Position::Midfielder]),
        ];
        for (id, name, skill, positions) in roster {
            directory.add_profile(id, Some(name), Some(skill));
            directory.set_positions(id, positions);
        }
        directory
    }

    fn request(policy: Option<Policy>, group_count: i64) -> FormationRequest {
        FormationRequest {
            event_id: "evt-1".to_string(),
            player_ids: ["u1", "u2", "u3", "u4", "u5", "u6"].iter().map(|s| s.to_string()).collect(),
            group_count,
            policy,
        }
    }

    #[test]
    fn test_run_event_match_making() {
        let mut directory = directory();
        let mut session = FormationSession::new(FormationConfig::default(), 42);

        let outcome = session.run_event(&request(None, 2), &mut directory).unwrap();

        assert_eq!(outcome.formation.policy, Policy::MatchMaking);
        assert_eq!(outcome.formation.groups.len(), 2);
        assert!(outcome.formation.groups.iter().all(|g| g.size() == 3));
        assert!(outcome.rotations.is_empty());
        assert_eq!(directory.formations["evt-1"], outcome.formation);
    }

    #[test]
    fn test_run_event_optimization_persists_rotation() {
        let mut directory = directory();
        let mut session = FormationSession::new(FormationConfig::default(), 7);

        let outcome = session
            .run_event(&request(Some(Policy::Optimization), 2), &mut directory)
            .unwrap();

        assert_eq!(outcome.formation.total_members(), 6);
        for group in &outcome.formation.groups {
            assert_eq!(group.members.iter().filter(|e| e.ends_with("(GK)")).count(), 1);
            assert!(!group.notes.contains(&NOTE_NO_GOALKEEPER.to_string()));
        }

        let rotated: Vec<&String> = outcome.rotations.keys().collect();
        assert_eq!(rotated, vec!["u3", "u5", "u6"]);
        for id in ["u3", "u5", "u6"] {
            assert_eq!(directory.rotation(id).unwrap().recent_history.len(), 1);
        }
        assert!(directory.rotation("u1").unwrap().recent_history.is_empty());
    }

    #[test]
    fn test_repeated_runs_rotate_through_positions() {
        let mut directory = directory();
        let mut session = FormationSession::new(FormationConfig::default(), 11);
        let req = request(Some(Policy::Optimization), 2);

        let mut played = Vec::new();
        for _ in 0..3 {
            session.run_event(&req, &mut directory).unwrap();
            played.push(*directory.rotation("u6").unwrap().recent_history.last().unwrap());
        }

        let seen: BTreeSet<Position> = played.into_iter().collect();
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_history_retention_keeps_full_rotation_cycle() {
        let mut directory = directory();
        let config = FormationConfig {
            history_retention: Some(1),
            ..FormationConfig::default()
        };
        let mut session = FormationSession::new(config, 3);
        let req = request(Some(Policy::Optimization), 2);

        let mut played = Vec::new();
        for _ in 0..6 {
            session.run_event(&req, &mut directory).unwrap();
            let rotation = directory.rotation("u6").unwrap();
            assert!(rotation.recent_history.len() <= 3);
            played.push(*rotation.recent_history.last().unwrap());
        }

        for cycle in played.chunks(3) {
            let seen: BTreeSet<Position> = cycle.iter().copied().collect();
            assert_eq!(seen.len(), 3, "cycle {:?} repeated a position", cycle);
        }
    }

    #[test]
    fn test_history_retention_trims_long_histories() {
        let mut directory = directory();
        directory.preferences.get_mut("u3").unwrap().rotation = RotationState::with_history([
            Position::Attacker,
            Position::Attacker,
            Position::Attacker,
            Position::Midfielder,
        ]);
        let config = FormationConfig {
            history_retention: Some(1),
            ..FormationConfig::default()
        };
        let mut session = FormationSession::new(config, 9);

        session
            .run_event(&request(Some(Policy::Optimization), 2), &mut directory)
            .unwrap();

        // Defender is the only position left; the floor is u3's two positions
        assert_eq!(
            directory.rotation("u3").unwrap().recent_history,
            vec![Position::Midfielder, Position::Defender]
        );
    }

    #[test]
    fn test_config_changes_reach_the_balancer() {
        let mut directory = directory();
        let mut session = FormationSession::new(FormationConfig::default(), 13);

        session.config.group_label_prefix = "Team".to_string();
        let outcome = session.run_event(&request(None, 2), &mut directory).unwrap();
        assert_eq!(outcome.formation.groups[0].label, "Team 1");

        let players: Vec<Player> = (0..4)
            .map(|i| Player::new(&format!("p{}", i), None, SkillTier::Average))
            .collect();
        session.update_config(FormationConfig {
            group_label_prefix: "Squad".to_string(),
            ..FormationConfig::default()
        });
        let formation = session.form_teams(Policy::MatchMaking, &players, 2).unwrap();
        assert_eq!(formation.groups[1].label, "Squad 2");
    }

    #[test]
    fn test_invalid_count_leaves_rotation_untouched() {
        let mut directory = directory();
        let mut session = FormationSession::new(FormationConfig::default(), 5);

        for count in [0, -2, 4, i64::MIN] {
            let result = session.run_event(&request(Some(Policy::Optimization), count), &mut directory);
            assert!(matches!(result, Err(FormationError::InvalidGroupCount { .. })));
        }
        assert!(directory.rotation("u6").unwrap().recent_history.is_empty());
        assert!(directory.formations.is_empty());
    }

    #[test]
    fn test_same_seed_reproduces_outcome() {
        let req = request(Some(Policy::Optimization), 3);

        let mut first_dir = directory();
        let mut first = FormationSession::new(FormationConfig::default(), 77);
        let a = first.run_event(&req, &mut first_dir).unwrap();

        let mut second_dir = directory();
        let mut second = FormationSession::new(FormationConfig::default(), 77);
        let b = second.run_event(&req, &mut second_dir).unwrap();

        assert_eq!(a, b);
    }
}
