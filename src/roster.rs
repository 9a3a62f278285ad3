use crate::error::{FormationError, FormationResult};
use crate::rotation::RotationState;
use crate::types::*;
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Profile record held by the user store
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub display_name: Option<String>,
    /// Survey answer, e.g. "Intermediate"
    pub skill_label: Option<String>,
}

/// Position preferences and rotation history held by the preference store
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionPreferences {
    #[serde(deserialize_with = "deserialize_position_set")]
    pub eligible_positions: BTreeSet<Position>,
    pub rotation: RotationState,
    /// Organizer override that bypasses rotation
    pub forced_position: Option<Position>,
}

pub trait ProfileLookup {
    fn profile(&self, player_id: &str) -> Option<Profile>;
}

pub trait PreferenceStore {
    fn preferences(&self, player_id: &str) -> Option<PositionPreferences>;
}

/// Durable storage for formation results
pub trait FormationSink {
    fn store(
        &mut self,
        event_id: &str,
        formation: &Formation,
        rotations: &BTreeMap<String, RotationState>,
    ) -> FormationResult<()>;
}

/// Players ready for the balancer plus the rotation states that changed
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedRoster {
    pub players: Vec<Player>,
    pub rotations: BTreeMap<String, RotationState>,
}

/// Build the roster for one formation run.
///
/// Names fall back to the player id and skill falls back to Beginner. Under the
/// role policy each player gets a position: the forced one if set, otherwise
/// the rotator's pick from their eligible positions.
pub fn resolve_roster(
    player_ids: &[String],
    policy: Policy,
    profiles: &impl ProfileLookup,
    preferences: &impl PreferenceStore,
    rng: &mut impl Rng,
) -> FormationResult<ResolvedRoster> {
    let mut resolved = ResolvedRoster::default();

    for id in player_ids {
        let profile = profiles.profile(id).unwrap_or_default();
        let tier = SkillTier::from_label(profile.skill_label.as_deref());
        let prefs = preferences.preferences(id).unwrap_or_default();

        let mut player = Player::new(id, profile.display_name.as_deref(), tier)
            .with_positions(prefs.eligible_positions.iter().copied());

        if policy == Policy::Optimization {
            let position = match prefs.forced_position {
                Some(forced) => forced,
                None if prefs.eligible_positions.is_empty() => {
                    return Err(FormationError::MissingPosition { player: id.clone() });
                }
                None => {
                    let mut rotation = prefs.rotation.clone();
                    let chosen = rotation.advance(&prefs.eligible_positions, rng)?;
                    if prefs.eligible_positions.len() > 1 {
                        resolved.rotations.insert(id.clone(), rotation);
                    }
                    chosen
                }
            };
            debug!("Player {} assigned {}", id, position);
            player.assigned_position = Some(position);
        }

        resolved.players.push(player);
    }

    Ok(resolved)
}

/// In-memory stand-in for the hosted user and event stores
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryDirectory {
    pub profiles: HashMap<String, Profile>,
    pub preferences: HashMap<String, PositionPreferences>,
    /// Last formation stored per event
    pub formations: HashMap<String, Formation>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_profile(&mut self, player_id: &str, display_name: Option<&str>, skill_label: Option<&str>) {
        self.profiles.insert(
            player_id.to_string(),
            Profile {
                display_name: display_name.map(str::to_string),
                skill_label: skill_label.map(str::to_string),
            },
        );
    }

    pub fn set_positions(&mut self, player_id: &str, positions: impl IntoIterator<Item = Position>) {
        self.preferences
            .entry(player_id.to_string())
            .or_default()
            .eligible_positions = positions.into_iter().collect();
    }

    pub fn force_position(&mut self, player_id: &str, position: Option<Position>) {
        self.preferences
            .entry(player_id.to_string())
            .or_default()
            .forced_position = position;
    }

    pub fn rotation(&self, player_id: &str) -> Option<&RotationState> {
        self.preferences.get(player_id).map(|p| &p.rotation)
    }
}

impl ProfileLookup for InMemoryDirectory {
    fn profile(&self, player_id: &str) -> Option<Profile> {
        self.profiles.get(player_id).cloned()
    }
}

impl PreferenceStore for InMemoryDirectory {
    fn preferences(&self, player_id: &str) -> Option<PositionPreferences> {
        self.preferences.get(player_id).cloned()
    }
}

impl FormationSink for InMemoryDirectory {
    fn store(
        &mut self,
        event_id: &str,
        formation: &Formation,
        rotations: &BTreeMap<String, RotationState>,
    ) -> FormationResult<()> {
        self.formations.insert(event_id.to_string(), formation.clone());
        for (player_id, rotation) in rotations {
            self.preferences
                .entry(player_id.clone())
                .or_default()
                .rotation = rotation.clone();
        }
        Ok(())
    }
}
