use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Playing positions a player can be eligible for.
///
/// Serialized by full name; deserialized from a full name or short code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Attacker,
}

impl Position {
    pub const ALL: [Position; 4] = [
        Position::Goalkeeper,
        Position::Defender,
        Position::Midfielder,
        Position::Attacker,
    ];

    /// Short code used when decorating group entries
    pub fn code(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "GK",
            Position::Defender => "DEF",
            Position::Midfielder => "MID",
            Position::Attacker => "ATT",
        }
    }

    /// Parse a position from its full name or its short code
    pub fn parse(value: &str) -> Option<Position> {
        let value = value.trim();
        Position::ALL.into_iter().find(|pos| {
            value.eq_ignore_ascii_case(pos.code()) || value.eq_ignore_ascii_case(&format!("{:?}", pos))
        })
    }
}

impl TryFrom<String> for Position {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Position::parse(&value).ok_or_else(|| format!("unknown position: {}", value))
    }
}

/// Collect the positions that parse, dropping the rest with a warning
pub fn parse_position_set<I, S>(names: I) -> BTreeSet<Position>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter_map(|name| {
            let name = name.as_ref();
            let position = Position::parse(name);
            if position.is_none() {
                warn!("Dropping unknown position {:?}", name);
            }
            position
        })
        .collect()
}

/// Serde helper for eligible-position sets that tolerates unknown names
pub fn deserialize_position_set<'de, D>(deserializer: D) -> Result<BTreeSet<Position>, D::Error>
where
    D: Deserializer<'de>,
{
    let names = Vec::<String>::deserialize(deserializer)?;
    Ok(parse_position_set(names))
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Self-reported skill level, ranked 1 (Beginner) to 5 (Professional)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SkillTier {
    #[default]
    Beginner = 1,
    Average = 2,
    Intermediate = 3,
    Advanced = 4,
    Professional = 5,
}

impl SkillTier {
    pub const MAX_VALUE: u32 = SkillTier::Professional as u32;

    pub fn value(&self) -> u32 {
        *self as u32
    }

    pub fn label(&self) -> &'static str {
        match self {
            SkillTier::Beginner => "Beginner",
            SkillTier::Average => "Average",
            SkillTier::Intermediate => "Intermediate",
            SkillTier::Advanced => "Advanced",
            SkillTier::Professional => "Professional",
        }
    }

    /// Map a survey answer to a tier. Missing or unknown answers count as Beginner.
    pub fn from_label(label: Option<&str>) -> SkillTier {
        let Some(label) = label.map(str::trim) else {
            return SkillTier::Beginner;
        };
        [
            SkillTier::Beginner,
            SkillTier::Average,
            SkillTier::Intermediate,
            SkillTier::Advanced,
            SkillTier::Professional,
        ]
        .into_iter()
        .find(|tier| label.eq_ignore_ascii_case(tier.label()))
        .unwrap_or_default()
    }
}

/// Team formation strategy chosen by the event organizer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Policy {
    /// Balance groups by summed skill tier
    #[default]
    #[serde(rename = "Match Making", alias = "MatchMaking")]
    MatchMaking,
    /// Balance groups by assigned position
    #[serde(rename = "Optimization")]
    Optimization,
}

impl Policy {
    pub fn parse(value: &str) -> Option<Policy> {
        let normalized: String = value
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect();
        if normalized.eq_ignore_ascii_case("matchmaking") {
            Some(Policy::MatchMaking)
        } else if normalized.eq_ignore_ascii_case("optimization") {
            Some(Policy::Optimization)
        } else {
            None
        }
    }
}

/// A roster entry resolved for a single formation run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    /// Name shown in group listings (falls back to the id)
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub skill_tier: SkillTier,
    #[serde(default, deserialize_with = "deserialize_position_set")]
    pub eligible_positions: BTreeSet<Position>,
    /// Position for this run (role policy only)
    #[serde(default)]
    pub assigned_position: Option<Position>,
}

impl Player {
    pub fn new(id: &str, display_name: Option<&str>, skill_tier: SkillTier) -> Self {
        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(id);

        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            skill_tier,
            eligible_positions: BTreeSet::new(),
            assigned_position: None,
        }
    }

    /// Display name, or the id when no name is known
    pub fn name(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.id
        } else {
            &self.display_name
        }
    }

    pub fn with_positions(mut self, positions: impl IntoIterator<Item = Position>) -> Self {
        self.eligible_positions = positions.into_iter().collect();
        self
    }

    pub fn with_assigned(mut self, position: Position) -> Self {
        self.assigned_position = Some(position);
        self
    }
}

/// One group produced by a formation run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub label: String,
    /// Decorated player entries, e.g. "Ana (Advanced)" or "Ana (DEF)"
    pub members: Vec<String>,
    /// Advisory text explaining a structural role imbalance
    pub notes: Vec<String>,
}

impl Group {
    pub fn new(label: String) -> Self {
        Self {
            label,
            members: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Members followed by advisory notes, the order shown to players
    pub fn entries(&self) -> Vec<String> {
        self.members.iter().chain(self.notes.iter()).cloned().collect()
    }
}

/// Result of one formation run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Formation {
    pub policy: Policy,
    pub groups: Vec<Group>,
}

impl Formation {
    pub fn total_members(&self) -> usize {
        self.groups.iter().map(Group::size).sum()
    }

    pub fn group(&self, label: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.label == label)
    }

    /// Group label -> entries (members then notes)
    pub fn to_map(&self) -> BTreeMap<String, Vec<String>> {
        self.groups
            .iter()
            .map(|g| (g.label.clone(), g.entries()))
            .collect()
    }

    /// Group label -> advisory notes
    pub fn notes(&self) -> BTreeMap<String, Vec<String>> {
        self.groups
            .iter()
            .map(|g| (g.label.clone(), g.notes.clone()))
            .collect()
    }
}

/// Formation engine configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FormationConfig {
    /// Prefix for group labels ("Group 1", "Group 2", ...)
    pub group_label_prefix: String,
    /// Keep only the last N history entries when persisting rotation state.
    /// A player's history is never cut below their number of eligible
    /// positions, so a rotation cycle can always complete. None keeps the full log.
    pub history_retention: Option<usize>,
    /// Policy used when a request does not name one
    pub default_policy: Policy,
}

impl Default for FormationConfig {
    fn default() -> Self {
        Self {
            group_label_prefix: "Group".to_string(),
            history_retention: None,
            default_policy: Policy::MatchMaking,
        }
    }
}

impl FormationConfig {
    pub fn group_label(&self, index: usize) -> String {
        format!("{} {}", self.group_label_prefix, index + 1)
    }

    pub fn empty_groups(&self, count: usize) -> Vec<Group> {
        (0..count).map(|i| Group::new(self.group_label(i))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_tier_from_label() {
        assert_eq!(SkillTier::from_label(Some("Advanced")), SkillTier::Advanced);
        assert_eq!(SkillTier::from_label(Some(" professional ")), SkillTier::Professional);
        assert_eq!(SkillTier::from_label(Some("unknown")), SkillTier::Beginner);
        assert_eq!(SkillTier::from_label(None), SkillTier::Beginner);
        assert_eq!(SkillTier::Intermediate.value(), 3);
        assert!(SkillTier::Professional > SkillTier::Advanced);
    }

    #[test]
    fn test_position_parse() {
        assert_eq!(Position::parse("GK"), Some(Position::Goalkeeper));
        assert_eq!(Position::parse("midfielder"), Some(Position::Midfielder));
        assert_eq!(Position::parse("att"), Some(Position::Attacker));
        assert_eq!(Position::parse("striker"), None);
    }

    #[test]
    fn test_position_deserializes_names_and_codes() {
        let position: Position = serde_json::from_str("\"def\"").unwrap();
        assert_eq!(position, Position::Defender);
        let position: Position = serde_json::from_str("\"Goalkeeper\"").unwrap();
        assert_eq!(position, Position::Goalkeeper);
        assert!(serde_json::from_str::<Position>("\"striker\"").is_err());
        assert_eq!(serde_json::to_string(&Position::Attacker).unwrap(), "\"Attacker\"");
    }

    #[test]
    fn test_player_drops_unknown_eligible_positions() {
        let player: Player =
            serde_json::from_str(r#"{"id": "a", "eligible_positions": ["GK", "sweeper", "mid"]}"#).unwrap();
        let expected: BTreeSet<Position> = [Position::Goalkeeper, Position::Midfielder].into_iter().collect();
        assert_eq!(player.eligible_positions, expected);
        assert_eq!(player.name(), "a");
    }

    #[test]
    fn test_policy_serde_names() {
        let json = serde_json::to_string(&Policy::MatchMaking).unwrap();
        assert_eq!(json, "\"Match Making\"");
        let policy: Policy = serde_json::from_str("\"Optimization\"").unwrap();
        assert_eq!(policy, Policy::Optimization);
        assert_eq!(Policy::parse("match_making"), Some(Policy::MatchMaking));
    }

    #[test]
    fn test_player_display_name_falls_back_to_id() {
        let player = Player::new("uid-7", None, SkillTier::default());
        assert_eq!(player.display_name, "uid-7");
        assert_eq!(player.skill_tier, SkillTier::Beginner);

        let blank = Player::new("uid-8", Some("  "), SkillTier::Average);
        assert_eq!(blank.display_name, "uid-8");
    }

    #[test]
    fn test_group_entries_put_notes_last() {
        let mut group = Group::new("Group 1".to_string());
        group.notes.push("note".to_string());
        group.members.push("Ana (GK)".to_string());
        assert_eq!(group.entries(), vec!["Ana (GK)".to_string(), "note".to_string()]);
        assert_eq!(group.size(), 1);
    }

    #[test]
    fn test_config_partial_json_uses_defaults() {
        let config: FormationConfig = serde_json::from_str(r#"{"history_retention": 6}"#).unwrap();
        assert_eq!(config.history_retention, Some(6));
        assert_eq!(config.group_label(0), "Group 1");
        assert_eq!(config.default_policy, Policy::MatchMaking);
    }
}
