use crate::error::{check_group_count, FormationError, FormationResult};
use crate::types::*;
use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

pub const NOTE_EXTRA_GOALKEEPER: &str = "extra goalkeeper playing as field player — rotation required";
pub const NOTE_NO_GOALKEEPER: &str = "no goalkeeper — rotation needed";

/// Outfield roles in placement order
const OUTFIELD_ORDER: [Position; 3] = [Position::Defender, Position::Midfielder, Position::Attacker];

/// The team formation engine
pub struct TeamBalancer {
    config: FormationConfig,
}

impl TeamBalancer {
    pub fn new(config: FormationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FormationConfig {
        &self.config
    }

    /// Form groups under the given policy
    pub fn form_teams(
        &self,
        policy: Policy,
        players: &[Player],
        group_count: usize,
        rng: &mut impl Rng,
    ) -> FormationResult<Formation> {
        match policy {
            Policy::MatchMaking => self.form_teams_by_skill(players, group_count, rng),
            Policy::Optimization => self.form_teams_by_role(players, group_count, rng),
        }
    }

    /// Skill-balanced groups ("Match Making").
    ///
    /// Players are shuffled, then stably sorted by descending skill tier so ties
    /// break randomly per run. Each player joins the group with the lowest
    /// running skill total that still has room; ties go to the lowest index.
    pub fn form_teams_by_skill(
        &self,
        players: &[Player],
        group_count: usize,
        rng: &mut impl Rng,
    ) -> FormationResult<Formation> {
        check_group_count(players.len(), group_count)?;

        let mut roster: Vec<&Player> = players.iter().collect();
        roster.shuffle(rng);
        roster.sort_by(|a, b| b.skill_tier.cmp(&a.skill_tier));

        let max_per_group = players.len() / group_count;
        let mut totals = vec![0u32; group_count];
        let mut groups = self.config.empty_groups(group_count);

        for player in roster {
            let target = (0..group_count)
                .filter(|&g| groups[g].size() < max_per_group)
                .min_by_key(|&g| totals[g]);

            if let Some(g) = target {
                totals[g] += player.skill_tier.value();
                groups[g]
                    .members
                    .push(decorate(player.name(), player.skill_tier.label()));
            }
        }

        debug!(
            "Formed {} skill groups of {} players, totals {:?}",
            group_count, max_per_group, totals
        );

        Ok(Formation {
            policy: Policy::MatchMaking,
            groups,
        })
    }

    /// Role-balanced groups ("Optimization").
    ///
    /// Goalkeepers are placed first (one per group where possible), then
    /// defenders, midfielders and attackers are each dealt to the smallest group.
    /// Goalkeeper surplus or shortage is reported through group notes.
    pub fn form_teams_by_role(
        &self,
        players: &[Player],
        group_count: usize,
        rng: &mut impl Rng,
    ) -> FormationResult<Formation> {
        check_group_count(players.len(), group_count)?;

        let mut buckets: BTreeMap<Position, Vec<&Player>> = BTreeMap::new();
        for player in players {
            let position = player
                .assigned_position
                .ok_or_else(|| FormationError::MissingPosition {
                    player: player.id.clone(),
                })?;
            buckets.entry(position).or_default().push(player);
        }
        for bucket in buckets.values_mut() {
            bucket.shuffle(rng);
        }

        let mut groups = self.config.empty_groups(group_count);

        let goalkeepers = buckets.remove(&Position::Goalkeeper).unwrap_or_default();
        self.place_goalkeepers(&mut groups, &goalkeepers);

        for position in OUTFIELD_ORDER {
            for player in buckets.get(&position).into_iter().flatten() {
                let g = smallest_group(&groups);
                groups[g]
                    .members
                    .push(decorate(player.name(), position.code()));
            }
        }

        debug!(
            "Formed {} role groups, sizes {:?}",
            group_count,
            groups.iter().map(Group::size).collect::<Vec<_>>()
        );

        Ok(Formation {
            policy: Policy::Optimization,
            groups,
        })
    }

    fn place_goalkeepers(&self, groups: &mut [Group], goalkeepers: &[&Player]) {
        let group_count = groups.len();
        let (starters, extras) = goalkeepers.split_at(goalkeepers.len().min(group_count));

        for (group, keeper) in groups.iter_mut().zip(starters) {
            group
                .members
                .push(decorate(keeper.name(), Position::Goalkeeper.code()));
        }

        if !extras.is_empty() {
            warn!(
                "{} goalkeepers for {} groups, {} will play in the field",
                goalkeepers.len(),
                group_count,
                extras.len()
            );
        }
        for keeper in extras {
            let g = smallest_group(groups);
            groups[g].members.push(decorate(keeper.name(), "GK, field"));
            groups[g].notes.push(NOTE_EXTRA_GOALKEEPER.to_string());
        }

        if starters.len() < group_count {
            warn!(
                "Only {} goalkeepers for {} groups",
                starters.len(),
                group_count
            );
            for group in &mut groups[starters.len()..] {
                group.notes.push(NOTE_NO_GOALKEEPER.to_string());
            }
        }
    }
}

fn decorate(name: &str, tag: &str) -> String {
    format!("{} ({})", name, tag)
}

/// Index of the group with the fewest members, lowest index on ties
fn smallest_group(groups: &[Group]) -> usize {
    (0..groups.len())
        .min_by_key(|&g| groups[g].size())
        .unwrap_or(0)
}
