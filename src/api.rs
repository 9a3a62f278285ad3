//! JSON entry points behind the WASM bindings.
//!
//! Every function takes and returns JSON strings so the host app can call the
//! engine without sharing Rust types.

use crate::error::{FormationError, FormationResult};
use crate::roster::InMemoryDirectory;
use crate::session::{FormationRequest, FormationSession};
use crate::types::*;
use serde::Deserialize;

/// A formation request together with a snapshot of the caller's stores
#[derive(Deserialize)]
struct EventPayload {
    request: FormationRequest,
    #[serde(default)]
    directory: InMemoryDirectory,
}

pub fn parse_config(config_json: &str) -> FormationResult<FormationConfig> {
    serde_json::from_str(config_json).map_err(|e| FormationError::Config(e.to_string()))
}

pub fn default_config_json() -> String {
    serde_json::to_string(&FormationConfig::default()).unwrap_or_default()
}

/// `{"position": ..., "history": [...]}` for one player
pub fn next_position_json(
    session: &mut FormationSession,
    eligible_json: &str,
    history_json: &str,
) -> FormationResult<String> {
    let names: Vec<String> = serde_json::from_str(eligible_json)?;
    let eligible = parse_position_set(names);
    let history: Vec<Position> = if history_json.trim().is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(history_json)?
    };

    let (position, history) = session.next_position(&eligible, &history)?;

    Ok(serde_json::json!({
        "position": position,
        "history": history,
    })
    .to_string())
}

/// `{"groups": {label: entries}, "notes": {label: notes}}` for a resolved roster
pub fn form_teams_json(
    session: &mut FormationSession,
    policy: &str,
    players_json: &str,
    group_count: i64,
) -> FormationResult<String> {
    let policy = Policy::parse(policy)
        .ok_or_else(|| FormationError::Config(format!("Unknown policy: {}", policy)))?;
    let players: Vec<Player> = serde_json::from_str(players_json)?;

    let formation = session.form_teams(policy, &players, group_count)?;

    Ok(serde_json::json!({
        "policy": formation.policy,
        "groups": formation.to_map(),
        "notes": formation.notes(),
    })
    .to_string())
}

/// Resolve, balance and return the formation plus rotation updates for one event
pub fn run_event_json(session: &mut FormationSession, payload_json: &str) -> FormationResult<String> {
    let EventPayload { request, mut directory } = serde_json::from_str(payload_json)?;

    let outcome = session.run_event(&request, &mut directory)?;

    let rotations: serde_json::Map<String, serde_json::Value> = outcome
        .rotations
        .keys()
        .filter_map(|id| {
            let rotation = directory.rotation(id)?;
            Some((id.clone(), serde_json::to_value(rotation).ok()?))
        })
        .collect();

    Ok(serde_json::json!({
        "event_id": outcome.event_id,
        "policy": outcome.formation.policy,
        "groups": outcome.formation.to_map(),
        "notes": outcome.formation.notes(),
        "rotations": rotations,
    })
    .to_string())
}
