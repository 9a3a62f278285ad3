use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormationError {
    #[error("Invalid group count {group_count} for a roster of {roster_size} players")]
    InvalidGroupCount { group_count: i64, roster_size: usize },

    #[error("No eligible positions to rotate through")]
    NoEligiblePositions,

    #[error("Player {player} has no assigned position")]
    MissingPosition { player: String },

    #[error("Config parse error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Persistence error: {0}")]
    Sink(String),
}

impl FormationError {
    /// Whether the caller can re-invoke with corrected input
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FormationError::Sink(_))
    }
}

pub type FormationResult<T> = Result<T, FormationError>;

/// Reject counts that cannot split the roster into equal groups
pub fn check_group_count(roster_size: usize, group_count: usize) -> FormationResult<()> {
    if group_count == 0 || roster_size % group_count != 0 {
        return Err(FormationError::InvalidGroupCount {
            group_count: i64::try_from(group_count).unwrap_or(i64::MAX),
            roster_size,
        });
    }
    Ok(())
}
