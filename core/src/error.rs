use crate::types::{MatchId, PlayerId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LadderError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid match composition: {reason}")]
    InvalidMatchComposition { reason: String },

    #[error("Unknown player {player_id} (match {match_id:?})")]
    UnknownPlayer { player_id: PlayerId, match_id: Option<MatchId> },

    #[error("Player {player_id} not found")]
    PlayerNotFound { player_id: PlayerId },

    #[error("Match {match_id} not found")]
    MatchNotFound { match_id: MatchId },

    #[error("Invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    #[error("Insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LadderError {
    pub(crate) fn composition(reason: impl Into<String>) -> Self {
        LadderError::InvalidMatchComposition { reason: reason.into() }
    }
}

/// Ridge strengths must be finite and non-negative.
pub(crate) fn check_lambda(name: &str, lambda: f64) -> LadderResult<()> {
    if lambda.is_finite() && lambda >= 0.0 {
        Ok(())
    } else {
        Err(LadderError::InvalidParameter {
            reason: format!("{name} must be finite and >= 0, got {lambda}"),
        })
    }
}

pub type LadderResult<T> = Result<T, LadderError>;
