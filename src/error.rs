//! Error types shared by the dispatch core

use thiserror::Error;

/// Failures surfaced by the matcher, the fare calculator and their collaborators
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A collaborator read or write failed
    #[error("data access failed: {0}")]
    DataAccess(String),

    /// A referenced record does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The ride cannot be processed in its current state
    #[error("ride {ride_id} is in an invalid state: {reason}")]
    InvalidState { ride_id: i64, reason: String },

    /// A commit found the ride or driver already claimed by another writer
    #[error("ride {ride_id} could not be assigned to driver {driver_id}: already claimed")]
    AssignmentConflict { ride_id: i64, driver_id: i64 },
}

impl DispatchError {
    pub fn invalid_state(ride_id: i64, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            ride_id,
            reason: reason.into(),
        }
    }

    /// True for failures that abort an allocation pass and are retried next tick
    pub fn is_data_access(&self) -> bool {
        matches!(self, Self::DataAccess(_) | Self::AssignmentConflict { .. })
    }

    /// Stable code used in NATS error responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::DataAccess(_) => "DATABASE_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::AssignmentConflict { .. } => "CONFLICT",
        }
    }
}

impl From<sqlx::Error> for DispatchError {
    fn from(err: sqlx::Error) -> Self {
        Self::DataAccess(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
