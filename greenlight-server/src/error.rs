//! Error taxonomy for the coordinator and the approval gateway.

use std::fmt;

use greenlight_core::{RequestStatus, ValidationError};

use crate::repository::RepositoryError;

/// Failure of a coordinator or gateway operation.
///
/// Each variant maps to one HTTP status (see `api`): validation failures
/// to 400, unknown ids to 404, token mismatches to 403, already-decided
/// requests to 409, and store failures or timeouts to 500. A race loser
/// in the decision path gets `AlreadyDecided`, an expected outcome, not
/// `Internal`.
#[derive(Debug)]
pub enum WorkflowError {
    /// Malformed or out-of-range input. Nothing was persisted.
    Validation(String),
    /// No request with the given identifier exists.
    NotFound,
    /// The request is still pending but the presented token does not
    /// match.
    Authorization,
    /// The request already reached a terminal status.
    AlreadyDecided(RequestStatus),
    /// The store failed or did not answer within the configured bound.
    /// No state change may be assumed.
    Internal(String),
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "{}", message),
            Self::NotFound => write!(f, "Request not found"),
            Self::Authorization => write!(f, "Invalid decision token"),
            Self::AlreadyDecided(status) => {
                write!(f, "Request already decided: {}", status)
            }
            Self::Internal(message) => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for WorkflowError {}

impl From<ValidationError> for WorkflowError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<RepositoryError> for WorkflowError {
    fn from(err: RepositoryError) -> Self {
        Self::Internal(err.to_string())
    }
}
