//! Repository abstraction for request persistence.
//!
//! This module defines the `RequestRepository` trait that abstracts
//! storage operations for reimbursement requests. Implementations can
//! provide different backends (in-memory, SQLite, etc.), but every
//! backend must make the decision transition a single atomic
//! conditional write: the status check, the token check, and the
//! terminal write happen as one indivisible operation.

mod memory;
mod sqlite;

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use greenlight_core::{Decision, DecisionToken, Request, RequestId, RequestStatus};

/// Error from a storage backend.
#[derive(Debug)]
pub enum RepositoryError {
    /// The backend failed to perform an operation.
    Storage {
        operation: &'static str,
        message: String,
    },
    /// A stored value could not be interpreted.
    Corruption { what: String },
}

impl RepositoryError {
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Storage {
            operation,
            message: message.into(),
        }
    }

    pub fn corruption(what: impl Into<String>) -> Self {
        Self::Corruption { what: what.into() }
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage { operation, message } => {
                write!(f, "storage error during {}: {}", operation, message)
            }
            Self::Corruption { what } => {
                write!(f, "corrupt stored data: {}", what)
            }
        }
    }
}

impl std::error::Error for RepositoryError {}

/// Result of an atomic check-and-transition attempt.
///
/// `decide` never partially applies: either `Applied` carries the
/// post-transition record, or the record is untouched and the variant
/// says why.
#[derive(Debug, Clone, PartialEq)]
pub enum DecideOutcome {
    /// The conditional write landed; the request is now terminal.
    Applied(Request),
    /// No record with that identifier exists.
    NotFound,
    /// The record was already terminal (this caller lost the race, or
    /// is replaying a decision that already committed).
    AlreadyDecided(RequestStatus),
    /// The record is still pending but the presented token does not
    /// match the stored one.
    TokenMismatch,
}

/// Repository trait for persisting reimbursement requests.
///
/// The coordinator and the approval gateway only ever touch storage
/// through this trait. Records are never deleted; they are retained
/// indefinitely for audit.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    /// Persist a freshly created request. Fails if the identifier is
    /// already taken.
    async fn insert(&self, request: &Request) -> Result<(), RepositoryError>;

    /// Fetch a request by identifier, returning None if not found.
    async fn get(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError>;

    /// Atomically transition a pending request to the decision's
    /// terminal status, if and only if it is still `PENDING` and the
    /// presented token matches the stored one.
    async fn decide(
        &self,
        id: &RequestId,
        token: &DecisionToken,
        decision: Decision,
        decided_at: DateTime<Utc>,
    ) -> Result<DecideOutcome, RepositoryError>;

    /// All requests, newest first.
    async fn list(&self) -> Result<Vec<Request>, RepositoryError>;
}

/// Bound a store round-trip to `timeout`.
///
/// Expiry surfaces as a storage error, which callers map to an internal
/// fault; no state change is assumed either way.
pub async fn bounded<T, F>(
    timeout: Duration,
    operation: &'static str,
    fut: F,
) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(RepositoryError::storage(
            operation,
            format!("store did not respond within {:?}", timeout),
        )),
    }
}
