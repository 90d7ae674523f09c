//! Domain model for certification-reimbursement requests.
//!
//! A request is created `PENDING` together with a single-use decision
//! token, and later makes exactly one transition to `APPROVED` or
//! `REJECTED`. Everything here is plain data; persistence and the atomic
//! transition itself live in the server's repository layer.

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ValidationError;

/// Opaque unique identifier for a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a fresh identifier (UUID v4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Number of random bytes in a decision token (256 bits of entropy).
const TOKEN_BYTES: usize = 32;

/// Single-use credential authorizing the decision on one request.
///
/// Stored server-side only and handed exclusively to the delivery
/// channel; no read endpoint ever returns it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionToken(pub String);

impl DecisionToken {
    /// Generate a fresh token from the OS entropy source.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }
}

// The token must not leak into logs through Debug formatting.
impl fmt::Debug for DecisionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DecisionToken(<redacted>)")
    }
}

impl From<String> for DecisionToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Lifecycle status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Terminal statuses never change again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl FromStr for RequestStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(ValidationError::invalid_decision(other)),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A manager's verdict on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    /// The terminal status this decision transitions the request into.
    pub fn terminal_status(&self) -> RequestStatus {
        match self {
            Self::Approved => RequestStatus::Approved,
            Self::Rejected => RequestStatus::Rejected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl FromStr for Decision {
    type Err = ValidationError;

    /// Accepts exactly the literals `APPROVED` and `REJECTED`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(ValidationError::invalid_decision(other)),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validated input for creating a request.
///
/// Construction is the only way to get one, so holding a
/// `RequestSubmission` means the fields already passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSubmission {
    name: String,
    course: String,
    cost: f64,
}

impl RequestSubmission {
    /// Validate raw input. `name` and `course` are trimmed and must be
    /// non-empty; `cost` must be finite and non-negative.
    pub fn new(
        name: impl AsRef<str>,
        course: impl AsRef<str>,
        cost: f64,
    ) -> Result<Self, ValidationError> {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return Err(ValidationError::empty_field("name"));
        }

        let course = course.as_ref().trim();
        if course.is_empty() {
            return Err(ValidationError::empty_field("course"));
        }

        if !cost.is_finite() || cost < 0.0 {
            return Err(ValidationError::invalid_cost(cost));
        }

        Ok(Self {
            name: name.to_string(),
            course: course.to_string(),
            cost,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn course(&self) -> &str {
        &self.course
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }
}

/// A request record as held by the store.
///
/// Immutable after creation except for the single
/// `PENDING -> APPROVED | REJECTED` transition, which sets `status` and
/// `decided_at` together.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: RequestId,
    pub name: String,
    pub course: String,
    pub cost: f64,
    pub status: RequestStatus,
    pub decision_token: DecisionToken,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl Request {
    /// Create a fresh `PENDING` record from a validated submission,
    /// generating the identifier and the decision token.
    pub fn create(submission: RequestSubmission) -> Self {
        Self {
            id: RequestId::generate(),
            name: submission.name,
            course: submission.course,
            cost: submission.cost,
            status: RequestStatus::Pending,
            decision_token: DecisionToken::generate(),
            created_at: Utc::now(),
            decided_at: None,
        }
    }
}
