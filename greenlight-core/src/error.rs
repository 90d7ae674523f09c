//! Validation errors for request submissions.

use std::fmt;

/// Rejection of a request submission before anything is persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A required text field was empty (after trimming).
    EmptyField { field: &'static str },
    /// The cost was negative, NaN, or infinite.
    InvalidCost { cost: f64 },
    /// The decision literal was not one of the accepted values.
    InvalidDecision { value: String },
}

impl ValidationError {
    pub fn empty_field(field: &'static str) -> Self {
        Self::EmptyField { field }
    }

    pub fn invalid_cost(cost: f64) -> Self {
        Self::InvalidCost { cost }
    }

    pub fn invalid_decision(value: impl Into<String>) -> Self {
        Self::InvalidDecision {
            value: value.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyField { field } => {
                write!(f, "{} must not be empty", field)
            }
            Self::InvalidCost { cost } => {
                write!(f, "cost must be a finite non-negative number, got {}", cost)
            }
            Self::InvalidDecision { value } => {
                write!(f, "decision must be APPROVED or REJECTED, got '{}'", value)
            }
        }
    }
}

impl std::error::Error for ValidationError {}
