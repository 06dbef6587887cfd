//! Validation errors.

use std::fmt;
use std::time::Duration;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// A single violated rule.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Tier table is empty")]
    EmptyTierTable,

    #[error("Lowest tier must start at 0 points (found {minimum_points})")]
    LowestTierNotZero { minimum_points: i64 },

    #[error("Tier '{name}' threshold {minimum_points} is not above the previous threshold {previous}")]
    ThresholdsNotAscending {
        name: String,
        minimum_points: i64,
        previous: i64,
    },

    #[error("Tier name at ordinal {ordinal} is empty")]
    EmptyTierName { ordinal: usize },

    #[error("Tier name '{name}' is used more than once")]
    DuplicateTierName { name: String },

    #[error("Customer ID is empty")]
    EmptyCustomerId,

    #[error("Starting points must not be negative (found {points})")]
    NegativePoints { points: i64 },

    #[error("Unknown tier ordinal {ordinal} (table has {len} tiers)")]
    UnknownTier { ordinal: usize, len: usize },

    #[error("History threshold must be greater than zero")]
    ZeroHistoryThreshold,

    #[error("Retry policy must allow at least one attempt")]
    NoRetryAttempts,

    #[error("Retry backoff coefficient must be at least 1.0 (found {coefficient})")]
    BackoffCoefficientTooSmall { coefficient: f64 },

    #[error("Retry maximum interval {max:?} is shorter than the initial interval {initial:?}")]
    MaxIntervalBelowInitial { initial: Duration, max: Duration },
}

/// Every violation found by one validation pass.
#[derive(Debug, Clone, Error, PartialEq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// Turn an accumulated validation into a `Result`.
    pub fn check(validation: Validation<(), NonEmptyVec<ValidationError>>) -> Result<(), Self> {
        match validation {
            Validation::Success(_) => Ok(()),
            Validation::Failure(errors) => Err(Self(errors.iter().cloned().collect())),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, error: &ValidationError) -> bool {
        self.0.contains(error)
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0
    }
}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self(errors)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.0.len())?;
        for (i, error) in self.0.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{error}")?;
        }
        Ok(())
    }
}
