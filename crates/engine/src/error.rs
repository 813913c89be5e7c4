//! The module contains the error the engine can throw.
//!
//! The errors are:
//!
//! - [`Validation`] thrown when an offset link breaks one or more invariants.
//!   It carries every violated rule, never only the first one.
//! - [`Conflict`] thrown when the store refuses a write because of a
//!   uniqueness constraint (e.g. two concurrent links of the same refund).
//! - [`KeyNotFound`] thrown when an item is not found in the caller's family.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`Conflict`]: EngineError::Conflict
//!  [`KeyNotFound`]: EngineError::KeyNotFound
use std::fmt;

use sea_orm::DbErr;
use thiserror::Error;

/// A single broken offset-link invariant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OffsetViolation {
    /// The (expense, offset) pair is already linked.
    DuplicatePair,
    /// The offset transaction already backs another expense.
    OffsetAlreadyUsed,
    /// The expense side does not have a strictly positive amount.
    ExpenseNotPositive,
    /// The offset side does not have a strictly negative amount.
    OffsetNotNegative,
    /// Both sides are categorized, with different categories.
    CategoryMismatch,
    /// The two entries are further apart than the status allows.
    OutsideDateRange { max_days: i64, actual_days: i64 },
    /// The accounts of the two sides belong to different families.
    DifferentFamily,
}

impl fmt::Display for OffsetViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicatePair => f.write_str("expense and offset are already linked"),
            Self::OffsetAlreadyUsed => f.write_str("offset transaction already offsets an expense"),
            Self::ExpenseNotPositive => f.write_str("expense must be an expense (positive amount)"),
            Self::OffsetNotNegative => {
                f.write_str("offset must be an income/refund (negative amount)")
            }
            Self::CategoryMismatch => f.write_str(
                "offset must have the same category as the expense or be uncategorized",
            ),
            Self::OutsideDateRange { max_days, .. } => write!(f, "must be within {max_days} days"),
            Self::DifferentFamily => f.write_str("must be from same family"),
        }
    }
}

struct Violations<'a>(&'a [OffsetViolation]);

impl fmt::Display for Violations<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, violation) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid offset: {}", Violations(.0))]
    Validation(Vec<OffsetViolation>),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid status: {0}")]
    InvalidStatus(String),
    #[error("Currency mismatch: {0}")]
    CurrencyMismatch(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// `true` when a link could not be written because of its content or
    /// because a concurrent write got there first.
    ///
    /// Both mean "this link cannot be created right now" for the caller.
    #[must_use]
    pub fn is_link_rejected(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Conflict(_))
    }

    /// The violated invariants, empty for any other error.
    #[must_use]
    pub fn violations(&self) -> &[OffsetViolation] {
        match self {
            Self::Validation(violations) => violations,
            _ => &[],
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidStatus(a), Self::InvalidStatus(b)) => a == b,
            (Self::CurrencyMismatch(a), Self::CurrencyMismatch(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
