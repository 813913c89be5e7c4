//! Offset-link invariants.
//!
//! Every rule is evaluated on every call; the caller receives the full list
//! of violations instead of the first one.

use crate::{OffsetStatus, OffsetViolation, ledger::TransactionSnapshot};

/// State of the store relevant to the uniqueness rules, read in the same
/// DB transaction that will write the link.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ExistingLinks {
    /// Another link already joins this exact pair.
    pub pair_linked: bool,
    /// Another link already uses the offset transaction.
    pub offset_used: bool,
}

pub(crate) fn validate_link(
    expense: &TransactionSnapshot,
    offset: &TransactionSnapshot,
    status: OffsetStatus,
    existing: ExistingLinks,
) -> Vec<OffsetViolation> {
    let mut violations = Vec::new();

    if existing.pair_linked {
        violations.push(OffsetViolation::DuplicatePair);
    }
    if existing.offset_used {
        violations.push(OffsetViolation::OffsetAlreadyUsed);
    }
    if !expense.is_expense() {
        violations.push(OffsetViolation::ExpenseNotPositive);
    }
    if !offset.is_refund() {
        violations.push(OffsetViolation::OffsetNotNegative);
    }
    if !categories_compatible(expense, offset) {
        violations.push(OffsetViolation::CategoryMismatch);
    }

    let max_days = status.max_date_distance_days();
    let actual_days = expense.days_from(offset);
    if actual_days > max_days {
        violations.push(OffsetViolation::OutsideDateRange {
            max_days,
            actual_days,
        });
    }

    if expense.family_id != offset.family_id {
        violations.push(OffsetViolation::DifferentFamily);
    }

    violations
}

/// Same category, or at least one side uncategorized.
pub(crate) fn categories_compatible(
    expense: &TransactionSnapshot,
    offset: &TransactionSnapshot,
) -> bool {
    match (expense.category_id, offset.category_id) {
        (Some(expense_category), Some(offset_category)) => expense_category == offset_category,
        _ => true,
    }
}
