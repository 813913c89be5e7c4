//! Candidate matcher.
//!
//! Proposes plausible (expense, offset) pairs from a family's history. The
//! pipeline is:
//!
//! 1. load the family's offsettable entries (store-side predicates: family,
//!    account status, `standard` kind, not excluded);
//! 2. split by sign, restrict to the anchor if one is given;
//! 3. for each expense, walk the refunds of the same currency inside the
//!    date window (refunds are indexed by currency and sorted by date);
//! 4. keep pairs passing every in-memory stage (magnitude, category, not
//!    linked, offset not used, not rejected);
//! 5. rank: closest date first, then largest refund first.
//!
//! Nothing is written; calling it repeatedly is safe.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, TimeDelta};
use sea_orm::{ConnectionTrait, JoinType, QueryFilter, QuerySelect, prelude::*};
use uuid::Uuid;

use crate::{
    Currency, EngineError, Money, ResultEngine, accounts, entries,
    ledger::{self, TransactionSnapshot},
    offsets, rejected_offsets,
    validation::categories_compatible,
};

use super::Engine;

pub const DEFAULT_CANDIDATE_WINDOW_DAYS: i64 = 30;

/// Restricts the matcher to pairs involving one transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CandidateAnchor {
    /// Offset candidates for this expense.
    Expense(Uuid),
    /// Expense candidates for this refund.
    Offset(Uuid),
}

impl CandidateAnchor {
    fn expense_id(self) -> Option<Uuid> {
        match self {
            Self::Expense(id) => Some(id),
            Self::Offset(_) => None,
        }
    }

    fn offset_id(self) -> Option<Uuid> {
        match self {
            Self::Offset(id) => Some(id),
            Self::Expense(_) => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CandidateQuery {
    /// Symmetric, inclusive window in days. Falls back to the engine default.
    pub window_days: Option<i64>,
    pub anchor: Option<CandidateAnchor>,
}

/// A proposed pair. Not persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OffsetCandidate {
    pub expense_transaction_id: Uuid,
    pub offset_transaction_id: Uuid,
    pub date_diff_days: i64,
    /// Absolute expense amount.
    pub expense_amount: Money,
    /// Absolute refund amount.
    pub offset_amount: Money,
}

impl OffsetCandidate {
    fn from_pair(pair: &Pair<'_>) -> Self {
        Self {
            expense_transaction_id: pair.expense.transaction_id,
            offset_transaction_id: pair.offset.transaction_id,
            date_diff_days: pair.expense.days_from(pair.offset),
            expense_amount: pair.expense.money().abs(),
            offset_amount: pair.offset.money().abs(),
        }
    }
}

pub(super) fn validate_window(window_days: i64) -> ResultEngine<()> {
    if window_days < 0 {
        return Err(EngineError::InvalidAmount(
            "date window must be >= 0 days".to_string(),
        ));
    }
    Ok(())
}

/// Closest date first; on equal distance, largest refund first. Stable, so
/// full ties keep their discovery order.
pub(crate) fn rank_candidates(candidates: &mut [OffsetCandidate]) {
    candidates.sort_by(|a, b| {
        a.date_diff_days
            .cmp(&b.date_diff_days)
            .then_with(|| b.offset_amount.amount().cmp(&a.offset_amount.amount()))
    });
}

#[derive(Clone, Copy)]
struct Pair<'a> {
    expense: &'a TransactionSnapshot,
    offset: &'a TransactionSnapshot,
}

impl Pair<'_> {
    /// A refund cannot exceed the expense it offsets.
    fn offset_within_expense(&self) -> bool {
        self.offset.amount_minor.unsigned_abs() <= self.expense.amount_minor.unsigned_abs()
    }

    fn categories_match(&self) -> bool {
        categories_compatible(self.expense, self.offset)
    }

    fn key(&self) -> (Uuid, Uuid) {
        (self.expense.transaction_id, self.offset.transaction_id)
    }
}

/// Existing links and rejections touching the family's refunds.
#[derive(Debug, Default)]
struct Exclusions {
    linked_pairs: HashSet<(Uuid, Uuid)>,
    used_offsets: HashSet<Uuid>,
    rejected_pairs: HashSet<(Uuid, Uuid)>,
}

impl Exclusions {
    async fn load<C: ConnectionTrait>(db: &C, family_id: Uuid) -> ResultEngine<Self> {
        let links: Vec<(Uuid, Uuid)> = offsets::Entity::find()
            .select_only()
            .column(offsets::Column::ExpenseTransactionId)
            .column(offsets::Column::OffsetTransactionId)
            .join(JoinType::InnerJoin, offsets::Relation::OffsetEntry.def())
            .join(JoinType::InnerJoin, entries::Relation::Accounts.def())
            .filter(accounts::Column::FamilyId.eq(family_id))
            .into_tuple()
            .all(db)
            .await?;

        let rejected_pairs: HashSet<(Uuid, Uuid)> = rejected_offsets::Entity::find()
            .select_only()
            .column(rejected_offsets::Column::ExpenseTransactionId)
            .column(rejected_offsets::Column::OffsetTransactionId)
            .join(
                JoinType::InnerJoin,
                rejected_offsets::Relation::OffsetEntry.def(),
            )
            .join(JoinType::InnerJoin, entries::Relation::Accounts.def())
            .filter(accounts::Column::FamilyId.eq(family_id))
            .into_tuple()
            .all(db)
            .await?
            .into_iter()
            .collect();

        Ok(Self {
            used_offsets: links.iter().map(|(_, offset)| *offset).collect(),
            linked_pairs: links.into_iter().collect(),
            rejected_pairs,
        })
    }

    fn is_linked(&self, pair: &Pair<'_>) -> bool {
        self.linked_pairs.contains(&pair.key())
    }

    fn offset_used(&self, pair: &Pair<'_>) -> bool {
        self.used_offsets.contains(&pair.offset.transaction_id)
    }

    fn is_rejected(&self, pair: &Pair<'_>) -> bool {
        self.rejected_pairs.contains(&pair.key())
    }
}

/// Refunds grouped by currency, each group sorted by date.
struct RefundIndex<'a> {
    by_currency: HashMap<Currency, Vec<&'a TransactionSnapshot>>,
}

impl<'a> RefundIndex<'a> {
    fn new(refunds: impl IntoIterator<Item = &'a TransactionSnapshot>) -> Self {
        let mut by_currency: HashMap<Currency, Vec<&'a TransactionSnapshot>> = HashMap::new();
        for refund in refunds {
            by_currency.entry(refund.currency).or_default().push(refund);
        }
        for group in by_currency.values_mut() {
            group.sort_by_key(|refund| (refund.date, refund.transaction_id));
        }
        Self { by_currency }
    }

    /// Refunds in the expense's currency within `window_days` of its date.
    /// Window bounds saturate at the calendar limits.
    fn around(
        &self,
        expense: &TransactionSnapshot,
        window_days: i64,
    ) -> impl Iterator<Item = &'a TransactionSnapshot> + '_ {
        let group = self
            .by_currency
            .get(&expense.currency)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let window = TimeDelta::try_days(window_days).unwrap_or(TimeDelta::MAX);
        let from = expense
            .date
            .checked_sub_signed(window)
            .unwrap_or(NaiveDate::MIN);
        let to = expense
            .date
            .checked_add_signed(window)
            .unwrap_or(NaiveDate::MAX);
        let start = group.partition_point(|refund| refund.date < from);
        let end = group.partition_point(|refund| refund.date <= to);
        group[start..end].iter().copied()
    }
}

fn pair_candidates(
    expenses: &[&TransactionSnapshot],
    refunds: &RefundIndex<'_>,
    window_days: i64,
    exclusions: &Exclusions,
) -> Vec<OffsetCandidate> {
    expenses
        .iter()
        .flat_map(|&expense| {
            refunds
                .around(expense, window_days)
                .map(move |offset| Pair { expense, offset })
        })
        .filter(Pair::offset_within_expense)
        .filter(Pair::categories_match)
        .filter(|pair| !exclusions.is_linked(pair))
        .filter(|pair| !exclusions.offset_used(pair))
        .filter(|pair| !exclusions.is_rejected(pair))
        .map(|pair| OffsetCandidate::from_pair(&pair))
        .collect()
}

impl Engine {
    /// Ranked offset proposals for a family.
    ///
    /// With an anchor, only pairs involving that transaction are returned; an
    /// anchor whose sign does not fit its role yields an empty list.
    pub async fn offset_match_candidates(
        &self,
        family_id: Uuid,
        query: &CandidateQuery,
    ) -> ResultEngine<Vec<OffsetCandidate>> {
        let window_days = query.window_days.unwrap_or(self.candidate_window_days);
        validate_window(window_days)?;
        let db = &self.database;

        if let Some(anchor) = query.anchor {
            let fits = match anchor {
                CandidateAnchor::Expense(id) => {
                    ledger::require_family_snapshot(db, family_id, id)
                        .await?
                        .is_expense()
                }
                CandidateAnchor::Offset(id) => {
                    ledger::require_family_snapshot(db, family_id, id)
                        .await?
                        .is_refund()
                }
            };
            if !fits {
                return Ok(Vec::new());
            }
        }

        let pool = ledger::offsettable_snapshots(db, family_id).await?;
        // The anchor narrows its own side only; the other side stays whole.
        let only_expense = query.anchor.and_then(CandidateAnchor::expense_id);
        let only_offset = query.anchor.and_then(CandidateAnchor::offset_id);
        let expenses: Vec<&TransactionSnapshot> = pool
            .iter()
            .filter(|s| s.is_expense() && only_expense.is_none_or(|id| id == s.transaction_id))
            .collect();
        let refunds = RefundIndex::new(
            pool.iter()
                .filter(|s| s.is_refund() && only_offset.is_none_or(|id| id == s.transaction_id)),
        );

        let exclusions = Exclusions::load(db, family_id).await?;
        let mut candidates = pair_candidates(&expenses, &refunds, window_days, &exclusions);
        rank_candidates(&mut candidates);

        tracing::debug!(
            %family_id,
            window_days,
            candidates = candidates.len(),
            "offset candidates computed"
        );
        Ok(candidates)
    }

    /// Refunds that could offset `expense_transaction_id`.
    pub async fn offset_candidates_for(
        &self,
        family_id: Uuid,
        expense_transaction_id: Uuid,
        window_days: Option<i64>,
    ) -> ResultEngine<Vec<OffsetCandidate>> {
        let query = CandidateQuery {
            window_days,
            anchor: Some(CandidateAnchor::Expense(expense_transaction_id)),
        };
        self.offset_match_candidates(family_id, &query).await
    }

    /// Expenses that `offset_transaction_id` could offset.
    pub async fn expense_candidates_for(
        &self,
        family_id: Uuid,
        offset_transaction_id: Uuid,
        window_days: Option<i64>,
    ) -> ResultEngine<Vec<OffsetCandidate>> {
        let query = CandidateQuery {
            window_days,
            anchor: Some(CandidateAnchor::Offset(offset_transaction_id)),
        };
        self.offset_match_candidates(family_id, &query).await
    }

    /// Candidates for a transaction, choosing the direction by its sign: an
    /// expense gets refund candidates, anything else expense candidates.
    pub async fn match_candidates_for(
        &self,
        family_id: Uuid,
        transaction_id: Uuid,
    ) -> ResultEngine<Vec<OffsetCandidate>> {
        let anchor = ledger::require_family_snapshot(&self.database, family_id, transaction_id).await?;
        if anchor.is_expense() {
            self.offset_candidates_for(family_id, transaction_id, None)
                .await
        } else {
            self.expense_candidates_for(family_id, transaction_id, None)
                .await
        }
    }
}
