//! Read model over the ledger tables.
//!
//! A [`TransactionSnapshot`] is a transaction joined with its entry and the
//! owning account: everything the matcher and the link validation look at.
//! Queries are built with sea-orm's query builder, so every input is bound
//! as a parameter.

use chrono::NaiveDate;
use sea_orm::{
    ConnectionTrait, FromQueryResult, JoinType, QueryFilter, QueryOrder, QuerySelect, Select,
    prelude::*,
};
use uuid::Uuid;

use crate::{
    Currency, EngineError, Money, ResultEngine, TransactionKind, accounts::AccountStatus,
    entries, transactions,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TransactionSnapshot {
    pub transaction_id: Uuid,
    pub account_id: Uuid,
    pub family_id: Uuid,
    pub category_id: Option<Uuid>,
    pub date: NaiveDate,
    pub amount_minor: i64,
    pub currency: Currency,
}

impl TransactionSnapshot {
    pub fn money(&self) -> Money {
        Money::from_minor(self.amount_minor, self.currency)
    }

    pub fn is_expense(&self) -> bool {
        self.amount_minor > 0
    }

    pub fn is_refund(&self) -> bool {
        self.amount_minor < 0
    }

    /// Absolute distance in days between the two entries.
    pub fn days_from(&self, other: &TransactionSnapshot) -> i64 {
        (self.date - other.date).num_days().abs()
    }
}

#[derive(Debug, FromQueryResult)]
struct SnapshotRow {
    transaction_id: Uuid,
    account_id: Uuid,
    family_id: Uuid,
    category_id: Option<Uuid>,
    date: Date,
    amount_minor: i64,
    currency: String,
}

impl TryFrom<SnapshotRow> for TransactionSnapshot {
    type Error = EngineError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        Ok(Self {
            transaction_id: row.transaction_id,
            account_id: row.account_id,
            family_id: row.family_id,
            category_id: row.category_id,
            date: row.date,
            amount_minor: row.amount_minor,
            currency: Currency::try_from(row.currency.as_str())?,
        })
    }
}

/// `entries ⋈ accounts ⋈ transactions`, projected onto [`SnapshotRow`].
fn snapshot_select() -> Select<entries::Entity> {
    entries::Entity::find()
        .select_only()
        .column_as(entries::Column::TransactionId, "transaction_id")
        .column_as(entries::Column::AccountId, "account_id")
        .column_as(crate::accounts::Column::FamilyId, "family_id")
        .column_as(transactions::Column::CategoryId, "category_id")
        .column_as(entries::Column::Date, "date")
        .column_as(entries::Column::AmountMinor, "amount_minor")
        .column_as(entries::Column::Currency, "currency")
        .join(JoinType::InnerJoin, entries::Relation::Accounts.def())
        .join(JoinType::InnerJoin, entries::Relation::Transactions.def())
}

async fn collect<C: ConnectionTrait>(
    db: &C,
    select: Select<entries::Entity>,
) -> ResultEngine<Vec<TransactionSnapshot>> {
    select
        .into_model::<SnapshotRow>()
        .all(db)
        .await?
        .into_iter()
        .map(TransactionSnapshot::try_from)
        .collect()
}

/// Loads a transaction anywhere in the store.
pub(crate) async fn find_snapshot<C: ConnectionTrait>(
    db: &C,
    transaction_id: Uuid,
) -> ResultEngine<Option<TransactionSnapshot>> {
    let select = snapshot_select().filter(entries::Column::TransactionId.eq(transaction_id));
    Ok(collect(db, select).await?.into_iter().next())
}

/// Loads a transaction that must belong to `family_id`.
pub(crate) async fn require_family_snapshot<C: ConnectionTrait>(
    db: &C,
    family_id: Uuid,
    transaction_id: Uuid,
) -> ResultEngine<TransactionSnapshot> {
    match find_snapshot(db, transaction_id).await? {
        Some(snapshot) if snapshot.family_id == family_id => Ok(snapshot),
        _ => Err(EngineError::KeyNotFound("transaction not exists".to_string())),
    }
}

/// Loads a transaction, failing when it does not exist at all.
pub(crate) async fn require_snapshot<C: ConnectionTrait>(
    db: &C,
    transaction_id: Uuid,
) -> ResultEngine<TransactionSnapshot> {
    find_snapshot(db, transaction_id)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound("transaction not exists".to_string()))
}

/// Every transaction of the family that may take part in an offset link:
/// unexcluded `standard` entries on `draft`/`active` accounts, oldest first.
pub(crate) async fn offsettable_snapshots<C: ConnectionTrait>(
    db: &C,
    family_id: Uuid,
) -> ResultEngine<Vec<TransactionSnapshot>> {
    let statuses = AccountStatus::MATCHABLE.map(AccountStatus::as_str);
    let select = snapshot_select()
        .filter(crate::accounts::Column::FamilyId.eq(family_id))
        .filter(crate::accounts::Column::Status.is_in(statuses))
        .filter(transactions::Column::Kind.eq(TransactionKind::Standard.as_str()))
        .filter(entries::Column::Excluded.eq(false))
        .filter(entries::Column::AmountMinor.ne(0))
        .order_by_asc(entries::Column::Date)
        .order_by_asc(entries::Column::TransactionId);
    collect(db, select).await
}
