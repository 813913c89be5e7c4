use sea_orm::{
    ConnectionTrait, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*, sea_query::OnConflict,
};
use uuid::Uuid;

use crate::{
    EngineError, RejectedOffset, ResultEngine, accounts, entries, ledger, rejected_offsets,
};

use super::{Engine, with_tx};

/// Find-or-create the ledger row of a pair.
///
/// The insert is a no-op when the pair is already rejected, so concurrent
/// rejections of the same pair both end with the same row.
pub(super) async fn record_rejection<C: ConnectionTrait>(
    db: &C,
    expense_transaction_id: Uuid,
    offset_transaction_id: Uuid,
) -> ResultEngine<RejectedOffset> {
    let rejected = RejectedOffset::new(expense_transaction_id, offset_transaction_id);
    rejected_offsets::Entity::insert(rejected_offsets::ActiveModel::from(&rejected))
        .on_conflict(
            OnConflict::columns([
                rejected_offsets::Column::ExpenseTransactionId,
                rejected_offsets::Column::OffsetTransactionId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    find_rejection(db, expense_transaction_id, offset_transaction_id)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound("rejected offset not exists".to_string()))
}

async fn find_rejection<C: ConnectionTrait>(
    db: &C,
    expense_transaction_id: Uuid,
    offset_transaction_id: Uuid,
) -> ResultEngine<Option<RejectedOffset>> {
    Ok(rejected_offsets::Entity::find()
        .filter(rejected_offsets::Column::ExpenseTransactionId.eq(expense_transaction_id))
        .filter(rejected_offsets::Column::OffsetTransactionId.eq(offset_transaction_id))
        .one(db)
        .await?
        .map(RejectedOffset::from))
}

impl Engine {
    /// Permanently suppresses a pair from candidate suggestions, whether or
    /// not it was ever linked. Idempotent.
    ///
    /// An existing link of the pair is left untouched: use
    /// [`Engine::reject_offset`] to turn a link into a rejection.
    pub async fn reject_pair(
        &self,
        family_id: Uuid,
        expense_transaction_id: Uuid,
        offset_transaction_id: Uuid,
    ) -> ResultEngine<RejectedOffset> {
        let rejected = with_tx!(self, |db_tx| {
            ledger::require_family_snapshot(&db_tx, family_id, expense_transaction_id).await?;
            ledger::require_family_snapshot(&db_tx, family_id, offset_transaction_id).await?;
            record_rejection(&db_tx, expense_transaction_id, offset_transaction_id).await
        })?;
        tracing::info!(
            %family_id,
            expense = %rejected.expense_transaction_id,
            offset = %rejected.offset_transaction_id,
            "offset pair rejected"
        );
        Ok(rejected)
    }

    pub async fn is_rejected(
        &self,
        expense_transaction_id: Uuid,
        offset_transaction_id: Uuid,
    ) -> ResultEngine<bool> {
        let count = rejected_offsets::Entity::find()
            .filter(rejected_offsets::Column::ExpenseTransactionId.eq(expense_transaction_id))
            .filter(rejected_offsets::Column::OffsetTransactionId.eq(offset_transaction_id))
            .count(&self.database)
            .await?;
        Ok(count > 0)
    }

    /// Rejection ledger of a family, oldest first.
    pub async fn rejected_offsets(&self, family_id: Uuid) -> ResultEngine<Vec<RejectedOffset>> {
        let models = rejected_offsets::Entity::find()
            .join(
                JoinType::InnerJoin,
                rejected_offsets::Relation::OffsetEntry.def(),
            )
            .join(JoinType::InnerJoin, entries::Relation::Accounts.def())
            .filter(accounts::Column::FamilyId.eq(family_id))
            .order_by_asc(rejected_offsets::Column::CreatedAt)
            .order_by_asc(rejected_offsets::Column::Id)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(RejectedOffset::from).collect())
    }
}
