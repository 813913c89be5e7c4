use uuid::Uuid;

use sea_orm::{ActiveValue, QueryFilter, QuerySelect, TransactionTrait, prelude::*};

use crate::{EngineError, ResultEngine, accounts, entries};

use super::{Engine, with_tx};

impl Engine {
    /// Recomputes the denormalized balance of an account from its entries.
    ///
    /// - Ignores excluded entries.
    /// - Expenses are positive amounts, so the balance is the negated sum.
    ///
    /// Idempotent: the last recomputation wins.
    pub async fn recompute_account_balance(&self, account_id: Uuid) -> ResultEngine<i64> {
        with_tx!(self, |db_tx| {
            accounts::Entity::find_by_id(account_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("account not exists".to_string()))?;

            let amounts: Vec<i64> = entries::Entity::find()
                .select_only()
                .column(entries::Column::AmountMinor)
                .filter(entries::Column::AccountId.eq(account_id))
                .filter(entries::Column::Excluded.eq(false))
                .into_tuple()
                .all(&db_tx)
                .await?;
            let sum = amounts
                .into_iter()
                .try_fold(0i64, i64::checked_add)
                .ok_or_else(|| EngineError::InvalidAmount("balance overflow".to_string()))?;
            let balance_minor = sum
                .checked_neg()
                .ok_or_else(|| EngineError::InvalidAmount("balance overflow".to_string()))?;

            accounts::ActiveModel {
                id: ActiveValue::Set(account_id),
                balance_minor: ActiveValue::Set(balance_minor),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            Ok(balance_minor)
        })
    }
}
