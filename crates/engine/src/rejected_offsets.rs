//! Rejection ledger.
//!
//! A [`RejectedOffset`] permanently suppresses one (expense, offset) pair from
//! candidate suggestions. Rows are only ever created; they disappear with
//! either referenced transaction.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedOffset {
    pub id: Uuid,
    pub expense_transaction_id: Uuid,
    pub offset_transaction_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl RejectedOffset {
    pub(crate) fn new(expense_transaction_id: Uuid, offset_transaction_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            expense_transaction_id,
            offset_transaction_id,
            created_at: Utc::now(),
        }
    }

    pub fn pair(&self) -> (Uuid, Uuid) {
        (self.expense_transaction_id, self.offset_transaction_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "rejected_offsets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub expense_transaction_id: Uuid,
    pub offset_transaction_id: Uuid,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::ExpenseTransactionId",
        to = "super::transactions::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ExpenseTransaction,
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::OffsetTransactionId",
        to = "super::transactions::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    OffsetTransaction,
    #[sea_orm(
        belongs_to = "super::entries::Entity",
        from = "Column::OffsetTransactionId",
        to = "super::entries::Column::TransactionId",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    OffsetEntry,
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&RejectedOffset> for ActiveModel {
    fn from(rejected: &RejectedOffset) -> Self {
        Self {
            id: ActiveValue::Set(rejected.id),
            expense_transaction_id: ActiveValue::Set(rejected.expense_transaction_id),
            offset_transaction_id: ActiveValue::Set(rejected.offset_transaction_id),
            created_at: ActiveValue::Set(rejected.created_at),
            updated_at: ActiveValue::Set(rejected.created_at),
        }
    }
}

impl From<Model> for RejectedOffset {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            expense_transaction_id: model.expense_transaction_id,
            offset_transaction_id: model.offset_transaction_id,
            created_at: model.created_at,
        }
    }
}
