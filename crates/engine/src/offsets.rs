//! Offset links.
//!
//! An [`OffsetLink`] ties one expense transaction to one refund / cashback /
//! partial repayment transaction, so reports can show net spend. An expense
//! can be backed by several offsets; an offset backs exactly one expense.
//!
//! A link is stored as `pending` or `confirmed`. Rejection is not a status:
//! a rejected link is deleted and its pair is written to the rejection ledger
//! (see [`RejectedOffset`](crate::RejectedOffset)). [`OffsetOutcome`] models
//! the three outcomes explicitly.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, RejectedOffset};

/// Maximum distance in days between the two entries of a pending link.
pub const PENDING_MAX_DAYS: i64 = 30;
/// Maximum distance in days between the two entries of a confirmed link.
pub const CONFIRMED_MAX_DAYS: i64 = 365;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetStatus {
    Pending,
    Confirmed,
}

impl OffsetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
        }
    }

    /// Date proximity allowed between expense and offset in this status.
    pub fn max_date_distance_days(self) -> i64 {
        match self {
            Self::Pending => PENDING_MAX_DAYS,
            Self::Confirmed => CONFIRMED_MAX_DAYS,
        }
    }
}

impl TryFrom<&str> for OffsetStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            other => Err(EngineError::InvalidStatus(format!(
                "invalid offset status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetLink {
    pub id: Uuid,
    pub expense_transaction_id: Uuid,
    pub offset_transaction_id: Uuid,
    pub status: OffsetStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OffsetLink {
    pub(crate) fn new(
        expense_transaction_id: Uuid,
        offset_transaction_id: Uuid,
        status: OffsetStatus,
        notes: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            expense_transaction_id,
            offset_transaction_id,
            status,
            notes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == OffsetStatus::Confirmed
    }

    pub fn outcome(self) -> OffsetOutcome {
        match self.status {
            OffsetStatus::Pending => OffsetOutcome::Pending(self),
            OffsetStatus::Confirmed => OffsetOutcome::Confirmed(self),
        }
    }
}

/// Result of a lifecycle decision on a link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OffsetOutcome {
    Pending(OffsetLink),
    Confirmed(OffsetLink),
    /// The link is gone; the pair is suppressed by this ledger entry.
    Rejected(RejectedOffset),
}

impl OffsetOutcome {
    /// The surviving link, if the outcome is not a rejection.
    pub fn link(&self) -> Option<&OffsetLink> {
        match self {
            Self::Pending(link) | Self::Confirmed(link) => Some(link),
            Self::Rejected(_) => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// A link together with the amounts of both sides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OffsetDetail {
    pub link: OffsetLink,
    /// Absolute expense amount.
    pub expense_amount: Money,
    /// Absolute offset amount.
    pub offset_amount: Money,
    /// Expense amount minus this offset alone.
    pub net_amount: Money,
    /// Category of the expense side.
    pub category_id: Option<Uuid>,
    /// Date of the expense side.
    pub date: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "offsets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub expense_transaction_id: Uuid,
    pub offset_transaction_id: Uuid,
    pub status: String,
    pub notes: Option<String>,
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
        from = "Column::ExpenseTransactionId",
        to = "super::entries::Column::TransactionId",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    ExpenseEntry,
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

impl From<&OffsetLink> for ActiveModel {
    fn from(link: &OffsetLink) -> Self {
        Self {
            id: ActiveValue::Set(link.id),
            expense_transaction_id: ActiveValue::Set(link.expense_transaction_id),
            offset_transaction_id: ActiveValue::Set(link.offset_transaction_id),
            status: ActiveValue::Set(link.status.as_str().to_string()),
            notes: ActiveValue::Set(link.notes.clone()),
            created_at: ActiveValue::Set(link.created_at),
            updated_at: ActiveValue::Set(link.updated_at),
        }
    }
}

impl TryFrom<Model> for OffsetLink {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            expense_transaction_id: model.expense_transaction_id,
            offset_transaction_id: model.offset_transaction_id,
            status: OffsetStatus::try_from(model.status.as_str())?,
            notes: model.notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
