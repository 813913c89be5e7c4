//! Transaction primitives.
//!
//! A transaction carries the *kind* and *category* of a money movement; its
//! dated, signed amount lives on the matching row in `entries`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Standard,
    Transfer,
    FundsMovement,
    OneTime,
    CcPayment,
    LoanPayment,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Transfer => "transfer",
            Self::FundsMovement => "funds_movement",
            Self::OneTime => "one_time",
            Self::CcPayment => "cc_payment",
            Self::LoanPayment => "loan_payment",
        }
    }

    /// Kinds left out of income/expense totals.
    pub const EXCLUDED_FROM_TOTALS: [TransactionKind; 3] =
        [Self::FundsMovement, Self::OneTime, Self::CcPayment];
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "standard" => Ok(Self::Standard),
            "transfer" => Ok(Self::Transfer),
            "funds_movement" => Ok(Self::FundsMovement),
            "one_time" => Ok(Self::OneTime),
            "cc_payment" => Ok(Self::CcPayment),
            "loan_payment" => Ok(Self::LoanPayment),
            other => Err(EngineError::InvalidStatus(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub kind: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Categories,
    #[sea_orm(has_one = "super::entries::Entity")]
    Entry,
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Categories.def()
    }
}

impl Related<super::entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
