//! Daily exchange rates, keyed by `(date, from_currency, to_currency)`.
//!
//! The rate is stored as decimal text and parsed into `rust_decimal::Decimal`
//! so conversions stay exact.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "exchange_rates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub date: Date,
    pub from_currency: String,
    pub to_currency: String,
    pub rate: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
