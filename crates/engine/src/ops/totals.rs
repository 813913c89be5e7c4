//! Per-category income/expense totals net of confirmed offsets.
//!
//! The base set is every unexcluded entry of the family whose kind counts
//! towards totals and which is not the offset side of a confirmed link (its
//! amount is already netted against the expense it offsets). Each expense
//! is reduced by its confirmed offsets, each converted at the offset's own
//! date and currency. All arithmetic is done on `Decimal`.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use sea_orm::{
    FromQueryResult, JoinType, QueryFilter, QueryOrder, QuerySelect, prelude::*,
    sea_query::Query,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    Currency, EngineError, Money, OffsetStatus, ResultEngine, TransactionKind, accounts,
    categories, entries, families, offsets, transactions, util::model_currency,
};

use super::{
    Engine,
    offsets::{ConfirmedOffset, confirmed_offsets},
    rates::RateBook,
};

/// Upper bound of ids bound in a single `IN (...)` clause.
const ID_CHUNK: usize = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Income,
    Expense,
}

impl Classification {
    /// Negative amounts are income, everything else is expense.
    pub fn of(amount_minor: i64) -> Self {
        if amount_minor < 0 {
            Self::Income
        } else {
            Self::Expense
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TotalsRow {
    pub parent_category_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub classification: Classification,
    /// Always non-negative, in the target currency.
    pub total: Money,
    pub transactions_count: u64,
}

/// Which entries the totals cover.
///
/// `from` is inclusive and `to` is exclusive (`[from, to)`).
#[derive(Clone, Debug, Default)]
pub struct TotalsScope {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// If present, acts as an allow-list of accounts.
    pub account_ids: Option<Vec<Uuid>>,
    /// Defaults to the family currency.
    pub target_currency: Option<Currency>,
}

fn validate_scope(scope: &TotalsScope) -> ResultEngine<()> {
    if let (Some(from), Some(to)) = (scope.from, scope.to)
        && from >= to
    {
        return Err(EngineError::InvalidAmount(
            "invalid range: from must be < to".to_string(),
        ));
    }
    if scope.account_ids.as_ref().is_some_and(|ids| ids.is_empty()) {
        return Err(EngineError::InvalidAmount(
            "account_ids must not be empty".to_string(),
        ));
    }
    Ok(())
}

trait ApplyScope: QueryFilter + Sized {
    fn apply_scope(self, scope: &TotalsScope) -> Self;
}

impl<T> ApplyScope for T
where
    T: QueryFilter + Sized,
{
    fn apply_scope(mut self, scope: &TotalsScope) -> Self {
        if let Some(from) = scope.from {
            self = self.filter(entries::Column::Date.gte(from));
        }
        if let Some(to) = scope.to {
            self = self.filter(entries::Column::Date.lt(to));
        }
        if let Some(account_ids) = &scope.account_ids {
            self = self.filter(entries::Column::AccountId.is_in(account_ids.iter().copied()));
        }
        self
    }
}

#[derive(Debug, FromQueryResult)]
struct BaseRow {
    transaction_id: Uuid,
    category_id: Option<Uuid>,
    parent_category_id: Option<Uuid>,
    date: Date,
    amount_minor: i64,
    currency: String,
}

struct BaseEntry {
    transaction_id: Uuid,
    classification: Classification,
    category_id: Option<Uuid>,
    parent_category_id: Option<Uuid>,
    date: NaiveDate,
    amount: Money,
}

impl TryFrom<BaseRow> for BaseEntry {
    type Error = EngineError;

    fn try_from(row: BaseRow) -> Result<Self, Self::Error> {
        Ok(Self {
            transaction_id: row.transaction_id,
            classification: Classification::of(row.amount_minor),
            category_id: row.category_id,
            parent_category_id: row.parent_category_id,
            date: row.date,
            amount: Money::from_minor(row.amount_minor, model_currency(&row.currency)?),
        })
    }
}

/// Grouping key, ordered as the rows are returned.
type GroupKey = (Classification, Option<Uuid>, Option<Uuid>);

/// Sums converted, offset-deducted amounts per group.
fn group_totals(
    target: Currency,
    amounts: impl IntoIterator<Item = (GroupKey, Money)>,
) -> ResultEngine<Vec<TotalsRow>> {
    let mut groups: BTreeMap<GroupKey, (Money, u64)> = BTreeMap::new();
    for (key, amount) in amounts {
        let (sum, count) = groups.entry(key).or_insert((Money::zero(target), 0));
        *sum = sum.checked_add(amount)?;
        *count += 1;
    }

    Ok(groups
        .into_iter()
        .map(
            |((classification, parent_category_id, category_id), (sum, count))| TotalsRow {
                parent_category_id,
                category_id,
                classification,
                total: sum.abs(),
                transactions_count: count,
            },
        )
        .collect())
}

impl Engine {
    /// Per-category totals of a family in the target currency.
    ///
    /// Offset sides of confirmed links are left out of the base set, and
    /// their converted magnitude is deducted from the expense they offset.
    /// A missing exchange rate converts at 1:1 (logged as a warning).
    pub async fn compute_totals(
        &self,
        family_id: Uuid,
        scope: &TotalsScope,
    ) -> ResultEngine<Vec<TotalsRow>> {
        validate_scope(scope)?;
        let db = &self.database;

        let family = families::Entity::find_by_id(family_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("family not exists".to_string()))?;
        let target = match scope.target_currency {
            Some(currency) => currency,
            None => model_currency(&family.currency)?,
        };

        let consumed_offsets = Query::select()
            .column(offsets::Column::OffsetTransactionId)
            .from(offsets::Entity)
            .and_where(offsets::Column::Status.eq(OffsetStatus::Confirmed.as_str()))
            .to_owned();
        let excluded_kinds = TransactionKind::EXCLUDED_FROM_TOTALS.map(TransactionKind::as_str);

        let base: Vec<BaseEntry> = entries::Entity::find()
            .select_only()
            .column_as(entries::Column::TransactionId, "transaction_id")
            .column_as(transactions::Column::CategoryId, "category_id")
            .column_as(categories::Column::ParentId, "parent_category_id")
            .column_as(entries::Column::Date, "date")
            .column_as(entries::Column::AmountMinor, "amount_minor")
            .column_as(entries::Column::Currency, "currency")
            .join(JoinType::InnerJoin, entries::Relation::Accounts.def())
            .join(JoinType::InnerJoin, entries::Relation::Transactions.def())
            .join(JoinType::LeftJoin, transactions::Relation::Categories.def())
            .filter(accounts::Column::FamilyId.eq(family_id))
            .filter(transactions::Column::Kind.is_not_in(excluded_kinds))
            .filter(entries::Column::Excluded.eq(false))
            .filter(entries::Column::TransactionId.not_in_subquery(consumed_offsets))
            .apply_scope(scope)
            .order_by_asc(entries::Column::Date)
            .order_by_asc(entries::Column::TransactionId)
            .into_model::<BaseRow>()
            .all(db)
            .await?
            .into_iter()
            .map(BaseEntry::try_from)
            .collect::<ResultEngine<_>>()?;

        let expense_ids: Vec<Uuid> = base
            .iter()
            .filter(|entry| entry.amount.is_positive())
            .map(|entry| entry.transaction_id)
            .collect();
        let mut deductions: HashMap<Uuid, Vec<ConfirmedOffset>> = HashMap::new();
        for chunk in expense_ids.chunks(ID_CHUNK) {
            for offset in confirmed_offsets(db, chunk).await? {
                deductions
                    .entry(offset.expense_transaction_id)
                    .or_default()
                    .push(offset);
            }
        }

        let rate_keys = base
            .iter()
            .map(|entry| (entry.date, entry.amount.currency()))
            .chain(
                deductions
                    .values()
                    .flatten()
                    .map(|offset| (offset.date, offset.amount.currency())),
            );
        let book = RateBook::load(db, target, rate_keys).await?;

        let mut amounts = Vec::with_capacity(base.len());
        for entry in &base {
            let mut amount = entry
                .amount
                .convert(&book.rate(entry.date, entry.amount.currency()))?;
            for offset in deductions.get(&entry.transaction_id).into_iter().flatten() {
                let rate = book.rate(offset.date, offset.amount.currency());
                amount = amount.checked_sub(offset.amount.abs().convert(&rate)?)?;
            }
            let key = (
                entry.classification,
                entry.parent_category_id,
                entry.category_id,
            );
            amounts.push((key, amount));
        }

        let rows = group_totals(target, amounts)?;
        tracing::debug!(
            %family_id,
            target = target.code(),
            entries = base.len(),
            rows = rows.len(),
            "totals computed"
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn usd(minor: i64) -> Money {
        Money::from_minor(minor, Currency::USD)
    }

    #[test]
    fn classification_follows_sign() {
        assert_eq!(Classification::of(-1), Classification::Income);
        assert_eq!(Classification::of(0), Classification::Expense);
        assert_eq!(Classification::of(2_500), Classification::Expense);
    }

    #[test]
    fn groups_sum_then_take_magnitude() {
        let food = Some(Uuid::new_v4());
        let rows = group_totals(
            Currency::USD,
            [
                ((Classification::Expense, None, food), usd(100_00)),
                ((Classification::Expense, None, food), usd(-20_00)),
                ((Classification::Income, None, None), usd(-40_00)),
            ],
        )
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].classification, Classification::Income);
        assert_eq!(rows[0].total.amount(), Decimal::new(40_00, 2));
        assert_eq!(rows[1].category_id, food);
        assert_eq!(rows[1].total.amount(), Decimal::new(80_00, 2));
        assert_eq!(rows[1].transactions_count, 2);
    }

    #[test]
    fn groups_reject_foreign_amounts() {
        let result = group_totals(
            Currency::USD,
            [(
                (Classification::Expense, None, None),
                Money::from_minor(1_00, Currency::EUR),
            )],
        );
        assert!(matches!(result, Err(EngineError::CurrencyMismatch(_))));
    }

    #[test]
    fn scope_rejects_empty_ranges_and_accounts() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let scope = TotalsScope {
            from: Some(day),
            to: Some(day),
            ..TotalsScope::default()
        };
        assert!(validate_scope(&scope).is_err());

        let scope = TotalsScope {
            account_ids: Some(Vec::new()),
            ..TotalsScope::default()
        };
        assert!(validate_scope(&scope).is_err());
        assert!(validate_scope(&TotalsScope::default()).is_ok());
    }
}
