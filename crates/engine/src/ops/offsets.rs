use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveValue, ConnectionTrait, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    Currency, EngineError, Money, OffsetDetail, OffsetLink, OffsetOutcome, OffsetStatus,
    RejectedOffset, ResultEngine, accounts, entries,
    ledger::{self, TransactionSnapshot},
    offsets,
    util::{conflict_or_db, model_currency, normalize_optional_text},
    validation::{ExistingLinks, validate_link},
};

use super::{Engine, LinkAccounts, rates::RateBook, rejections::record_rejection, with_tx};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateOffsetCmd {
    pub expense_transaction_id: Uuid,
    pub offset_transaction_id: Uuid,
    pub status: OffsetStatus,
    pub notes: Option<String>,
}

impl CreateOffsetCmd {
    pub fn new(
        expense_transaction_id: Uuid,
        offset_transaction_id: Uuid,
        status: OffsetStatus,
    ) -> Self {
        Self {
            expense_transaction_id,
            offset_transaction_id,
            status,
            notes: None,
        }
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Decision taken on a link through [`Engine::update_offset`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OffsetDecision {
    /// Leave the status as it is.
    Pending,
    Confirm,
    Reject,
}

impl TryFrom<&str> for OffsetDecision {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "confirm" | "confirmed" => Ok(Self::Confirm),
            "reject" | "rejected" => Ok(Self::Reject),
            other => Err(EngineError::InvalidStatus(format!(
                "invalid offset decision: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateOffsetCmd {
    pub decision: Option<OffsetDecision>,
    /// Ignored when blank or when the link is rejected.
    pub notes: Option<String>,
}

/// A confirmed offset entry, keyed by the expense it offsets.
#[derive(Clone, Copy, Debug)]
pub(super) struct ConfirmedOffset {
    pub expense_transaction_id: Uuid,
    pub date: NaiveDate,
    pub amount: Money,
}

/// Confirmed offsets backing any of `expense_ids`.
pub(super) async fn confirmed_offsets<C: ConnectionTrait>(
    db: &C,
    expense_ids: &[Uuid],
) -> ResultEngine<Vec<ConfirmedOffset>> {
    let rows: Vec<(Uuid, Date, i64, String)> = offsets::Entity::find()
        .select_only()
        .column(offsets::Column::ExpenseTransactionId)
        .column(entries::Column::Date)
        .column(entries::Column::AmountMinor)
        .column(entries::Column::Currency)
        .join(JoinType::InnerJoin, offsets::Relation::OffsetEntry.def())
        .filter(offsets::Column::Status.eq(OffsetStatus::Confirmed.as_str()))
        .filter(offsets::Column::ExpenseTransactionId.is_in(expense_ids.iter().copied()))
        .order_by_asc(entries::Column::Date)
        .into_tuple()
        .all(db)
        .await?;

    rows.into_iter()
        .map(|(expense_transaction_id, date, amount_minor, currency)| {
            Ok(ConfirmedOffset {
                expense_transaction_id,
                date,
                amount: Money::from_minor(amount_minor, model_currency(&currency)?),
            })
        })
        .collect()
}

/// Sum of the absolute offsets, each converted to `target` at its own date.
fn convert_and_sum(
    offsets: &[ConfirmedOffset],
    book: &RateBook,
    target: Currency,
) -> ResultEngine<Money> {
    offsets.iter().try_fold(Money::zero(target), |total, offset| {
        let rate = book.rate(offset.date, offset.amount.currency());
        total.checked_add(offset.amount.abs().convert(&rate)?)
    })
}

async fn existing_links<C: ConnectionTrait>(
    db: &C,
    expense_transaction_id: Uuid,
    offset_transaction_id: Uuid,
    skip_link: Option<Uuid>,
) -> ResultEngine<ExistingLinks> {
    let others = || {
        let select = offsets::Entity::find();
        match skip_link {
            Some(id) => select.filter(offsets::Column::Id.ne(id)),
            None => select,
        }
    };
    let pair_linked = others()
        .filter(offsets::Column::ExpenseTransactionId.eq(expense_transaction_id))
        .filter(offsets::Column::OffsetTransactionId.eq(offset_transaction_id))
        .count(db)
        .await?
        > 0;
    let offset_used = others()
        .filter(offsets::Column::OffsetTransactionId.eq(offset_transaction_id))
        .filter(offsets::Column::ExpenseTransactionId.ne(expense_transaction_id))
        .count(db)
        .await?
        > 0;
    Ok(ExistingLinks {
        pair_linked,
        offset_used,
    })
}

/// A link whose expense side belongs to `family_id`.
async fn require_family_link<C: ConnectionTrait>(
    db: &C,
    family_id: Uuid,
    offset_id: Uuid,
) -> ResultEngine<OffsetLink> {
    offsets::Entity::find_by_id(offset_id)
        .join(JoinType::InnerJoin, offsets::Relation::ExpenseEntry.def())
        .join(JoinType::InnerJoin, entries::Relation::Accounts.def())
        .filter(accounts::Column::FamilyId.eq(family_id))
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound("offset not exists".to_string()))?
        .try_into()
}

async fn link_sides<C: ConnectionTrait>(
    db: &C,
    link: &OffsetLink,
) -> ResultEngine<(TransactionSnapshot, TransactionSnapshot)> {
    let expense = ledger::require_snapshot(db, link.expense_transaction_id).await?;
    let offset = ledger::require_snapshot(db, link.offset_transaction_id).await?;
    Ok((expense, offset))
}

async fn confirm_link<C: ConnectionTrait>(
    db: &C,
    mut link: OffsetLink,
) -> ResultEngine<(OffsetLink, LinkAccounts)> {
    let (expense, offset) = link_sides(db, &link).await?;
    let existing = existing_links(
        db,
        link.expense_transaction_id,
        link.offset_transaction_id,
        Some(link.id),
    )
    .await?;
    let violations = validate_link(&expense, &offset, OffsetStatus::Confirmed, existing);
    if !violations.is_empty() {
        return Err(EngineError::Validation(violations));
    }

    if !link.is_confirmed() {
        link.status = OffsetStatus::Confirmed;
        link.updated_at = Utc::now();
        offsets::ActiveModel {
            id: ActiveValue::Set(link.id),
            status: ActiveValue::Set(link.status.as_str().to_string()),
            updated_at: ActiveValue::Set(link.updated_at),
            ..Default::default()
        }
        .update(db)
        .await?;
    }
    Ok((link, LinkAccounts::of(&expense, &offset)))
}

async fn reject_link<C: ConnectionTrait>(
    db: &C,
    link: OffsetLink,
) -> ResultEngine<(RejectedOffset, LinkAccounts)> {
    let (expense, offset) = link_sides(db, &link).await?;
    let rejected = record_rejection(db, link.expense_transaction_id, link.offset_transaction_id)
        .await?;
    offsets::Entity::delete_by_id(link.id).exec(db).await?;
    Ok((rejected, LinkAccounts::of(&expense, &offset)))
}

async fn set_notes<C: ConnectionTrait>(
    db: &C,
    link: &mut OffsetLink,
    notes: Option<String>,
) -> ResultEngine<()> {
    link.notes = notes;
    link.updated_at = Utc::now();
    offsets::ActiveModel {
        id: ActiveValue::Set(link.id),
        notes: ActiveValue::Set(link.notes.clone()),
        updated_at: ActiveValue::Set(link.updated_at),
        ..Default::default()
    }
    .update(db)
    .await?;
    Ok(())
}

impl Engine {
    /// Links an expense to an offset transaction.
    ///
    /// The expense must belong to `family_id`. Every invariant is checked in
    /// one pass and all violations are reported together. A concurrent link
    /// of the same offset transaction surfaces as [`EngineError::Conflict`].
    pub async fn create_offset(
        &self,
        family_id: Uuid,
        cmd: CreateOffsetCmd,
    ) -> ResultEngine<OffsetLink> {
        let (link, accounts) = with_tx!(self, |db_tx| {
            let expense =
                ledger::require_family_snapshot(&db_tx, family_id, cmd.expense_transaction_id)
                    .await?;
            let offset = ledger::require_snapshot(&db_tx, cmd.offset_transaction_id).await?;
            let existing = existing_links(
                &db_tx,
                cmd.expense_transaction_id,
                cmd.offset_transaction_id,
                None,
            )
            .await?;
            let violations = validate_link(&expense, &offset, cmd.status, existing);
            if !violations.is_empty() {
                return Err(EngineError::Validation(violations));
            }

            let link = OffsetLink::new(
                cmd.expense_transaction_id,
                cmd.offset_transaction_id,
                cmd.status,
                normalize_optional_text(cmd.notes.as_deref()),
            );
            offsets::ActiveModel::from(&link)
                .insert(&db_tx)
                .await
                .map_err(|err| conflict_or_db(err, "offset transaction is already linked"))?;
            Ok((link, LinkAccounts::of(&expense, &offset)))
        })?;

        self.schedule_resync(accounts);
        tracing::info!(
            %family_id,
            offset_id = %link.id,
            expense = %link.expense_transaction_id,
            offset = %link.offset_transaction_id,
            status = link.status.as_str(),
            "offset created"
        );
        Ok(link)
    }

    /// Links two transactions of the family as a confirmed offset.
    ///
    /// The sign of `anchor_transaction_id` decides the direction: a positive
    /// anchor is the expense and `matched_transaction_id` its offset,
    /// otherwise the anchor is the offset.
    pub async fn link_match(
        &self,
        family_id: Uuid,
        anchor_transaction_id: Uuid,
        matched_transaction_id: Uuid,
    ) -> ResultEngine<OffsetLink> {
        let anchor =
            ledger::require_family_snapshot(&self.database, family_id, anchor_transaction_id)
                .await?;
        let (expense, offset) = if anchor.is_expense() {
            (anchor_transaction_id, matched_transaction_id)
        } else {
            (matched_transaction_id, anchor_transaction_id)
        };
        self.create_offset(
            family_id,
            CreateOffsetCmd::new(expense, offset, OffsetStatus::Confirmed),
        )
        .await
    }

    /// Return an [`OffsetLink`] of the family.
    pub async fn offset(&self, family_id: Uuid, offset_id: Uuid) -> ResultEngine<OffsetLink> {
        require_family_link(&self.database, family_id, offset_id).await
    }

    /// Links whose expense belongs to the family, oldest first.
    pub async fn list_offsets(&self, family_id: Uuid) -> ResultEngine<Vec<OffsetLink>> {
        offsets::Entity::find()
            .join(JoinType::InnerJoin, offsets::Relation::ExpenseEntry.def())
            .join(JoinType::InnerJoin, entries::Relation::Accounts.def())
            .filter(accounts::Column::FamilyId.eq(family_id))
            .order_by_asc(offsets::Column::CreatedAt)
            .order_by_asc(offsets::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(OffsetLink::try_from)
            .collect()
    }

    /// Moves a link to `confirmed`, checking it again under the confirmed
    /// date bound. Confirming a confirmed link is a no-op.
    pub async fn confirm_offset(
        &self,
        family_id: Uuid,
        link: &OffsetLink,
    ) -> ResultEngine<OffsetLink> {
        let (link, accounts) = with_tx!(self, |db_tx| {
            let current = require_family_link(&db_tx, family_id, link.id).await?;
            confirm_link(&db_tx, current).await
        })?;

        self.schedule_resync(accounts);
        tracing::info!(%family_id, offset_id = %link.id, "offset confirmed");
        Ok(link)
    }

    /// Replaces the link with a rejection ledger entry for the same pair.
    ///
    /// The link is consumed: once rejected it no longer exists.
    pub async fn reject_offset(
        &self,
        family_id: Uuid,
        link: OffsetLink,
    ) -> ResultEngine<RejectedOffset> {
        let (rejected, accounts) = with_tx!(self, |db_tx| {
            let current = require_family_link(&db_tx, family_id, link.id).await?;
            reject_link(&db_tx, current).await
        })?;

        self.schedule_resync(accounts);
        tracing::info!(%family_id, offset_id = %link.id, "offset rejected");
        Ok(rejected)
    }

    /// Applies a decision and new notes to a link in one DB transaction.
    pub async fn update_offset(
        &self,
        family_id: Uuid,
        offset_id: Uuid,
        cmd: UpdateOffsetCmd,
    ) -> ResultEngine<OffsetOutcome> {
        let (outcome, accounts) = with_tx!(self, |db_tx| {
            let link = require_family_link(&db_tx, family_id, offset_id).await?;
            match cmd.decision {
                Some(OffsetDecision::Reject) => {
                    let (rejected, accounts) = reject_link(&db_tx, link).await?;
                    Ok((OffsetOutcome::Rejected(rejected), Some(accounts)))
                }
                decision => {
                    let (mut link, accounts) = if decision == Some(OffsetDecision::Confirm) {
                        let (link, accounts) = confirm_link(&db_tx, link).await?;
                        (link, Some(accounts))
                    } else {
                        (link, None)
                    };
                    if let Some(notes) = normalize_optional_text(cmd.notes.as_deref()) {
                        set_notes(&db_tx, &mut link, Some(notes)).await?;
                    }
                    Ok((link.outcome(), accounts))
                }
            }
        })?;

        if let Some(accounts) = accounts {
            self.schedule_resync(accounts);
        }
        tracing::info!(
            %family_id,
            %offset_id,
            rejected = outcome.is_rejected(),
            "offset updated"
        );
        Ok(outcome)
    }

    /// Replaces the notes of a link; blank notes clear them.
    pub async fn update_offset_notes(
        &self,
        family_id: Uuid,
        offset_id: Uuid,
        notes: Option<&str>,
    ) -> ResultEngine<OffsetLink> {
        with_tx!(self, |db_tx| {
            let mut link = require_family_link(&db_tx, family_id, offset_id).await?;
            set_notes(&db_tx, &mut link, normalize_optional_text(notes)).await?;
            Ok(link)
        })
    }

    /// Unlinks without recording a rejection: the pair may be suggested again.
    pub async fn delete_offset(&self, family_id: Uuid, offset_id: Uuid) -> ResultEngine<()> {
        let accounts = with_tx!(self, |db_tx| {
            let link = require_family_link(&db_tx, family_id, offset_id).await?;
            let (expense, offset) = link_sides(&db_tx, &link).await?;
            offsets::Entity::delete_by_id(link.id).exec(&db_tx).await?;
            Ok(LinkAccounts::of(&expense, &offset))
        })?;

        self.schedule_resync(accounts);
        tracing::info!(%family_id, %offset_id, "offset deleted");
        Ok(())
    }

    /// A link with the amounts of both sides. A cross-currency offset is
    /// converted to the expense currency at the offset date.
    pub async fn offset_detail(
        &self,
        family_id: Uuid,
        offset_id: Uuid,
    ) -> ResultEngine<OffsetDetail> {
        let link = require_family_link(&self.database, family_id, offset_id).await?;
        let (expense, offset) = link_sides(&self.database, &link).await?;

        let expense_amount = expense.money().abs();
        let offset_amount = offset.money().abs();
        let book = RateBook::load(
            &self.database,
            expense.currency,
            [(offset.date, offset.currency)],
        )
        .await?;
        let converted = offset_amount.convert(&book.rate(offset.date, offset.currency))?;

        Ok(OffsetDetail {
            net_amount: expense_amount.checked_sub(converted)?,
            expense_amount,
            offset_amount,
            category_id: expense.category_id,
            date: expense.date,
            link,
        })
    }

    /// Sum of the confirmed offsets of an expense, in the expense currency.
    ///
    /// Zero for a transaction that is not an expense.
    pub async fn total_offset_amount(
        &self,
        family_id: Uuid,
        transaction_id: Uuid,
    ) -> ResultEngine<Money> {
        let expense =
            ledger::require_family_snapshot(&self.database, family_id, transaction_id).await?;
        self.total_offsets_of(&expense).await
    }

    /// Expense amount minus its confirmed offsets. A transaction that is not
    /// an expense is returned unchanged.
    pub async fn net_expense_amount(
        &self,
        family_id: Uuid,
        transaction_id: Uuid,
    ) -> ResultEngine<Money> {
        let expense =
            ledger::require_family_snapshot(&self.database, family_id, transaction_id).await?;
        let offsets = self.total_offsets_of(&expense).await?;
        expense.money().checked_sub(offsets)
    }

    /// Whether the transaction is the expense side of a confirmed link.
    pub async fn has_offsets(&self, family_id: Uuid, transaction_id: Uuid) -> ResultEngine<bool> {
        ledger::require_family_snapshot(&self.database, family_id, transaction_id).await?;
        self.count_confirmed(offsets::Column::ExpenseTransactionId, transaction_id)
            .await
            .map(|count| count > 0)
    }

    /// Whether the transaction is the offset side of a confirmed link.
    pub async fn is_offset(&self, family_id: Uuid, transaction_id: Uuid) -> ResultEngine<bool> {
        ledger::require_family_snapshot(&self.database, family_id, transaction_id).await?;
        self.count_confirmed(offsets::Column::OffsetTransactionId, transaction_id)
            .await
            .map(|count| count > 0)
    }

    async fn count_confirmed(
        &self,
        side: offsets::Column,
        transaction_id: Uuid,
    ) -> ResultEngine<u64> {
        Ok(offsets::Entity::find()
            .filter(side.eq(transaction_id))
            .filter(offsets::Column::Status.eq(OffsetStatus::Confirmed.as_str()))
            .count(&self.database)
            .await?)
    }

    async fn total_offsets_of(&self, expense: &TransactionSnapshot) -> ResultEngine<Money> {
        if !expense.is_expense() {
            return Ok(Money::zero(expense.currency));
        }
        let offsets = confirmed_offsets(&self.database, &[expense.transaction_id]).await?;
        let book = RateBook::load(
            &self.database,
            expense.currency,
            offsets
                .iter()
                .map(|offset| (offset.date, offset.amount.currency())),
        )
        .await?;
        convert_and_sum(&offsets, &book, expense.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decisions_parse_both_verb_and_status() {
        assert_eq!(
            OffsetDecision::try_from("confirmed").unwrap(),
            OffsetDecision::Confirm
        );
        assert_eq!(
            OffsetDecision::try_from("reject").unwrap(),
            OffsetDecision::Reject
        );
        assert!(matches!(
            OffsetDecision::try_from("approved"),
            Err(EngineError::InvalidStatus(_))
        ));
    }

    #[test]
    fn create_cmd_defaults_to_no_notes() {
        let cmd = CreateOffsetCmd::new(Uuid::nil(), Uuid::nil(), OffsetStatus::Pending);
        assert_eq!(cmd.notes, None);
        assert_eq!(cmd.notes("refund").notes.as_deref(), Some("refund"));
    }
}
