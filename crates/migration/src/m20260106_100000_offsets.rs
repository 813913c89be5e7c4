//! Offset links and the rejection ledger.
//!
//! - `offsets`: an expense transaction backed by one refund/cashback
//!   transaction. A refund can back a single expense, so
//!   `offset_transaction_id` is unique on its own.
//! - `rejected_offsets`: pairs the user declined; never suggested again.
//!
//! Both tables cascade with either referenced transaction.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Offsets {
    Table,
    Id,
    ExpenseTransactionId,
    OffsetTransactionId,
    Status,
    Notes,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum RejectedOffsets {
    Table,
    Id,
    ExpenseTransactionId,
    OffsetTransactionId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Offsets::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Offsets::Id).blob().not_null().primary_key())
                    .col(
                        ColumnDef::new(Offsets::ExpenseTransactionId)
                            .blob()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Offsets::OffsetTransactionId)
                            .blob()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Offsets::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Offsets::Notes).text())
                    .col(ColumnDef::new(Offsets::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Offsets::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-offsets-expense_transaction_id")
                            .from(Offsets::Table, Offsets::ExpenseTransactionId)
                            .to(Transactions::Table, Transactions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-offsets-offset_transaction_id")
                            .from(Offsets::Table, Offsets::OffsetTransactionId)
                            .to(Transactions::Table, Transactions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-offsets-expense-offset-unique")
                    .table(Offsets::Table)
                    .col(Offsets::ExpenseTransactionId)
                    .col(Offsets::OffsetTransactionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-offsets-offset_transaction_id-unique")
                    .table(Offsets::Table)
                    .col(Offsets::OffsetTransactionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-offsets-status")
                    .table(Offsets::Table)
                    .col(Offsets::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RejectedOffsets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RejectedOffsets::Id)
                            .blob()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RejectedOffsets::ExpenseTransactionId)
                            .blob()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RejectedOffsets::OffsetTransactionId)
                            .blob()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RejectedOffsets::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RejectedOffsets::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-rejected_offsets-expense_transaction_id")
                            .from(RejectedOffsets::Table, RejectedOffsets::ExpenseTransactionId)
                            .to(Transactions::Table, Transactions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-rejected_offsets-offset_transaction_id")
                            .from(RejectedOffsets::Table, RejectedOffsets::OffsetTransactionId)
                            .to(Transactions::Table, Transactions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-rejected_offsets-expense-offset-unique")
                    .table(RejectedOffsets::Table)
                    .col(RejectedOffsets::ExpenseTransactionId)
                    .col(RejectedOffsets::OffsetTransactionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RejectedOffsets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Offsets::Table).to_owned())
            .await?;
        Ok(())
    }
}
