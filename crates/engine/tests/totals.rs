use rust_decimal::Decimal;

use engine::{
    AccountStatus, Classification, CreateOffsetCmd, Currency, EngineError, Money, OffsetStatus,
    RateSource, TotalsRow, TotalsScope, TransactionKind,
};
use uuid::Uuid;

mod common;

use common::{Tx, day, insert_account, insert_category, insert_family, insert_rate};

fn usd(minor: i64) -> Money {
    Money::from_minor(minor, Currency::USD)
}

fn row(
    rows: &[TotalsRow],
    classification: Classification,
    category_id: Option<Uuid>,
) -> &TotalsRow {
    rows.iter()
        .find(|row| row.classification == classification && row.category_id == category_id)
        .unwrap_or_else(|| panic!("no {classification:?} row for {category_id:?} in {rows:?}"))
}

#[tokio::test]
async fn consumed_refund_reduces_expense_instead_of_counting_as_income() {
    let l = common::ledger().await;
    let shopping = insert_category(&l.db, l.family_id, None).await;
    let expense = Tx::new(l.account_id, 10_000, day(0))
        .category(shopping)
        .insert(&l.db)
        .await;
    let refund = Tx::new(l.account_id, -3_000, day(4))
        .category(shopping)
        .insert(&l.db)
        .await;
    Tx::new(l.account_id, -250_000, day(1)).insert(&l.db).await;

    l.engine
        .create_offset(
            l.family_id,
            CreateOffsetCmd::new(expense, refund, OffsetStatus::Confirmed),
        )
        .await
        .unwrap();

    let rows = l
        .engine
        .compute_totals(l.family_id, &TotalsScope::default())
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    let spent = row(&rows, Classification::Expense, Some(shopping));
    assert_eq!(spent.total, usd(7_000));
    assert_eq!(spent.transactions_count, 1);
    let income = row(&rows, Classification::Income, None);
    assert_eq!(income.total, usd(250_000));
    assert_eq!(income.transactions_count, 1);
}

#[tokio::test]
async fn pending_links_do_not_net() {
    let l = common::ledger().await;
    let expense = Tx::new(l.account_id, 10_000, day(0)).insert(&l.db).await;
    let refund = Tx::new(l.account_id, -3_000, day(4)).insert(&l.db).await;
    l.engine
        .create_offset(
            l.family_id,
            CreateOffsetCmd::new(expense, refund, OffsetStatus::Pending),
        )
        .await
        .unwrap();

    let rows = l
        .engine
        .compute_totals(l.family_id, &TotalsScope::default())
        .await
        .unwrap();

    assert_eq!(row(&rows, Classification::Expense, None).total, usd(10_000));
    assert_eq!(row(&rows, Classification::Income, None).total, usd(3_000));
}

#[tokio::test]
async fn skips_excluded_entries_and_kinds() {
    let l = common::ledger().await;
    Tx::new(l.account_id, 1_000, day(0)).insert(&l.db).await;
    Tx::new(l.account_id, 2_000, day(0))
        .kind(TransactionKind::Transfer)
        .insert(&l.db)
        .await;
    for kind in [
        TransactionKind::FundsMovement,
        TransactionKind::OneTime,
        TransactionKind::CcPayment,
    ] {
        Tx::new(l.account_id, 50_000, day(0))
            .kind(kind)
            .insert(&l.db)
            .await;
    }
    Tx::new(l.account_id, 70_000, day(0))
        .excluded()
        .insert(&l.db)
        .await;

    let rows = l
        .engine
        .compute_totals(l.family_id, &TotalsScope::default())
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].total, usd(3_000));
    assert_eq!(rows[0].transactions_count, 2);
}

#[tokio::test]
async fn missing_rate_converts_one_to_one() {
    let l = common::ledger().await;
    let eur_account = insert_account(&l.db, l.family_id, "EUR", AccountStatus::Active).await;
    Tx::new(eur_account, 10_000, day(0))
        .currency("EUR")
        .insert(&l.db)
        .await;

    let rows = l
        .engine
        .compute_totals(l.family_id, &TotalsScope::default())
        .await
        .unwrap();
    assert_eq!(rows[0].total, usd(10_000));

    let rate = l
        .engine
        .rate_for(day(0), Currency::EUR, Currency::USD)
        .await
        .unwrap();
    assert_eq!(rate.value(), Decimal::ONE);
    assert_eq!(rate.source(), RateSource::Missing);
    assert!(rate.is_configuration_gap());
}

#[tokio::test]
async fn stored_rates_convert_each_entry_at_its_own_date() {
    let l = common::ledger().await;
    let eur_account = insert_account(&l.db, l.family_id, "EUR", AccountStatus::Active).await;
    insert_rate(&l.db, day(0), "EUR", "USD", "1.10").await;
    insert_rate(&l.db, day(3), "EUR", "USD", "1.20").await;
    insert_rate(&l.db, day(0), "USD", "EUR", "1").await;

    let expense = Tx::new(eur_account, 10_000, day(0))
        .currency("EUR")
        .insert(&l.db)
        .await;
    let refund = Tx::new(eur_account, -5_000, day(3))
        .currency("EUR")
        .insert(&l.db)
        .await;
    l.engine
        .create_offset(
            l.family_id,
            CreateOffsetCmd::new(expense, refund, OffsetStatus::Confirmed),
        )
        .await
        .unwrap();

    let rows = l
        .engine
        .compute_totals(l.family_id, &TotalsScope::default())
        .await
        .unwrap();

    // 100 EUR × 1.10 − 50 EUR × 1.20
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].total, usd(5_000));
    assert_eq!(rows[0].transactions_count, 1);

    let stored_one = l
        .engine
        .rate_for(day(0), Currency::USD, Currency::EUR)
        .await
        .unwrap();
    assert_eq!(stored_one.value(), Decimal::ONE);
    assert_eq!(stored_one.source(), RateSource::Stored);
    assert!(!stored_one.is_configuration_gap());
}

#[tokio::test]
async fn totals_report_parent_categories_and_honor_scope() {
    let l = common::ledger().await;
    let home = insert_category(&l.db, l.family_id, None).await;
    let rent = insert_category(&l.db, l.family_id, Some(home)).await;
    let second_account = insert_account(&l.db, l.family_id, "USD", AccountStatus::Active).await;
    Tx::new(l.account_id, 120_000, day(0))
        .category(rent)
        .insert(&l.db)
        .await;
    Tx::new(l.account_id, 120_000, day(31))
        .category(rent)
        .insert(&l.db)
        .await;
    Tx::new(second_account, 5_000, day(1))
        .category(rent)
        .insert(&l.db)
        .await;

    let january = TotalsScope {
        from: Some(day(0)),
        to: Some(day(31)),
        ..TotalsScope::default()
    };
    let rows = l.engine.compute_totals(l.family_id, &january).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].parent_category_id, Some(home));
    assert_eq!(rows[0].category_id, Some(rent));
    assert_eq!(rows[0].total, usd(125_000));
    assert_eq!(rows[0].transactions_count, 2);

    let one_account = TotalsScope {
        account_ids: Some(vec![second_account]),
        target_currency: Some(Currency::USD),
        ..TotalsScope::default()
    };
    let rows = l
        .engine
        .compute_totals(l.family_id, &one_account)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].total, usd(5_000));
}

#[tokio::test]
async fn totals_never_mix_families() {
    let l = common::ledger().await;
    let stranger = insert_family(&l.db, "USD").await;
    let stranger_account = insert_account(&l.db, stranger, "USD", AccountStatus::Active).await;
    Tx::new(stranger_account, 9_000, day(0)).insert(&l.db).await;

    assert!(
        l.engine
            .compute_totals(l.family_id, &TotalsScope::default())
            .await
            .unwrap()
            .is_empty()
    );
    assert!(matches!(
        l.engine
            .compute_totals(Uuid::new_v4(), &TotalsScope::default())
            .await,
        Err(EngineError::KeyNotFound(_))
    ));
}
