use engine::{
    AccountStatus, CandidateAnchor, CandidateQuery, CreateOffsetCmd, EngineError, OffsetCandidate,
    OffsetStatus, TransactionKind,
};
use uuid::Uuid;

mod common;

use common::{Tx, day, insert_account, insert_category, insert_family};

fn pairs(candidates: &[OffsetCandidate]) -> Vec<(Uuid, Uuid)> {
    candidates
        .iter()
        .map(|c| (c.expense_transaction_id, c.offset_transaction_id))
        .collect()
}

#[tokio::test]
async fn closest_date_first_then_largest_refund() {
    let l = common::ledger().await;
    let expense = Tx::new(l.account_id, 10_000, day(10)).insert(&l.db).await;
    let near_small = Tx::new(l.account_id, -1_000, day(12)).insert(&l.db).await;
    let far_large = Tx::new(l.account_id, -9_000, day(15)).insert(&l.db).await;
    let tied_small = Tx::new(l.account_id, -2_000, day(7)).insert(&l.db).await;
    let tied_large = Tx::new(l.account_id, -4_500, day(13)).insert(&l.db).await;

    let candidates = l
        .engine
        .offset_candidates_for(l.family_id, expense, None)
        .await
        .unwrap();

    assert_eq!(
        candidates
            .iter()
            .map(|c| c.offset_transaction_id)
            .collect::<Vec<_>>(),
        vec![near_small, tied_large, tied_small, far_large]
    );
    assert_eq!(
        candidates
            .iter()
            .map(|c| c.date_diff_days)
            .collect::<Vec<_>>(),
        vec![2, 3, 3, 5]
    );
}

#[tokio::test]
async fn filters_out_implausible_refunds() {
    let l = common::ledger().await;
    let groceries = insert_category(&l.db, l.family_id, None).await;
    let travel = insert_category(&l.db, l.family_id, None).await;
    let disabled = insert_account(&l.db, l.family_id, "USD", AccountStatus::Disabled).await;
    let expense = Tx::new(l.account_id, 10_000, day(0))
        .category(groceries)
        .insert(&l.db)
        .await;

    let plausible = Tx::new(l.account_id, -10_000, day(30))
        .category(groceries)
        .insert(&l.db)
        .await;
    let uncategorized = Tx::new(l.account_id, -500, day(-30)).insert(&l.db).await;
    // Each of these breaks exactly one predicate.
    Tx::new(l.account_id, -10_001, day(1)).insert(&l.db).await;
    Tx::new(l.account_id, -500, day(31)).insert(&l.db).await;
    Tx::new(l.account_id, -500, day(1))
        .currency("EUR")
        .insert(&l.db)
        .await;
    Tx::new(l.account_id, -500, day(1))
        .excluded()
        .insert(&l.db)
        .await;
    Tx::new(l.account_id, -500, day(1))
        .kind(TransactionKind::Transfer)
        .insert(&l.db)
        .await;
    Tx::new(l.account_id, -500, day(1))
        .category(travel)
        .insert(&l.db)
        .await;
    Tx::new(disabled, -500, day(1)).insert(&l.db).await;

    let candidates = l
        .engine
        .offset_candidates_for(l.family_id, expense, None)
        .await
        .unwrap();

    assert_eq!(
        pairs(&candidates),
        vec![(expense, plausible), (expense, uncategorized)]
    );
}

#[tokio::test]
async fn window_is_configurable() {
    let l = common::ledger().await;
    let expense = Tx::new(l.account_id, 10_000, day(0)).insert(&l.db).await;
    let within = Tx::new(l.account_id, -1_000, day(5)).insert(&l.db).await;
    Tx::new(l.account_id, -1_000, day(6)).insert(&l.db).await;

    let query = CandidateQuery {
        window_days: Some(5),
        anchor: None,
    };
    let candidates = l
        .engine
        .offset_match_candidates(l.family_id, &query)
        .await
        .unwrap();
    assert_eq!(pairs(&candidates), vec![(expense, within)]);

    let narrow = engine::Engine::builder()
        .database(l.db.clone())
        .candidate_window_days(5)
        .build()
        .await
        .unwrap();
    let candidates = narrow
        .offset_match_candidates(l.family_id, &CandidateQuery::default())
        .await
        .unwrap();
    assert_eq!(pairs(&candidates), vec![(expense, within)]);

    let negative = CandidateQuery {
        window_days: Some(-1),
        anchor: None,
    };
    assert!(matches!(
        l.engine.offset_match_candidates(l.family_id, &negative).await,
        Err(EngineError::InvalidAmount(_))
    ));
}

#[tokio::test]
async fn linked_and_rejected_pairs_are_never_proposed() {
    let l = common::ledger().await;
    let expense = Tx::new(l.account_id, 10_000, day(0)).insert(&l.db).await;
    let other_expense = Tx::new(l.account_id, 8_000, day(1)).insert(&l.db).await;
    let linked = Tx::new(l.account_id, -1_000, day(2)).insert(&l.db).await;
    let rejected = Tx::new(l.account_id, -2_000, day(3)).insert(&l.db).await;

    l.engine
        .create_offset(
            l.family_id,
            CreateOffsetCmd::new(expense, linked, OffsetStatus::Pending),
        )
        .await
        .unwrap();
    l.engine
        .reject_pair(l.family_id, expense, rejected)
        .await
        .unwrap();

    let candidates = l
        .engine
        .offset_match_candidates(l.family_id, &CandidateQuery::default())
        .await
        .unwrap();

    // The used refund is gone for every expense; the rejected one only for
    // the pair that was rejected.
    assert_eq!(pairs(&candidates), vec![(other_expense, rejected)]);
}

#[tokio::test]
async fn anchor_direction_follows_its_sign() {
    let l = common::ledger().await;
    let expense = Tx::new(l.account_id, 10_000, day(0)).insert(&l.db).await;
    let refund = Tx::new(l.account_id, -1_000, day(1)).insert(&l.db).await;

    assert!(
        l.engine
            .offset_candidates_for(l.family_id, refund, None)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(
        l.engine
            .expense_candidates_for(l.family_id, expense, None)
            .await
            .unwrap()
            .is_empty()
    );

    let for_refund = l
        .engine
        .expense_candidates_for(l.family_id, refund, None)
        .await
        .unwrap();
    assert_eq!(pairs(&for_refund), vec![(expense, refund)]);

    let by_sign = l
        .engine
        .match_candidates_for(l.family_id, refund)
        .await
        .unwrap();
    assert_eq!(by_sign, for_refund);

    let query = CandidateQuery {
        window_days: None,
        anchor: Some(CandidateAnchor::Expense(expense)),
    };
    assert_eq!(
        l.engine
            .offset_match_candidates(l.family_id, &query)
            .await
            .unwrap(),
        for_refund
    );
}

#[tokio::test]
async fn other_families_stay_invisible() {
    let l = common::ledger().await;
    let stranger = insert_family(&l.db, "USD").await;
    let stranger_account = insert_account(&l.db, stranger, "USD", AccountStatus::Active).await;
    let expense = Tx::new(l.account_id, 10_000, day(0)).insert(&l.db).await;
    let foreign_refund = Tx::new(stranger_account, -1_000, day(1)).insert(&l.db).await;

    assert!(
        l.engine
            .offset_candidates_for(l.family_id, expense, None)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(matches!(
        l.engine
            .expense_candidates_for(l.family_id, foreign_refund, None)
            .await,
        Err(EngineError::KeyNotFound(_))
    ));
}

#[tokio::test]
async fn matching_has_no_side_effects() {
    let l = common::ledger().await;
    let expense = Tx::new(l.account_id, 10_000, day(0)).insert(&l.db).await;
    let refund = Tx::new(l.account_id, -1_000, day(1)).insert(&l.db).await;

    let first = l
        .engine
        .offset_match_candidates(l.family_id, &CandidateQuery::default())
        .await
        .unwrap();
    let second = l
        .engine
        .offset_match_candidates(l.family_id, &CandidateQuery::default())
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(pairs(&first), vec![(expense, refund)]);
    assert_eq!(common::count(&l.db, "offsets").await, 0);
    assert_eq!(common::count(&l.db, "rejected_offsets").await, 0);
}

#[tokio::test]
async fn anchor_narrows_only_its_own_side() {
    let l = common::ledger().await;
    let expense = Tx::new(l.account_id, 10_000, day(0)).insert(&l.db).await;
    let other_expense = Tx::new(l.account_id, 5_000, day(3)).insert(&l.db).await;
    let refund = Tx::new(l.account_id, -1_000, day(1)).insert(&l.db).await;
    let other_refund = Tx::new(l.account_id, -2_000, day(2)).insert(&l.db).await;

    let for_expense = l
        .engine
        .offset_candidates_for(l.family_id, expense, None)
        .await
        .unwrap();
    assert_eq!(
        pairs(&for_expense),
        vec![(expense, refund), (expense, other_refund)]
    );

    let for_refund = l
        .engine
        .expense_candidates_for(l.family_id, other_refund, None)
        .await
        .unwrap();
    assert_eq!(
        pairs(&for_refund),
        vec![(other_expense, other_refund), (expense, other_refund)]
    );

    let unanchored = l
        .engine
        .offset_match_candidates(l.family_id, &CandidateQuery::default())
        .await
        .unwrap();
    assert_eq!(unanchored.len(), 4);
}

#[tokio::test]
async fn oversized_windows_cover_the_whole_calendar() {
    let l = common::ledger().await;
    let expense = Tx::new(l.account_id, 10_000, day(0)).insert(&l.db).await;
    let recent = Tx::new(l.account_id, -1_000, day(1)).insert(&l.db).await;
    let ancient = Tx::new(l.account_id, -1_000, day(-3_000)).insert(&l.db).await;

    for window_days in [1_000_000_000, i64::MAX] {
        let query = CandidateQuery {
            window_days: Some(window_days),
            anchor: None,
        };
        let candidates = l
            .engine
            .offset_match_candidates(l.family_id, &query)
            .await
            .unwrap();
        assert_eq!(
            pairs(&candidates),
            vec![(expense, recent), (expense, ancient)]
        );
    }

    let wide = engine::Engine::builder()
        .database(l.db.clone())
        .candidate_window_days(i64::MAX)
        .build()
        .await
        .unwrap();
    assert_eq!(
        wide.offset_candidates_for(l.family_id, expense, None)
            .await
            .unwrap()
            .len(),
        2
    );
}
