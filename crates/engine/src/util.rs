//! Internal helpers for conversion and error mapping.
//!
//! These utilities are **not** part of the public API.

use sea_orm::{DbErr, SqlErr};

use crate::{Currency, EngineError, ResultEngine};

/// Parse a currency code stored in the DB into a strongly typed `Currency`.
pub(crate) fn model_currency(value: &str) -> ResultEngine<Currency> {
    Currency::try_from(value)
        .map_err(|_| EngineError::CurrencyMismatch(format!("invalid currency: {value}")))
}

/// Turns a uniqueness violation raised by the store into `Conflict`.
///
/// The store constraint is the authoritative guard; validation done before
/// the write only reflects the state seen at that time.
pub(crate) fn conflict_or_db(err: DbErr, what: &str) -> EngineError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            EngineError::Conflict(format!("{what} ({detail})"))
        }
        _ => EngineError::Database(err),
    }
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_notes_are_dropped() {
        assert_eq!(normalize_optional_text(Some("   ")), None);
        assert_eq!(
            normalize_optional_text(Some(" partial refund ")),
            Some("partial refund".to_string())
        );
        assert_eq!(normalize_optional_text(None), None);
    }

    #[tokio::test]
    async fn second_link_of_an_offset_is_a_conflict() {
        use migration::MigratorTrait;
        use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, Statement};
        use uuid::Uuid;

        use crate::{OffsetLink, OffsetStatus, offsets};

        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        let (expense, other_expense, refund) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        for id in [expense, other_expense, refund] {
            db.execute(Statement::from_sql_and_values(
                db.get_database_backend(),
                "INSERT INTO transactions (id, category_id, kind) VALUES (?, NULL, 'standard')",
                vec![id.into()],
            ))
            .await
            .unwrap();
        }

        let first = OffsetLink::new(expense, refund, OffsetStatus::Pending, None);
        offsets::ActiveModel::from(&first).insert(&db).await.unwrap();
        let second = OffsetLink::new(other_expense, refund, OffsetStatus::Confirmed, None);
        let err = offsets::ActiveModel::from(&second)
            .insert(&db)
            .await
            .unwrap_err();

        let err = conflict_or_db(err, "offset transaction is already linked");
        assert!(matches!(
            &err,
            EngineError::Conflict(message) if message.starts_with("offset transaction is already linked")
        ));
        assert!(err.is_link_rejected());
        assert!(err.violations().is_empty());
    }

    #[test]
    fn non_unique_errors_stay_database_errors() {
        let err = conflict_or_db(DbErr::Custom("boom".to_string()), "offset");
        assert!(matches!(err, EngineError::Database(_)));
    }
}
