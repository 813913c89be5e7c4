#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use engine::{AccountStatus, Engine, ResyncQueue, ResyncRequest, TransactionKind};
use migration::MigratorTrait;

pub struct Ledger {
    pub engine: Engine,
    pub db: DatabaseConnection,
    pub family_id: Uuid,
    pub account_id: Uuid,
}

async fn migrated_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

async fn ledger_with(db: DatabaseConnection, engine: Engine) -> Ledger {
    let family_id = insert_family(&db, "USD").await;
    let account_id = insert_account(&db, family_id, "USD", AccountStatus::Active).await;
    Ledger {
        engine,
        db,
        family_id,
        account_id,
    }
}

/// A USD family with one active USD account, no resync queue.
pub async fn ledger() -> Ledger {
    let db = migrated_db().await;
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    ledger_with(db, engine).await
}

pub async fn ledger_with_queue() -> (Ledger, UnboundedReceiver<ResyncRequest>) {
    let db = migrated_db().await;
    let (queue, receiver) = ResyncQueue::channel();
    let engine = Engine::builder()
        .database(db.clone())
        .resync_queue(queue)
        .build()
        .await
        .unwrap();
    (ledger_with(db, engine).await, receiver)
}

pub fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 1).unwrap() + Duration::days(offset)
}

pub async fn insert_family(db: &DatabaseConnection, currency: &str) -> Uuid {
    let id = Uuid::new_v4();
    db.execute(Statement::from_sql_and_values(
        db.get_database_backend(),
        "INSERT INTO families (id, name, currency) VALUES (?, ?, ?)",
        vec![id.into(), "Family".into(), currency.into()],
    ))
    .await
    .unwrap();
    id
}

pub async fn insert_account(
    db: &DatabaseConnection,
    family_id: Uuid,
    currency: &str,
    status: AccountStatus,
) -> Uuid {
    let id = Uuid::new_v4();
    db.execute(Statement::from_sql_and_values(
        db.get_database_backend(),
        "INSERT INTO accounts (id, family_id, name, currency, status, balance_minor) \
         VALUES (?, ?, ?, ?, ?, 0)",
        vec![
            id.into(),
            family_id.into(),
            "Checking".into(),
            currency.into(),
            status.as_str().into(),
        ],
    ))
    .await
    .unwrap();
    id
}

pub async fn insert_category(
    db: &DatabaseConnection,
    family_id: Uuid,
    parent_id: Option<Uuid>,
) -> Uuid {
    let id = Uuid::new_v4();
    db.execute(Statement::from_sql_and_values(
        db.get_database_backend(),
        "INSERT INTO categories (id, family_id, parent_id, name) VALUES (?, ?, ?, ?)",
        vec![id.into(), family_id.into(), parent_id.into(), "Category".into()],
    ))
    .await
    .unwrap();
    id
}

pub async fn insert_rate(db: &DatabaseConnection, date: NaiveDate, from: &str, to: &str, rate: &str) {
    db.execute(Statement::from_sql_and_values(
        db.get_database_backend(),
        "INSERT INTO exchange_rates (id, date, from_currency, to_currency, rate) \
         VALUES (?, ?, ?, ?, ?)",
        vec![
            Uuid::new_v4().into(),
            date.into(),
            from.into(),
            to.into(),
            rate.into(),
        ],
    ))
    .await
    .unwrap();
}

pub async fn count(db: &DatabaseConnection, table: &str) -> i64 {
    let row = db
        .query_one(Statement::from_string(
            db.get_database_backend(),
            format!("SELECT COUNT(*) AS n FROM {table}"),
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get("", "n").unwrap()
}

pub async fn delete_transaction(db: &DatabaseConnection, transaction_id: Uuid) {
    db.execute(Statement::from_sql_and_values(
        db.get_database_backend(),
        "DELETE FROM transactions WHERE id = ?",
        vec![transaction_id.into()],
    ))
    .await
    .unwrap();
}

/// A transaction with its single entry.
#[derive(Clone, Debug)]
pub struct Tx {
    account_id: Uuid,
    amount_minor: i64,
    date: NaiveDate,
    currency: String,
    category_id: Option<Uuid>,
    kind: TransactionKind,
    excluded: bool,
}

impl Tx {
    pub fn new(account_id: Uuid, amount_minor: i64, date: NaiveDate) -> Self {
        Self {
            account_id,
            amount_minor,
            date,
            currency: "USD".to_string(),
            category_id: None,
            kind: TransactionKind::Standard,
            excluded: false,
        }
    }

    pub fn category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_string();
        self
    }

    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn excluded(mut self) -> Self {
        self.excluded = true;
        self
    }

    pub async fn insert(self, db: &DatabaseConnection) -> Uuid {
        let backend = db.get_database_backend();
        let transaction_id = Uuid::new_v4();
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO transactions (id, category_id, kind) VALUES (?, ?, ?)",
            vec![
                transaction_id.into(),
                self.category_id.into(),
                self.kind.as_str().into(),
            ],
        ))
        .await
        .unwrap();
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO entries (id, account_id, transaction_id, name, date, amount_minor, \
             currency, excluded) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            vec![
                Uuid::new_v4().into(),
                self.account_id.into(),
                transaction_id.into(),
                "Entry".into(),
                self.date.into(),
                self.amount_minor.into(),
                self.currency.into(),
                self.excluded.into(),
            ],
        ))
        .await
        .unwrap();
        transaction_id
    }
}
