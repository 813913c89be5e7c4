use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::{ResultEngine, ResyncQueue, ledger::TransactionSnapshot};

mod balances;
mod candidates;
mod offsets;
mod rates;
mod rejections;
mod totals;

pub use candidates::{CandidateAnchor, CandidateQuery, DEFAULT_CANDIDATE_WINDOW_DAYS, OffsetCandidate};
pub use offsets::{CreateOffsetCmd, OffsetDecision, UpdateOffsetCmd};
pub use totals::{Classification, TotalsRow, TotalsScope};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: $crate::ResultEngine<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    candidate_window_days: i64,
    resync: Option<ResyncQueue>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Enqueues a balance resync for each distinct account. Call only after
    /// the mutating DB transaction committed.
    fn schedule_resync(&self, accounts: LinkAccounts) {
        let Some(queue) = &self.resync else {
            tracing::debug!("no resync queue configured, skipping balance resync");
            return;
        };
        queue.schedule(accounts.expense_account_id);
        if accounts.offset_account_id != accounts.expense_account_id {
            queue.schedule(accounts.offset_account_id);
        }
    }
}

/// Owning accounts of the two sides of a link.
#[derive(Clone, Copy, Debug)]
struct LinkAccounts {
    expense_account_id: Uuid,
    offset_account_id: Uuid,
}

impl LinkAccounts {
    fn of(expense: &TransactionSnapshot, offset: &TransactionSnapshot) -> Self {
        Self {
            expense_account_id: expense.account_id,
            offset_account_id: offset.account_id,
        }
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    candidate_window_days: Option<i64>,
    resync: Option<ResyncQueue>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Default date window of the candidate matcher (30 days if unset).
    pub fn candidate_window_days(mut self, days: i64) -> EngineBuilder {
        self.candidate_window_days = Some(days);
        self
    }

    /// Queue receiving account resync requests after each committed mutation.
    pub fn resync_queue(mut self, queue: ResyncQueue) -> EngineBuilder {
        self.resync = Some(queue);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let candidate_window_days = self
            .candidate_window_days
            .unwrap_or(DEFAULT_CANDIDATE_WINDOW_DAYS);
        candidates::validate_window(candidate_window_days)?;
        Ok(Engine {
            database: self.database,
            candidate_window_days,
            resync: self.resync,
        })
    }
}
