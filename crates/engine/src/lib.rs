//! Offset matching and net-spend totals over a family's ledger.
//!
//! The [`Engine`] links expense transactions to the refunds, cashback and
//! partial repayments that offset them, proposes such links, and rolls the
//! ledger into per-category totals net of confirmed offsets.

pub use accounts::AccountStatus;
pub use currency::Currency;
pub use error::{EngineError, OffsetViolation};
pub use money::{Money, Rate, RateSource};
pub use offsets::{
    CONFIRMED_MAX_DAYS, OffsetDetail, OffsetLink, OffsetOutcome, OffsetStatus, PENDING_MAX_DAYS,
};
pub use ops::{
    CandidateAnchor, CandidateQuery, Classification, CreateOffsetCmd,
    DEFAULT_CANDIDATE_WINDOW_DAYS, Engine, EngineBuilder, OffsetCandidate, OffsetDecision,
    TotalsRow, TotalsScope, UpdateOffsetCmd,
};
pub use rejected_offsets::RejectedOffset;
pub use resync::{ResyncQueue, ResyncRequest, spawn_resync_worker};
pub use transactions::TransactionKind;

pub mod accounts;
pub mod categories;
mod currency;
pub mod entries;
mod error;
pub mod exchange_rates;
pub mod families;
mod ledger;
mod money;
pub mod offsets;
mod ops;
pub mod rejected_offsets;
mod resync;
pub mod transactions;
mod util;
mod validation;

pub type ResultEngine<T> = Result<T, EngineError>;
