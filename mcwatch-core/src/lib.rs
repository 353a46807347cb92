//! Presence tracking, playtime accrual and account verification for a
//! single Minecraft server.

pub mod accrual;
mod error;
pub mod ledger;
mod models;
pub mod presence;
pub mod query;
pub mod shutdown;
pub mod store;
pub mod verify;

pub use accrual::AccrualLoop;
pub use error::{AddressError, LedgerError, QueryError, Result, StoreError, VerifyError};
pub use ledger::{AccrualReport, Ledger, format_playtime, mention_id};
pub use models::{Identity, LedgerEntry, PlayerName, SampledPlayer, ServerStatus, Snapshot};
pub use presence::{Poller, PresenceCache, StatusDisplay, status_line};
pub use query::{ServerAddress, ServerListPing, StatusSource};
pub use store::{JsonFileStore, LedgerStore, MemoryStore, Records};
pub use verify::{
    Attempt, FailureReason, Outcome, PendingVerification, Phase, Verifier, VerifierConfig,
};
