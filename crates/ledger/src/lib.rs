//! Quorus Ledger
//!
//! The chain boundary, kept opaque behind three async traits: the
//! append-only task event log, the canonical-answer sink, and the
//! two-level stake lookup (operator → vaults → custodied value).
//! [`HttpLedger`] talks to a chain gateway over JSON; [`InMemoryLedger`]
//! is the recording double used by tests and local development.

pub mod http;
pub mod memory;

pub use http::HttpLedger;
pub use memory::{InMemoryLedger, Submission};

use async_trait::async_trait;
use thiserror::Error;

use quorus_core::{OperatorId, Task, TaskRequest};

/// Identifier of a stake vault on the ledger.
pub type VaultId = [u8; 32];

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger read failed: {0}")]
    Read(String),
    #[error("ledger write failed: {0}")]
    Write(String),
}

/// Append-only, monotonically ordered task event log.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// All task-creation events at or after `block`, in block order.
    async fn requests_from(&self, block: u64) -> Result<Vec<TaskRequest>, LedgerError>;
}

/// Sink for canonical answers. Failures must surface to the caller; the
/// aggregation loop relies on them to hold the checkpoint back.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn submit(&self, task: &Task, response: u128) -> Result<(), LedgerError>;
}

/// Two-level stake lookup. Both levels are network calls against the
/// ledger; callers must not assume caching between them.
#[async_trait]
pub trait StakeLedger: Send + Sync {
    /// Vaults the operator has staked into this service.
    async fn vaults_staked(&self, operator: &OperatorId) -> Result<Vec<VaultId>, LedgerError>;

    /// Value custodied by a single vault.
    async fn vault_assets(&self, vault: &VaultId) -> Result<u128, LedgerError>;
}
