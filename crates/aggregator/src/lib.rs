//! Quorus Aggregator
//!
//! Discovers tasks from the chain's event log, dispatches each one to
//! every registered operator, authenticates the signed answers, and
//! accepts the value backed by a strict majority of operator stake.
//! Progress is checkpointed per block so a restart neither skips nor
//! re-publishes a task.

pub mod checkpoint;
pub mod consensus;
pub mod dispatch;
pub mod service;
pub mod stake;
#[cfg(test)]
mod tests;

pub use checkpoint::{CheckpointError, CheckpointStore};
pub use dispatch::{DispatchError, DispatchOutcome, TaskDispatcher};
pub use service::{AggregatorConfig, AggregatorService, PollOutcome};

use thiserror::Error;

use quorus_ledger::LedgerError;
use quorus_registry::RegistryError;

/// Per-task failures leave the checkpoint alone so the task is retried
/// next cycle; only [`AggregatorError::Checkpoint`] is fatal to the
/// process.
#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("no value reached a strict majority of stake")]
    NoMajority,
    #[error("no verifiable responses to tally")]
    NoResponses,
    #[error("stake resolution failed: {0}")]
    Stake(LedgerError),
    #[error("task source query failed: {0}")]
    SourceRead(LedgerError),
    #[error("canonical answer submission failed: {0}")]
    LedgerWrite(LedgerError),
    #[error("registry unavailable: {0}")]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}
