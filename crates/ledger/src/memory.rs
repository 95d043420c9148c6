//! In-process ledger double. Records submissions and allows per-call
//! failure injection, so aggregation tests can exercise the retry paths.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use quorus_core::{OperatorId, Task, TaskRequest};

use crate::{LedgerError, ResultSink, StakeLedger, TaskSource, VaultId};

/// A recorded canonical-answer submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub task: Task,
    pub response: u128,
}

#[derive(Default)]
struct State {
    tasks: Vec<TaskRequest>,
    vaults: HashMap<OperatorId, Vec<VaultId>>,
    assets: HashMap<VaultId, u128>,
    submissions: Vec<Submission>,
    fail_next_submit: bool,
    fail_stake_reads: bool,
}

/// In-memory implementation of all three ledger traits.
#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<State>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task event at the given block.
    pub fn push_task(&self, value: u64, block_number: u64) {
        let mut state = self.state.lock().unwrap();
        state.tasks.push(TaskRequest {
            task: Task { value },
            block_number,
        });
    }

    /// Attach a vault with the given custodied value to an operator.
    pub fn add_vault(&self, operator: OperatorId, vault: VaultId, assets: u128) {
        let mut state = self.state.lock().unwrap();
        state.vaults.entry(operator).or_default().push(vault);
        state.assets.insert(vault, assets);
    }

    /// Convenience: give an operator a single synthetic vault holding
    /// `stake`.
    pub fn set_stake(&self, operator: OperatorId, stake: u128) {
        let mut vault = [0u8; 32];
        vault.copy_from_slice(operator.as_bytes());
        vault[0] ^= 0xFF;
        self.add_vault(operator, vault, stake);
    }

    /// Make the next `submit` call fail with a write error.
    pub fn fail_next_submit(&self) {
        self.state.lock().unwrap().fail_next_submit = true;
    }

    /// Toggle failure of all stake reads.
    pub fn fail_stake_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_stake_reads = fail;
    }

    /// All recorded submissions, in order.
    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }
}

#[async_trait]
impl TaskSource for InMemoryLedger {
    async fn requests_from(&self, block: u64) -> Result<Vec<TaskRequest>, LedgerError> {
        let state = self.state.lock().unwrap();
        let mut requests: Vec<TaskRequest> = state
            .tasks
            .iter()
            .filter(|t| t.block_number >= block)
            .copied()
            .collect();
        requests.sort_by_key(|t| t.block_number);
        Ok(requests)
    }
}

#[async_trait]
impl ResultSink for InMemoryLedger {
    async fn submit(&self, task: &Task, response: u128) -> Result<(), LedgerError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_submit {
            state.fail_next_submit = false;
            return Err(LedgerError::Write("injected submit failure".into()));
        }
        state.submissions.push(Submission {
            task: *task,
            response,
        });
        Ok(())
    }
}

#[async_trait]
impl StakeLedger for InMemoryLedger {
    async fn vaults_staked(&self, operator: &OperatorId) -> Result<Vec<VaultId>, LedgerError> {
        let state = self.state.lock().unwrap();
        if state.fail_stake_reads {
            return Err(LedgerError::Read("injected stake read failure".into()));
        }
        Ok(state.vaults.get(operator).cloned().unwrap_or_default())
    }

    async fn vault_assets(&self, vault: &VaultId) -> Result<u128, LedgerError> {
        let state = self.state.lock().unwrap();
        if state.fail_stake_reads {
            return Err(LedgerError::Read("injected stake read failure".into()));
        }
        Ok(state.assets.get(vault).copied().unwrap_or(0))
    }
}
