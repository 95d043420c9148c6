//! Chain gateway client. The gateway indexes the chain and exposes the
//! three ledger surfaces as plain JSON over HTTP.

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use quorus_core::{OperatorId, Task, TaskRequest};

use crate::{LedgerError, ResultSink, StakeLedger, TaskSource, VaultId};

/// Ledger access via a chain gateway.
///
/// Endpoints, relative to the base URL:
/// - `GET  tasks?fromBlock=N`        → `[TaskRequest]`
/// - `POST responses {task,response}`
/// - `GET  operators/{id}/vaults`    → `[VaultId]`
/// - `GET  vaults/{hex}/assets`      → custodied value
pub struct HttpLedger {
    client: reqwest::Client,
    base: Url,
}

impl HttpLedger {
    pub fn new(mut base: Url) -> Self {
        // Url::join drops the last path segment without this.
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        Self {
            client: reqwest::Client::new(),
            base,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, LedgerError> {
        self.base
            .join(path)
            .map_err(|e| LedgerError::Read(e.to_string()))
    }
}

#[async_trait]
impl TaskSource for HttpLedger {
    async fn requests_from(&self, block: u64) -> Result<Vec<TaskRequest>, LedgerError> {
        let url = self.endpoint("tasks")?;
        let requests: Vec<TaskRequest> = self
            .client
            .get(url)
            .query(&[("fromBlock", block)])
            .send()
            .await
            .map_err(|e| LedgerError::Read(e.to_string()))?
            .error_for_status()
            .map_err(|e| LedgerError::Read(e.to_string()))?
            .json()
            .await
            .map_err(|e| LedgerError::Read(e.to_string()))?;
        debug!(from_block = block, count = requests.len(), "fetched task events");
        Ok(requests)
    }
}

#[async_trait]
impl ResultSink for HttpLedger {
    async fn submit(&self, task: &Task, response: u128) -> Result<(), LedgerError> {
        let url = self.endpoint("responses")?;
        let body = serde_json::json!({ "task": task, "response": response });
        self.client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Write(e.to_string()))?
            .error_for_status()
            .map_err(|e| LedgerError::Write(e.to_string()))?;
        debug!(value = task.value, response, "submitted canonical answer");
        Ok(())
    }
}

#[async_trait]
impl StakeLedger for HttpLedger {
    async fn vaults_staked(&self, operator: &OperatorId) -> Result<Vec<VaultId>, LedgerError> {
        let url = self.endpoint(&format!("operators/{operator}/vaults"))?;
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| LedgerError::Read(e.to_string()))?
            .error_for_status()
            .map_err(|e| LedgerError::Read(e.to_string()))?
            .json()
            .await
            .map_err(|e| LedgerError::Read(e.to_string()))
    }

    async fn vault_assets(&self, vault: &VaultId) -> Result<u128, LedgerError> {
        let url = self.endpoint(&format!("vaults/{}/assets", hex::encode(vault)))?;
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| LedgerError::Read(e.to_string()))?
            .error_for_status()
            .map_err(|e| LedgerError::Read(e.to_string()))?
            .json()
            .await
            .map_err(|e| LedgerError::Read(e.to_string()))
    }
}
