//! Concurrent task fan-out to every operator in a registry snapshot.
//!
//! One request per operator, all spawned together, all joined before
//! returning: the consensus step needs the full response set to compute
//! stake shares, so there is no early exit. Each operator's failure is
//! an outcome, never an abort of the batch.

use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tracing::debug;

use quorus_core::{Operator, ServiceResponse, SignedResponse, Task};
use quorus_registry::RegistrySnapshot;

/// Per-operator dispatch failure. Recorded and excluded from the tally,
/// never fatal.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("operator unreachable: {0}")]
    Unreachable(String),
    #[error("operator returned status {0}")]
    BadStatus(u16),
    #[error("malformed response body: {0}")]
    MalformedBody(String),
    #[error("operator rejected the task: {0}")]
    Rejected(String),
    #[error("operator timed out")]
    TimedOut,
}

/// The settled result for one operator in a dispatch batch.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub operator: Operator,
    pub result: Result<SignedResponse, DispatchError>,
}

/// Fans a task out to operators over HTTP with a per-operator deadline,
/// so one unresponsive operator cannot stall the batch.
pub struct TaskDispatcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl TaskDispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Send `task` to every operator in the snapshot and wait for all
    /// outcomes to settle. Outcomes are in snapshot order.
    pub async fn dispatch(&self, task: Task, snapshot: &RegistrySnapshot) -> Vec<DispatchOutcome> {
        debug!(
            value = task.value,
            operators = snapshot.len(),
            epoch = snapshot.epoch,
            "dispatching task"
        );
        let calls = snapshot.operators.iter().map(|operator| async move {
            let result = match tokio::time::timeout(self.timeout, self.send_one(task, operator))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(DispatchError::TimedOut),
            };
            DispatchOutcome {
                operator: operator.clone(),
                result,
            }
        });
        join_all(calls).await
    }

    async fn send_one(
        &self,
        task: Task,
        operator: &Operator,
    ) -> Result<SignedResponse, DispatchError> {
        let url = format!("{}/task", operator.endpoint.as_str().trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .json(&task)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DispatchError::TimedOut
                } else {
                    DispatchError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::BadStatus(status.as_u16()));
        }

        let envelope: ServiceResponse<SignedResponse> = response
            .json()
            .await
            .map_err(|e| DispatchError::MalformedBody(e.to_string()))?;

        match envelope.response_object {
            Some(signed) if envelope.success => Ok(signed),
            _ => Err(DispatchError::Rejected(envelope.message)),
        }
    }
}
