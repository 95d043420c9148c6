//! The aggregation loop: poll the task source on a heartbeat, drive
//! dispatch → verify → resolve → publish → checkpoint for each
//! discovered task, in block order.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::{signal, time};
use tracing::{error, info, warn};

use quorus_core::{SignedResponse, TaskRequest};
use quorus_ledger::{ResultSink, StakeLedger, TaskSource};
use quorus_registry::{OperatorRegistry, RegistrySnapshot};

use crate::checkpoint::CheckpointStore;
use crate::consensus;
use crate::dispatch::TaskDispatcher;
use crate::AggregatorError;

/// Aggregation engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Poll interval in milliseconds.
    pub heartbeat_ms: u64,
    /// Per-operator dispatch deadline in milliseconds.
    pub operator_timeout_ms: u64,
    /// Checkpoint file location.
    pub checkpoint_path: PathBuf,
    /// After this many failed attempts on one task, retries are logged
    /// at error level. The task is never skipped.
    pub escalate_after_attempts: u32,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            heartbeat_ms: 10_000,
            operator_timeout_ms: 5_000,
            checkpoint_path: quorus_settings::config_dir_for("aggregator")
                .join("checkpoint.json"),
            escalate_after_attempts: 10,
        }
    }
}

/// What one poll cycle saw and did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub discovered: usize,
    pub resolved: usize,
}

/// The orchestrating state machine. One instance runs per deployment;
/// it is the checkpoint's single writer.
pub struct AggregatorService<S, K, P> {
    config: AggregatorConfig,
    registry: OperatorRegistry,
    source: Arc<S>,
    stakes: Arc<K>,
    sink: Arc<P>,
    dispatcher: TaskDispatcher,
    checkpoint: CheckpointStore,
    attempts: HashMap<u64, u32>,
}

impl<S, K, P> AggregatorService<S, K, P>
where
    S: TaskSource,
    K: StakeLedger,
    P: ResultSink,
{
    pub fn new(
        config: AggregatorConfig,
        registry: OperatorRegistry,
        source: Arc<S>,
        stakes: Arc<K>,
        sink: Arc<P>,
    ) -> Self {
        let dispatcher = TaskDispatcher::new(Duration::from_millis(config.operator_timeout_ms));
        let checkpoint = CheckpointStore::new(config.checkpoint_path.clone());
        Self {
            config,
            registry,
            source,
            stakes,
            sink,
            dispatcher,
            checkpoint,
            attempts: HashMap::new(),
        }
    }

    /// Run until shutdown. Returns an error only on a checkpoint store
    /// fault; per-task and per-operator failures are absorbed and
    /// retried at the polling cadence.
    pub async fn run(&mut self) -> Result<(), AggregatorError> {
        info!(
            heartbeat_ms = self.config.heartbeat_ms,
            checkpoint = %self.config.checkpoint_path.display(),
            "aggregator service starting, listening for task request events"
        );
        let mut interval = time::interval(Duration::from_millis(self.config.heartbeat_ms));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.poll_once().await {
                        Ok(_) => {}
                        Err(e @ AggregatorError::Checkpoint(_)) => {
                            error!(error = %e, "checkpoint store fault, stopping");
                            return Err(e);
                        }
                        Err(e) => warn!(error = %e, "poll cycle failed"),
                    }
                }
                _ = signal::ctrl_c() => {
                    info!("shutdown signal received, stopping aggregator");
                    return Ok(());
                }
            }
        }
    }

    /// One poll cycle: checkpoint read, source query, then per-task
    /// processing in block order. The first unresolved task stops the
    /// cycle so a later task's checkpoint write can never be observed
    /// before an earlier one's.
    pub async fn poll_once(&mut self) -> Result<PollOutcome, AggregatorError> {
        let next_block = self.checkpoint.load()?;
        let mut requests = self
            .source
            .requests_from(next_block)
            .await
            .map_err(AggregatorError::SourceRead)?;

        let mut outcome = PollOutcome {
            discovered: requests.len(),
            resolved: 0,
        };
        if requests.is_empty() {
            return Ok(outcome);
        }

        let snapshot = self.registry.snapshot()?;
        if snapshot.is_empty() {
            warn!(
                pending = requests.len(),
                "no operators registered to serve discovered tasks"
            );
            return Ok(outcome);
        }

        requests.sort_by_key(|r| r.block_number);
        for request in requests {
            match self.process_task(&request, &snapshot).await {
                Ok(response) => {
                    self.checkpoint.store(request.block_number + 1)?;
                    self.attempts.remove(&request.block_number);
                    outcome.resolved += 1;
                    info!(
                        block = request.block_number,
                        value = request.task.value,
                        response,
                        "task resolved and published"
                    );
                }
                Err(e @ AggregatorError::Checkpoint(_)) => return Err(e),
                Err(e) => {
                    let attempts = self.attempts.entry(request.block_number).or_insert(0);
                    *attempts += 1;
                    if *attempts > self.config.escalate_after_attempts {
                        error!(
                            block = request.block_number,
                            attempts = *attempts,
                            error = %e,
                            "task still unresolved after repeated attempts"
                        );
                    } else {
                        warn!(
                            block = request.block_number,
                            attempts = *attempts,
                            error = %e,
                            "task not resolved this cycle, will retry"
                        );
                    }
                    break;
                }
            }
        }
        Ok(outcome)
    }

    /// Dispatch, resolve, publish. The checkpoint is untouched here; the
    /// caller advances it only after this returns Ok.
    async fn process_task(
        &self,
        request: &TaskRequest,
        snapshot: &RegistrySnapshot,
    ) -> Result<u128, AggregatorError> {
        let outcomes = self.dispatcher.dispatch(request.task, snapshot).await;
        let responses: Vec<SignedResponse> = outcomes
            .into_iter()
            .filter_map(|outcome| match outcome.result {
                Ok(signed) => Some(signed),
                Err(e) => {
                    warn!(operator = %outcome.operator.id, error = %e, "operator dispatch failed");
                    None
                }
            })
            .collect();

        let response = consensus::resolve(self.stakes.as_ref(), &responses).await?;
        self.sink
            .submit(&request.task, response)
            .await
            .map_err(AggregatorError::LedgerWrite)?;
        Ok(response)
    }
}
