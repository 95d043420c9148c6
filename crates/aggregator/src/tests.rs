//! Scenario tests for the aggregation pipeline, driving the real
//! dispatcher against in-process operator servers and the in-memory
//! ledger double.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, routing::post, Router};
use chrono::Utc;
use url::Url;

use quorus_core::{CompletedTask, Operator, SignedResponse, Task};
use quorus_crypto::{sign_response, SigningKeypair};
use quorus_ledger::{InMemoryLedger, Submission};
use quorus_operator::{task_router, OperatorState, SquareExecutor};
use quorus_registry::{OperatorRegistry, RegistrySnapshot};

use crate::checkpoint::CheckpointStore;
use crate::dispatch::{DispatchError, TaskDispatcher};
use crate::{consensus, AggregatorConfig, AggregatorError, AggregatorService};

fn signed(keypair: &SigningKeypair, value: u64, response: u128) -> SignedResponse {
    sign_response(
        keypair,
        CompletedTask {
            value,
            response,
            completed_at: Utc::now(),
        },
    )
}

async fn spawn_router(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(axum::serve(listener, router).into_future());
    addr
}

/// Spin up a real operator server backed by the given keypair.
async fn spawn_operator(keypair: SigningKeypair) -> Operator {
    let id = keypair.operator_id();
    let state = OperatorState::new(keypair, Arc::new(SquareExecutor));
    let addr = spawn_router(task_router(state)).await;
    Operator {
        id,
        endpoint: Url::parse(&format!("http://{addr}")).unwrap(),
    }
}

async fn spawn_misbehaving(router: Router, keypair: &SigningKeypair) -> Operator {
    let addr = spawn_router(router).await;
    Operator {
        id: keypair.operator_id(),
        endpoint: Url::parse(&format!("http://{addr}")).unwrap(),
    }
}

fn fresh_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("quorus-test-{tag}-{}", rand::random::<u64>()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn test_config(dir: &Path) -> AggregatorConfig {
    AggregatorConfig {
        heartbeat_ms: 50,
        operator_timeout_ms: 300,
        checkpoint_path: dir.join("checkpoint.json"),
        escalate_after_attempts: 3,
    }
}

fn test_service(
    ledger: &Arc<InMemoryLedger>,
    registry: OperatorRegistry,
    dir: &Path,
) -> AggregatorService<InMemoryLedger, InMemoryLedger, InMemoryLedger> {
    AggregatorService::new(
        test_config(dir),
        registry,
        ledger.clone(),
        ledger.clone(),
        ledger.clone(),
    )
}

// Scenario A: stakes {10, 10, 5}, answers {9, 9, 16} -> 9 holds 20 of 25.
#[tokio::test]
async fn majority_of_stake_wins() {
    let keys: Vec<SigningKeypair> = (0..3).map(|_| SigningKeypair::generate()).collect();
    let ledger = InMemoryLedger::new();
    ledger.set_stake(keys[0].operator_id(), 10);
    ledger.set_stake(keys[1].operator_id(), 10);
    ledger.set_stake(keys[2].operator_id(), 5);

    let responses = vec![
        signed(&keys[0], 3, 9),
        signed(&keys[1], 3, 9),
        signed(&keys[2], 3, 16),
    ];
    let value = consensus::resolve(&ledger, &responses).await.unwrap();
    assert_eq!(value, 9);
}

// Scenario B: same stakes, all three disagree -> max bucket 10 <= 12.5.
#[tokio::test]
async fn full_disagreement_is_no_majority() {
    let keys: Vec<SigningKeypair> = (0..3).map(|_| SigningKeypair::generate()).collect();
    let ledger = InMemoryLedger::new();
    ledger.set_stake(keys[0].operator_id(), 10);
    ledger.set_stake(keys[1].operator_id(), 10);
    ledger.set_stake(keys[2].operator_id(), 5);

    let responses = vec![
        signed(&keys[0], 3, 9),
        signed(&keys[1], 3, 16),
        signed(&keys[2], 3, 25),
    ];
    assert!(matches!(
        consensus::resolve(&ledger, &responses).await,
        Err(AggregatorError::NoMajority)
    ));
}

// Scenario D: a tampered signature is discarded even though its claimed
// stake would dominate the tally.
#[tokio::test]
async fn tampered_signature_is_discarded_before_tally() {
    let honest_a = SigningKeypair::generate();
    let honest_b = SigningKeypair::generate();
    let forger = SigningKeypair::generate();

    let ledger = InMemoryLedger::new();
    ledger.set_stake(honest_a.operator_id(), 5);
    ledger.set_stake(honest_b.operator_id(), 5);
    ledger.set_stake(forger.operator_id(), 100);

    let mut forged = signed(&forger, 3, 16);
    forged.signature[0] ^= 0x01;

    let responses = vec![signed(&honest_a, 3, 9), signed(&honest_b, 3, 9), forged];
    let value = consensus::resolve(&ledger, &responses).await.unwrap();
    assert_eq!(value, 9);
}

#[tokio::test]
async fn all_responders_without_stake_is_no_majority() {
    let keypair = SigningKeypair::generate();
    let ledger = InMemoryLedger::new();

    let responses = vec![signed(&keypair, 3, 9)];
    assert!(matches!(
        consensus::resolve(&ledger, &responses).await,
        Err(AggregatorError::NoMajority)
    ));
}

#[tokio::test]
async fn resolution_is_idempotent_for_identical_responses() {
    let keys: Vec<SigningKeypair> = (0..3).map(|_| SigningKeypair::generate()).collect();
    let ledger = InMemoryLedger::new();
    for key in &keys {
        ledger.set_stake(key.operator_id(), 10);
    }

    let responses = vec![
        signed(&keys[0], 4, 16),
        signed(&keys[1], 4, 16),
        signed(&keys[2], 4, 25),
    ];
    let first = consensus::resolve(&ledger, &responses).await.unwrap();
    let second = consensus::resolve(&ledger, &responses).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first, 16);
}

#[tokio::test]
async fn dispatch_settles_every_operator_with_typed_outcomes() {
    let honest_key = SigningKeypair::generate();
    let honest = spawn_operator(honest_key).await;

    let erroring = spawn_misbehaving(
        Router::new().route("/task", post(|| async { StatusCode::INTERNAL_SERVER_ERROR })),
        &SigningKeypair::generate(),
    )
    .await;
    let garbling = spawn_misbehaving(
        Router::new().route("/task", post(|| async { "not json" })),
        &SigningKeypair::generate(),
    )
    .await;
    let unreachable = Operator {
        id: SigningKeypair::generate().operator_id(),
        endpoint: Url::parse("http://127.0.0.1:1").unwrap(),
    };

    let snapshot = RegistrySnapshot {
        epoch: 1,
        operators: vec![honest, erroring, garbling, unreachable],
    };
    let dispatcher = TaskDispatcher::new(Duration::from_secs(2));
    let outcomes = dispatcher.dispatch(Task { value: 5 }, &snapshot).await;

    assert_eq!(outcomes.len(), 4);
    let signed = outcomes[0].result.as_ref().unwrap();
    assert_eq!(signed.completed_task.response, 25);
    assert!(matches!(
        outcomes[1].result,
        Err(DispatchError::BadStatus(500))
    ));
    assert!(matches!(
        outcomes[2].result,
        Err(DispatchError::MalformedBody(_))
    ));
    assert!(matches!(
        outcomes[3].result,
        Err(DispatchError::Unreachable(_))
    ));
}

#[tokio::test]
async fn dispatch_timeout_hits_one_operator_not_the_batch() {
    let slow = spawn_misbehaving(
        Router::new().route(
            "/task",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "late"
            }),
        ),
        &SigningKeypair::generate(),
    )
    .await;
    let honest = spawn_operator(SigningKeypair::generate()).await;

    let snapshot = RegistrySnapshot {
        epoch: 1,
        operators: vec![slow, honest],
    };
    let dispatcher = TaskDispatcher::new(Duration::from_millis(200));
    let outcomes = dispatcher.dispatch(Task { value: 2 }, &snapshot).await;

    assert!(matches!(outcomes[0].result, Err(DispatchError::TimedOut)));
    assert_eq!(
        outcomes[1].result.as_ref().unwrap().completed_task.response,
        4
    );
}

// Scenario C over the full loop: the timed-out operator is excluded from
// both tally and total, and the surviving pair still carries a majority.
#[tokio::test]
async fn timed_out_operator_is_excluded_from_consensus() {
    let dir = fresh_dir("scenario-c");
    let ledger = Arc::new(InMemoryLedger::new());
    let registry = OperatorRegistry::new();

    for _ in 0..2 {
        let keypair = SigningKeypair::generate();
        ledger.set_stake(keypair.operator_id(), 10);
        registry.register(spawn_operator(keypair).await).unwrap();
    }
    let hanging_key = SigningKeypair::generate();
    ledger.set_stake(hanging_key.operator_id(), 5);
    let hanging = spawn_misbehaving(
        Router::new().route(
            "/task",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "late"
            }),
        ),
        &hanging_key,
    )
    .await;
    registry.register(hanging).unwrap();

    ledger.push_task(2, 0);
    let mut service = test_service(&ledger, registry, &dir);
    let outcome = service.poll_once().await.unwrap();

    assert_eq!(outcome.resolved, 1);
    assert_eq!(
        ledger.submissions(),
        vec![Submission {
            task: Task { value: 2 },
            response: 4
        }]
    );
    assert_eq!(
        CheckpointStore::new(dir.join("checkpoint.json")).load().unwrap(),
        1
    );
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn empty_registry_skips_dispatch_and_holds_checkpoint() {
    let dir = fresh_dir("empty-registry");
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.push_task(3, 5);

    let mut service = test_service(&ledger, OperatorRegistry::new(), &dir);
    let outcome = service.poll_once().await.unwrap();

    assert_eq!(outcome.discovered, 1);
    assert_eq!(outcome.resolved, 0);
    assert!(ledger.submissions().is_empty());
    assert_eq!(
        CheckpointStore::new(dir.join("checkpoint.json")).load().unwrap(),
        0
    );
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn unresolved_task_is_retried_and_never_skipped() {
    let dir = fresh_dir("never-skip");
    let ledger = Arc::new(InMemoryLedger::new());
    let registry = OperatorRegistry::new();

    let keypair = SigningKeypair::generate();
    ledger.set_stake(keypair.operator_id(), 10);
    registry.register(spawn_operator(keypair).await).unwrap();

    ledger.push_task(5, 3);
    ledger.push_task(6, 7);

    let mut service = test_service(&ledger, registry, &dir);
    let checkpoint = CheckpointStore::new(dir.join("checkpoint.json"));

    // Stake reads fail: both tasks stay unresolved, checkpoint untouched.
    ledger.fail_stake_reads(true);
    let outcome = service.poll_once().await.unwrap();
    assert_eq!(outcome.discovered, 2);
    assert_eq!(outcome.resolved, 0);
    assert_eq!(checkpoint.load().unwrap(), 0);

    // Ledger recovers: the same tasks resolve in block order.
    ledger.fail_stake_reads(false);
    let outcome = service.poll_once().await.unwrap();
    assert_eq!(outcome.resolved, 2);
    assert_eq!(checkpoint.load().unwrap(), 8);
    assert_eq!(
        ledger.submissions(),
        vec![
            Submission {
                task: Task { value: 5 },
                response: 25
            },
            Submission {
                task: Task { value: 6 },
                response: 36
            },
        ]
    );
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn publish_failure_holds_checkpoint_until_retry_succeeds() {
    let dir = fresh_dir("publish-retry");
    let ledger = Arc::new(InMemoryLedger::new());
    let registry = OperatorRegistry::new();

    let keypair = SigningKeypair::generate();
    ledger.set_stake(keypair.operator_id(), 10);
    registry.register(spawn_operator(keypair).await).unwrap();
    ledger.push_task(4, 0);

    let mut service = test_service(&ledger, registry, &dir);
    let checkpoint = CheckpointStore::new(dir.join("checkpoint.json"));

    ledger.fail_next_submit();
    let outcome = service.poll_once().await.unwrap();
    assert_eq!(outcome.resolved, 0);
    assert_eq!(checkpoint.load().unwrap(), 0);

    let outcome = service.poll_once().await.unwrap();
    assert_eq!(outcome.resolved, 1);
    assert_eq!(checkpoint.load().unwrap(), 1);
    assert_eq!(ledger.submissions().len(), 1);
    let _ = std::fs::remove_dir_all(dir);
}

// A crash after publish but before the checkpoint write replays the
// task; with the same operator answers the published value is identical.
#[tokio::test]
async fn replay_after_lost_checkpoint_republishes_the_same_value() {
    let dir = fresh_dir("replay");
    let ledger = Arc::new(InMemoryLedger::new());
    let registry = OperatorRegistry::new();

    let keypair = SigningKeypair::generate();
    ledger.set_stake(keypair.operator_id(), 10);
    registry.register(spawn_operator(keypair).await).unwrap();
    ledger.push_task(9, 2);

    let mut service = test_service(&ledger, registry, &dir);
    service.poll_once().await.unwrap();

    // Simulate the crash by resetting the checkpoint to the old position.
    CheckpointStore::new(dir.join("checkpoint.json")).store(0).unwrap();
    service.poll_once().await.unwrap();

    let submissions = ledger.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0], submissions[1]);
    let _ = std::fs::remove_dir_all(dir);
}
