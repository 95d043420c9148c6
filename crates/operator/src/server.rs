//! HTTP surface for the operator: `POST /task` and `GET /healthz`.

use std::sync::Arc;

use axum::{extract::State, routing::get, routing::post, Json, Router};
use tracing::info;

use quorus_core::{ServiceResponse, SignedResponse, Task};
use quorus_crypto::{sign_response, SigningKeypair};

use crate::executor::TaskExecutor;
use crate::OperatorError;

/// Shared state for the task routes.
#[derive(Clone)]
pub struct OperatorState {
    keypair: Arc<SigningKeypair>,
    executor: Arc<dyn TaskExecutor>,
}

impl OperatorState {
    pub fn new(keypair: SigningKeypair, executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            keypair: Arc::new(keypair),
            executor,
        }
    }
}

/// Routes served by every operator node.
pub fn task_router(state: OperatorState) -> Router {
    Router::new()
        .route("/task", post(handle_task))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn handle_task(
    State(state): State<OperatorState>,
    Json(task): Json<Task>,
) -> Json<ServiceResponse<SignedResponse>> {
    let completed = state.executor.execute(&task);
    info!(value = task.value, response = %completed.response, "task executed");
    let signed = sign_response(&state.keypair, completed);
    Json(ServiceResponse::ok("task completed", signed))
}

async fn healthz() -> Json<ServiceResponse<()>> {
    Json(ServiceResponse::ok("ok", ()))
}

/// Bind and serve until the process is stopped.
pub async fn serve(addr: &str, state: OperatorState) -> Result<(), OperatorError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| OperatorError::Server(e.to_string()))?;
    info!("operator listening on {addr}");
    axum::serve(listener, task_router(state))
        .await
        .map_err(|e| OperatorError::Server(e.to_string()))
}
