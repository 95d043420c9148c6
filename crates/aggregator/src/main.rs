use std::future::IntoFuture;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use quorus_aggregator::{AggregatorConfig, AggregatorService};
use quorus_core::{Operator, ServiceResponse};
use quorus_ledger::HttpLedger;
use quorus_registry::OperatorRegistry;
use quorus_settings::Settings;

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct AggregatorSettings {
    /// Address the registration API binds to.
    listen_addr: String,
    /// Chain gateway base URL.
    ledger_url: Url,
    engine: AggregatorConfig,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".into(),
            ledger_url: Url::parse("http://127.0.0.1:8547").expect("static url"),
            engine: AggregatorConfig::default(),
        }
    }
}

async fn register_operator(
    State(registry): State<OperatorRegistry>,
    Json(operator): Json<Operator>,
) -> Result<Json<bool>, StatusCode> {
    registry
        .register(operator)
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn is_operator_registered(
    State(registry): State<OperatorRegistry>,
    Json(operator): Json<Operator>,
) -> Result<Json<bool>, StatusCode> {
    registry
        .is_registered(&operator.id)
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn healthz() -> Json<ServiceResponse<()>> {
    Json(ServiceResponse::ok("ok", ()))
}

fn registration_router(registry: OperatorRegistry) -> Router {
    Router::new()
        .route("/registerOperator", post(register_operator))
        .route("/isOperatorRegistered", post(is_operator_registered))
        .route("/healthz", get(healthz))
        .with_state(registry)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let settings_path = std::env::args().nth(1).map(PathBuf::from);
    let settings: Settings<AggregatorSettings> =
        Settings::load_or_default("aggregator", settings_path.as_deref())?;
    let config = settings.config;

    let registry = OperatorRegistry::new();
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("registration API listening on {}", config.listen_addr);
    tokio::spawn(axum::serve(listener, registration_router(registry.clone())).into_future());

    let ledger = Arc::new(HttpLedger::new(config.ledger_url.clone()));
    info!(ledger = %config.ledger_url, "using chain gateway ledger");

    let mut service = AggregatorService::new(
        config.engine,
        registry,
        ledger.clone(),
        ledger.clone(),
        ledger,
    );
    service.run().await?;
    Ok(())
}
