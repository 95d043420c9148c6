use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use quorus_core::Operator;
use quorus_crypto::load_or_generate_keypair;
use quorus_operator::{
    register::register_with_aggregator, server, OperatorError, OperatorState, SquareExecutor,
};
use quorus_settings::{config_dir_for, Settings};

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct OperatorConfig {
    /// Address the task server binds to.
    listen_addr: String,
    /// Endpoint other nodes reach this operator at.
    public_endpoint: Url,
    /// Aggregator to announce to on startup; skipped when unset.
    aggregator_url: Option<Url>,
    /// Signing key file; defaults under the operator config dir.
    key_path: Option<PathBuf>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8081".into(),
            public_endpoint: Url::parse("http://127.0.0.1:8081").expect("static url"),
            aggregator_url: None,
            key_path: None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), OperatorError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let settings_path = std::env::args().nth(1).map(PathBuf::from);
    let settings: Settings<OperatorConfig> =
        Settings::load_or_default("operator", settings_path.as_deref())?;
    let config = settings.config;

    let key_path = config
        .key_path
        .unwrap_or_else(|| config_dir_for("operator").join("operator.key"));
    let keypair = load_or_generate_keypair(&key_path)?;
    let operator = Operator {
        id: keypair.operator_id(),
        endpoint: config.public_endpoint.clone(),
    };
    info!(operator = %operator.id, endpoint = %operator.endpoint, "operator identity ready");

    if let Some(aggregator) = &config.aggregator_url {
        let client = reqwest::Client::new();
        match register_with_aggregator(&client, aggregator, &operator).await {
            Ok(()) => info!(aggregator = %aggregator, "registered with aggregator"),
            Err(e) => warn!(aggregator = %aggregator, error = %e, "registration failed, continuing unregistered"),
        }
    }

    let state = OperatorState::new(keypair, Arc::new(SquareExecutor));
    server::serve(&config.listen_addr, state).await
}
