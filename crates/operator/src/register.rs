//! Startup announcement to the aggregator's registration endpoint.

use url::Url;

use quorus_core::Operator;

use crate::OperatorError;

/// Announce this operator to the aggregator. Idempotent on the
/// aggregator side, so re-running it after a restart is fine.
pub async fn register_with_aggregator(
    client: &reqwest::Client,
    aggregator: &Url,
    operator: &Operator,
) -> Result<(), OperatorError> {
    let url = format!(
        "{}/registerOperator",
        aggregator.as_str().trim_end_matches('/')
    );
    client
        .post(url)
        .json(operator)
        .send()
        .await
        .map_err(|e| OperatorError::Register(e.to_string()))?
        .error_for_status()
        .map_err(|e| OperatorError::Register(e.to_string()))?;
    Ok(())
}
