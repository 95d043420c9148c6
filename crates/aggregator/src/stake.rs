//! Stake resolution: voting weight per operator, fresh per task.
//!
//! Stake can change between tasks, so nothing here is cached; every
//! resolution walks the ledger's two-level vault lookup again.

use std::collections::BTreeMap;

use tracing::debug;

use quorus_core::OperatorId;
use quorus_ledger::{LedgerError, StakeLedger};

/// Resolve the stake of each operator and the total across them.
///
/// Operators whose summed stake is `<= min_stake` are excluded from both
/// the mapping and the total. Duplicate identities are resolved once.
pub async fn resolve_stakes<L: StakeLedger + ?Sized>(
    ledger: &L,
    operators: &[OperatorId],
    min_stake: u128,
) -> Result<(BTreeMap<OperatorId, u128>, u128), LedgerError> {
    let mut stakes = BTreeMap::new();
    let mut total: u128 = 0;

    for id in operators {
        if stakes.contains_key(id) {
            continue;
        }
        let stake = operator_stake(ledger, id).await?;
        if stake > min_stake {
            stakes.insert(*id, stake);
            total = total.saturating_add(stake);
        } else {
            debug!(operator = %id, stake, min_stake, "operator below stake floor, excluded");
        }
    }

    Ok((stakes, total))
}

/// Sum the value custodied across all vaults the operator staked into
/// this service.
async fn operator_stake<L: StakeLedger + ?Sized>(
    ledger: &L,
    id: &OperatorId,
) -> Result<u128, LedgerError> {
    let mut stake: u128 = 0;
    for vault in ledger.vaults_staked(id).await? {
        // TODO: normalize vault assets to a single unit before summing;
        // today values from different underlying assets are added as-is.
        stake = stake.saturating_add(ledger.vault_assets(&vault).await?);
    }
    Ok(stake)
}
