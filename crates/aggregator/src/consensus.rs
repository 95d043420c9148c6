//! Stake-weighted consensus over operator answers.
//!
//! Single-round, non-slashing aggregation: unverifiable signatures are
//! excluded, surviving responders' stakes are resolved fresh, and a
//! value wins only with strictly more than half of the total included
//! stake behind it.

use std::collections::BTreeMap;

use tracing::debug;

use quorus_core::{OperatorId, SignedResponse};
use quorus_crypto::verify_response;
use quorus_ledger::StakeLedger;

use crate::stake::resolve_stakes;
use crate::AggregatorError;

/// Decide the canonical answer for one task from the gathered responses.
///
/// Any positive stake counts (`min_stake = 0`); stakes are queried fresh
/// because they can change between tasks.
pub async fn resolve<L: StakeLedger + ?Sized>(
    ledger: &L,
    responses: &[SignedResponse],
) -> Result<u128, AggregatorError> {
    let verified: Vec<&SignedResponse> = responses.iter().filter(|r| verify_response(r)).collect();
    if verified.len() < responses.len() {
        debug!(
            discarded = responses.len() - verified.len(),
            "responses with unverifiable signatures excluded"
        );
    }
    if verified.is_empty() {
        return Err(AggregatorError::NoResponses);
    }

    let responders: Vec<OperatorId> = verified.iter().map(|r| r.operator_id).collect();
    let (stakes, total_stake) = resolve_stakes(ledger, &responders, 0)
        .await
        .map_err(AggregatorError::Stake)?;

    let tally = tally(verified.iter().copied(), &stakes);
    winner(&tally, total_stake).ok_or(AggregatorError::NoMajority)
}

/// Accumulate stake per distinct response value.
pub fn tally<'a>(
    responses: impl IntoIterator<Item = &'a SignedResponse>,
    stakes: &BTreeMap<OperatorId, u128>,
) -> BTreeMap<u128, u128> {
    let mut buckets: BTreeMap<u128, u128> = BTreeMap::new();
    for response in responses {
        let Some(stake) = stakes.get(&response.operator_id) else {
            // Zero-stake responders were excluded during resolution.
            continue;
        };
        let bucket = buckets.entry(response.completed_task.response).or_insert(0);
        *bucket = bucket.saturating_add(*stake);
    }
    buckets
}

/// The value holding a strict majority of `total_stake`, if any.
///
/// Ties between max-stake buckets go to the smallest response value
/// (ascending map order, first bucket reaching the max kept). The choice
/// cannot affect correctness: a tie means neither bucket can exceed half
/// of the total.
pub fn winner(tally: &BTreeMap<u128, u128>, total_stake: u128) -> Option<u128> {
    let mut best: Option<(u128, u128)> = None;
    for (&value, &stake) in tally {
        if best.map_or(true, |(_, best_stake)| stake > best_stake) {
            best = Some((value, stake));
        }
    }
    let (value, stake) = best?;
    if stake > total_stake / 2 {
        Some(value)
    } else {
        None
    }
}
