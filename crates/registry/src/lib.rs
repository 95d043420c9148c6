//! Quorus Registry
//!
//! Operator registry with snapshot semantics. Callers never read the live
//! set: every dispatch consumes an explicit [`RegistrySnapshot`] carrying
//! an epoch counter, so concurrent polls can tell which registry state
//! they were served. The set is append-only from the aggregation core's
//! point of view; de-registration is a separate subsystem.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::info;

use quorus_core::{Operator, OperatorId};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("registry lock poisoned")]
    Poisoned,
}

/// A point-in-time view of the registry. Operators are in registration
/// order; the epoch increments on every mutation.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub epoch: u64,
    pub operators: Vec<Operator>,
}

impl RegistrySnapshot {
    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }
}

#[derive(Default)]
struct Inner {
    epoch: u64,
    operators: Vec<Operator>,
    known: HashSet<OperatorId>,
}

/// Shared handle to the operator registry.
#[derive(Clone, Default)]
pub struct OperatorRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operator. Returns `true` if it was newly added.
    /// Registering the same identity twice is a no-op.
    pub fn register(&self, operator: Operator) -> Result<bool, RegistryError> {
        let mut inner = self.inner.write().map_err(|_| RegistryError::Poisoned)?;
        if !inner.known.insert(operator.id) {
            info!(operator = %operator.id, "operator already registered");
            return Ok(false);
        }
        info!(operator = %operator.id, endpoint = %operator.endpoint, "operator registered");
        inner.operators.push(operator);
        inner.epoch += 1;
        Ok(true)
    }

    pub fn is_registered(&self, id: &OperatorId) -> Result<bool, RegistryError> {
        let inner = self.inner.read().map_err(|_| RegistryError::Poisoned)?;
        Ok(inner.known.contains(id))
    }

    /// Take a point-in-time snapshot for one dispatch.
    pub fn snapshot(&self) -> Result<RegistrySnapshot, RegistryError> {
        let inner = self.inner.read().map_err(|_| RegistryError::Poisoned)?;
        Ok(RegistrySnapshot {
            epoch: inner.epoch,
            operators: inner.operators.clone(),
        })
    }
}
