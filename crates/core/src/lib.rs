//! Quorus Core
//!
//! Shared domain types for the Quorus task network: operator identities,
//! tasks discovered from the chain, signed operator responses, and the
//! generic HTTP envelope used on the operator wire.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid operator id: {0}")]
    InvalidOperatorId(String),
}

/// Operator identity: a 32-byte ed25519 verifying key.
///
/// Rendered as `0x`-prefixed lowercase hex on the wire and in logs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperatorId([u8; 32]);

impl OperatorId {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for OperatorId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex_part = s.strip_prefix("0x").unwrap_or(s);
        let bytes =
            hex::decode(hex_part).map_err(|e| CoreError::InvalidOperatorId(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidOperatorId("expected 32 bytes".into()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for OperatorId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OperatorId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A unit of work for the operators.
///
/// The computation itself is pluggable on the operator side; the network
/// only cares that it is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub value: u64,
}

/// A task discovered from the task source, tagged with the block it was
/// emitted in. `block_number` is the unit of checkpointing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    pub task: Task,
    pub block_number: u64,
}

/// An operator's answer to a task. The operator signs the canonical JSON
/// encoding of this struct, so every field participates in the signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTask {
    pub value: u64,
    pub response: u128,
    pub completed_at: DateTime<Utc>,
}

/// A completed task plus the detached signature binding it to an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedResponse {
    pub completed_task: CompletedTask,
    pub operator_id: OperatorId,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
}

/// A registered operator. Uniqueness key is the identity; the endpoint is
/// where `POST {endpoint}/task` is served.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operator {
    pub id: OperatorId,
    pub endpoint: Url,
}

/// Generic success/failure envelope wrapping every operator HTTP response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse<T> {
    pub success: bool,
    pub message: String,
    pub response_object: Option<T>,
}

impl<T> ServiceResponse<T> {
    pub fn ok(message: impl Into<String>, object: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            response_object: Some(object),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            response_object: None,
        }
    }
}

/// Serde helper: byte vectors as `0x`-prefixed hex strings.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}
