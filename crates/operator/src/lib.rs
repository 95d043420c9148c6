//! Quorus Operator
//!
//! Operator-side node: executes tasks with a pluggable deterministic
//! executor, signs the completed task with the operator's key, and serves
//! the result over `POST /task`. Optionally announces itself to an
//! aggregator on startup.

pub mod executor;
pub mod register;
pub mod server;

pub use executor::{SquareExecutor, TaskExecutor};
pub use server::{task_router, OperatorState};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("settings error: {0}")]
    Settings(#[from] quorus_settings::SettingsError),
    #[error("key error: {0}")]
    Key(#[from] quorus_crypto::KeyError),
    #[error("registration failed: {0}")]
    Register(String),
    #[error("server error: {0}")]
    Server(String),
}
