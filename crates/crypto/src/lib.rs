//! Quorus Crypto
//!
//! ed25519 keys and detached-signature handling for operator responses.
//! No dependency on any network or chain code.

pub mod keys;
pub mod sign;

pub use keys::{load_or_generate_keypair, KeyError, SigningKeypair};
pub use sign::{canonical_task_bytes, sign_response, verify_response};
