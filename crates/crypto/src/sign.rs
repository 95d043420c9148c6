//! Canonical serialization and detached sign/verify of task responses.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use quorus_core::{CompletedTask, SignedResponse};

use crate::keys::SigningKeypair;

/// The canonical byte representation of a completed task: its JSON
/// encoding. Struct field order is fixed, so the bytes are deterministic
/// for a given value.
pub fn canonical_task_bytes(task: &CompletedTask) -> Vec<u8> {
    // Serialization of this struct cannot fail.
    serde_json::to_vec(task).unwrap_or_default()
}

/// Sign a completed task, producing the wire-ready response.
pub fn sign_response(keypair: &SigningKeypair, completed_task: CompletedTask) -> SignedResponse {
    let signature = keypair.sign(&canonical_task_bytes(&completed_task));
    SignedResponse {
        completed_task,
        operator_id: keypair.operator_id(),
        signature: signature.to_vec(),
    }
}

/// Verify that a response was signed by its claimed operator identity.
///
/// Pure and total: malformed keys or signatures yield `false`, never an
/// error. A verification failure is data, not a fault.
pub fn verify_response(response: &SignedResponse) -> bool {
    let verifying_key = match VerifyingKey::from_bytes(response.operator_id.as_bytes()) {
        Ok(vk) => vk,
        Err(_) => return false,
    };

    let signature = match Signature::from_slice(&response.signature) {
        Ok(sig) => sig,
        Err(_) => return false,
    };

    verifying_key
        .verify(&canonical_task_bytes(&response.completed_task), &signature)
        .is_ok()
}
