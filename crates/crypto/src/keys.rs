//! Signing keypair generation and file persistence.

use std::fs;
use std::path::Path;

use ed25519_dalek::{Signature, Signer, SigningKey};
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::{debug, info};

use quorus_core::OperatorId;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("failed to read key file: {0}")]
    Read(String),
    #[error("failed to write key file: {0}")]
    Write(String),
    #[error("key file is not a 32-byte ed25519 secret")]
    InvalidFormat,
}

/// An ed25519 signing keypair. The public half doubles as the operator's
/// network identity.
pub struct SigningKeypair {
    signing_key: SigningKey,
}

impl SigningKeypair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn operator_id(&self) -> OperatorId {
        OperatorId::new(self.public_bytes())
    }

    pub fn sign(&self, data: &[u8]) -> [u8; 64] {
        let signature: Signature = self.signing_key.sign(data);
        signature.to_bytes()
    }
}

/// Load a keypair from `path`, or generate and persist one if the file
/// does not exist.
pub fn load_or_generate_keypair(path: &Path) -> Result<SigningKeypair, KeyError> {
    if path.exists() {
        debug!("loading keypair from {}", path.display());
        let bytes = fs::read(path).map_err(|e| KeyError::Read(e.to_string()))?;
        let secret: [u8; 32] = bytes.try_into().map_err(|_| KeyError::InvalidFormat)?;
        Ok(SigningKeypair::from_secret_bytes(&secret))
    } else {
        info!("generating new keypair at {}", path.display());
        let keypair = SigningKeypair::generate();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| KeyError::Write(e.to_string()))?;
        }
        fs::write(path, keypair.secret_bytes()).map_err(|e| KeyError::Write(e.to_string()))?;
        Ok(keypair)
    }
}
