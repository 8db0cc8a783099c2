use std::sync::Arc;

use sha2::{Digest, Sha256};

use super::custody::KeyCustody;
use crate::algorithm::Algorithm;
use crate::error::{Error, Result};
use crate::key::KeyReference;

/// Which remote key signs, and with which algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningConfiguration {
    pub key_reference: KeyReference,
    pub algorithm: String,
}

impl SigningConfiguration {
    pub fn new(key_reference: KeyReference, algorithm: impl Into<String>) -> Self {
        Self {
            key_reference,
            algorithm: algorithm.into(),
        }
    }

    pub fn es256(key_reference: KeyReference) -> Self {
        Self::new(key_reference, Algorithm::Es256.jose_name())
    }
}

/// Produces signatures with keys held by the custody service.
///
/// The digest is computed locally and only the digest crosses the wire.
/// Holds no state between calls, so one agent can be shared across tasks.
#[derive(Clone)]
pub struct RemoteSigningAgent {
    custody: Arc<dyn KeyCustody>,
}

impl RemoteSigningAgent {
    pub fn new(custody: Arc<dyn KeyCustody>) -> Self {
        Self { custody }
    }

    /// Signs `message` and returns the custody service's signature bytes as received.
    pub async fn sign(&self, key: &KeyReference, algorithm: &str, message: &[u8]) -> Result<Vec<u8>> {
        let alg = Algorithm::from_jose_name(algorithm)?;
        let digest = Sha256::digest(message);

        tracing::debug!(key = %key, %alg, "requesting remote signature");
        self.custody
            .sign_digest(key, alg, &digest)
            .await
            .map_err(|e| Error::key_signing(key, e))
    }

    pub async fn sign_with(&self, config: &SigningConfiguration, message: &[u8]) -> Result<Vec<u8>> {
        self.sign(&config.key_reference, &config.algorithm, message).await
    }
}
