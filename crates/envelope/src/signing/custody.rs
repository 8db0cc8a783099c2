use async_trait::async_trait;

use crate::algorithm::Algorithm;
use crate::key::KeyReference;

/// Public key metadata as returned by the custody service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustodyKey {
    pub kty: String,
    pub crv: String,
    pub x: Vec<u8>,
    pub y: Vec<u8>,
}

/// Remote service that holds private keys and signs on their behalf.
///
/// Implementations own transport, authentication, timeouts and retries.
/// The private key never leaves the service.
#[async_trait]
pub trait KeyCustody: Send + Sync {
    /// Current public key for `key`.
    async fn get_public_key(&self, key: &KeyReference) -> anyhow::Result<CustodyKey>;

    /// Raw signature over a precomputed digest.
    async fn sign_digest(
        &self,
        key: &KeyReference,
        alg: Algorithm,
        digest: &[u8],
    ) -> anyhow::Result<Vec<u8>>;
}
