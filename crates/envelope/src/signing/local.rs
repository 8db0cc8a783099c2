use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use p256::ecdsa::{Signature, SigningKey, signature::hazmat::PrehashSigner};
use sha2::{Digest, Sha256};

use super::custody::{CustodyKey, KeyCustody};
use crate::algorithm::Algorithm;
use crate::key::KeyReference;

/// In-process custody holding P-256 keys, addressed by key name.
///
/// Each key is created from a seed string: the SHA-256 hash of the seed
/// becomes the 32-byte private key. Useful offline and as a test double;
/// it counts the calls made to it.
#[derive(Default)]
pub struct LocalCustody {
    keys: HashMap<String, SigningKey>,
    sign_calls: AtomicU32,
    key_fetches: AtomicU32,
}

impl LocalCustody {
    pub fn from_seed(name: &str, seed: &str) -> Result<Self> {
        Self::default().with_key(name, seed)
    }

    pub fn with_key(mut self, name: &str, seed: &str) -> Result<Self> {
        let hash = Sha256::digest(seed.as_bytes());
        let signing_key = SigningKey::from_bytes(&hash)
            .map_err(|e| anyhow!("invalid seed for {name}: {e}"))?;
        self.keys.insert(name.to_string(), signing_key);
        Ok(self)
    }

    /// Number of `sign_digest` calls received, including failed ones.
    pub fn sign_calls(&self) -> u32 {
        self.sign_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_public_key` calls received, including failed ones.
    pub fn key_fetches(&self) -> u32 {
        self.key_fetches.load(Ordering::SeqCst)
    }

    fn key(&self, reference: &KeyReference) -> Result<&SigningKey> {
        self.keys
            .get(reference.name())
            .ok_or_else(|| anyhow!("key {} not found", reference.name()))
    }
}

#[async_trait]
impl KeyCustody for LocalCustody {
    async fn get_public_key(&self, key: &KeyReference) -> Result<CustodyKey> {
        self.key_fetches.fetch_add(1, Ordering::SeqCst);

        let point = self.key(key)?.verifying_key().to_encoded_point(false);
        let (Some(x), Some(y)) = (point.x(), point.y()) else {
            bail!("key {} has no affine coordinates", key.name());
        };
        Ok(CustodyKey {
            kty: "EC".to_string(),
            crv: "P-256".to_string(),
            x: x.to_vec(),
            y: y.to_vec(),
        })
    }

    async fn sign_digest(&self, key: &KeyReference, alg: Algorithm, digest: &[u8]) -> Result<Vec<u8>> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);

        match alg {
            Algorithm::Es256 => {
                let signature: Signature = self
                    .key(key)?
                    .sign_prehash(digest)
                    .map_err(|e| anyhow!("p256 sign_prehash failed: {e}"))?;
                Ok(signature.to_bytes().to_vec())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(name: &str) -> KeyReference {
        KeyReference::parse(format!("https://local/keys/{name}")).unwrap()
    }

    #[tokio::test]
    async fn deterministic_signing() {
        let custody = LocalCustody::from_seed("k", "test-seed").unwrap();
        let digest = Sha256::digest(b"hello");
        let sig1 = custody.sign_digest(&reference("k"), Algorithm::Es256, &digest).await.unwrap();
        let sig2 = custody.sign_digest(&reference("k"), Algorithm::Es256, &digest).await.unwrap();
        assert_eq!(sig1, sig2);
        assert_eq!(custody.sign_calls(), 2);
    }

    #[tokio::test]
    async fn different_seeds_produce_different_keys() {
        let custody = LocalCustody::from_seed("a", "seed-a")
            .unwrap()
            .with_key("b", "seed-b")
            .unwrap();
        let key_a = custody.get_public_key(&reference("a")).await.unwrap();
        let key_b = custody.get_public_key(&reference("b")).await.unwrap();
        assert_ne!(key_a, key_b);
    }

    #[tokio::test]
    async fn coordinates_are_32_bytes() {
        let custody = LocalCustody::from_seed("k", "test-seed").unwrap();
        let key = custody.get_public_key(&reference("k")).await.unwrap();
        assert_eq!(key.x.len(), 32);
        assert_eq!(key.y.len(), 32);
        assert_eq!(key.crv, "P-256");
    }

    #[tokio::test]
    async fn signature_is_64_bytes() {
        let custody = LocalCustody::from_seed("k", "test-seed").unwrap();
        let digest = Sha256::digest(b"data");
        let sig = custody.sign_digest(&reference("k"), Algorithm::Es256, &digest).await.unwrap();
        assert_eq!(sig.len(), 64);
    }

    #[tokio::test]
    async fn unknown_key_name_fails() {
        let custody = LocalCustody::from_seed("k", "test-seed").unwrap();
        assert!(custody.get_public_key(&reference("missing")).await.is_err());
        assert_eq!(custody.key_fetches(), 1);
    }
}
