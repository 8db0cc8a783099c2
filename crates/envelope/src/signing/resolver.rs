use std::fmt;
use std::sync::Arc;

use super::custody::KeyCustody;
use crate::error::{Error, Result};
use crate::key::{KeyReference, PublicKeyMaterial};

/// Where a verifier gets its public key from.
#[derive(Clone)]
pub enum VerifierConfiguration {
    /// Verify against this key; no custody call is made.
    ExplicitKey(PublicKeyMaterial),
    /// Fetch the current key for `key_reference` on every verification.
    KeyReferenceLookup {
        key_reference: KeyReference,
        custody: Arc<dyn KeyCustody>,
    },
}

impl VerifierConfiguration {
    pub fn explicit(public_key: PublicKeyMaterial) -> Self {
        Self::ExplicitKey(public_key)
    }

    pub fn lookup(key_reference: KeyReference, custody: Arc<dyn KeyCustody>) -> Self {
        Self::KeyReferenceLookup {
            key_reference,
            custody,
        }
    }

    /// Builds a configuration from loosely supplied inputs such as CLI flags.
    pub fn from_parts(
        public_key: Option<PublicKeyMaterial>,
        key_reference: Option<KeyReference>,
        custody: Option<Arc<dyn KeyCustody>>,
    ) -> Result<Self> {
        match (public_key, key_reference, custody) {
            (Some(_), Some(_), _) => Err(Error::ConflictingVerifierCredentials),
            (Some(public_key), None, _) => Ok(Self::explicit(public_key)),
            (None, Some(key_reference), Some(custody)) => Ok(Self::lookup(key_reference, custody)),
            (None, _, _) => Err(Error::MissingVerifierCredentials),
        }
    }
}

impl fmt::Debug for VerifierConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExplicitKey(key) => f.debug_tuple("ExplicitKey").field(key).finish(),
            Self::KeyReferenceLookup { key_reference, .. } => f
                .debug_struct("KeyReferenceLookup")
                .field("key_reference", key_reference)
                .finish_non_exhaustive(),
        }
    }
}

/// Resolves the public key a verifier should check signatures against.
pub async fn resolve(config: &VerifierConfiguration) -> Result<PublicKeyMaterial> {
    match config {
        VerifierConfiguration::ExplicitKey(public_key) => Ok(public_key.clone()),
        VerifierConfiguration::KeyReferenceLookup {
            key_reference,
            custody,
        } => fetch_public_key(custody.as_ref(), key_reference).await,
    }
}

/// Fetches the current public key for `key` from the custody service.
pub async fn fetch_public_key(
    custody: &dyn KeyCustody,
    key: &KeyReference,
) -> Result<PublicKeyMaterial> {
    tracing::debug!(key = %key, "fetching public key");
    let custody_key = custody
        .get_public_key(key)
        .await
        .map_err(|e| Error::key_resolution(key, e))?;
    PublicKeyMaterial::from_custody(key, custody_key)
}
