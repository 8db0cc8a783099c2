//! COSE_Sign1 with an embedded payload, or in hash-envelope mode where the
//! message carries only a digest of content stored elsewhere.

mod header;
mod sign1;

use std::fmt;

use crate::algorithm::{Algorithm, PayloadHashAlgorithm};
use crate::error::{Error, Result};
use crate::signing::{RemoteSigningAgent, SigningConfiguration, VerifierConfiguration, resolve};

pub use header::{
    ALG, CONTENT_TYPE, CoseProtectedHeader, KID, PAYLOAD_HASH_ALG, PAYLOAD_LOCATION,
    PAYLOAD_PREIMAGE_CONTENT_TYPE,
};
pub use sign1::{COSE_SIGN1_TAG, CoseSign1, encode_signature1_sig_structure};

pub(crate) fn cbor_error<E: fmt::Display>(what: &'static str) -> impl Fn(E) -> Error {
    move |e| Error::malformed(format!("{what}: {e}"))
}

/// Signs COSE_Sign1 messages with a remote key.
#[derive(Clone)]
pub struct CoseSigner {
    agent: RemoteSigningAgent,
    config: SigningConfiguration,
}

impl CoseSigner {
    pub fn new(agent: RemoteSigningAgent, config: SigningConfiguration) -> Self {
        Self { agent, config }
    }

    /// Signs `payload` and embeds it in the message.
    pub async fn sign(&self, header: &CoseProtectedHeader, payload: &[u8]) -> Result<Vec<u8>> {
        if header.is_hash_envelope() {
            return Err(Error::malformed("hash envelope headers need sign_hash_envelope"));
        }
        self.sign_content(header, payload).await
    }

    /// Signs the digest of `payload`; the payload itself is not included.
    pub async fn sign_hash_envelope(
        &self,
        header: &CoseProtectedHeader,
        payload: &[u8],
    ) -> Result<Vec<u8>> {
        let hash_alg = header
            .payload_hash_alg
            .ok_or_else(|| Error::malformed("hash envelope needs a payload hash algorithm"))?;
        if header.payload_location.is_none() {
            return Err(Error::malformed("hash envelope needs a payload location"));
        }
        self.sign_content(header, &hash_alg.digest(payload)).await
    }

    async fn sign_content(&self, header: &CoseProtectedHeader, content: &[u8]) -> Result<Vec<u8>> {
        let signer_alg = Algorithm::from_jose_name(&self.config.algorithm)?;
        if header.alg != signer_alg {
            return Err(Error::AlgorithmMismatch {
                header: header.alg.to_string(),
                signer: self.config.algorithm.clone(),
            });
        }

        let protected = header.encode()?;
        let to_be_signed = encode_signature1_sig_structure(&protected, content)?;
        let signature = self.agent.sign_with(&self.config, &to_be_signed).await?;

        CoseSign1 {
            protected,
            header: header.clone(),
            payload: content.to_vec(),
            signature,
        }
        .to_bytes()
    }
}

/// A verified hash envelope. `digest` is what was signed; the content must
/// be fetched from `location` and checked with [`Self::matches_preimage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedHashEnvelope {
    pub digest: Vec<u8>,
    pub hash_algorithm: PayloadHashAlgorithm,
    pub preimage_content_type: Option<String>,
    pub location: String,
}

impl VerifiedHashEnvelope {
    pub fn matches_preimage(&self, content: &[u8]) -> bool {
        self.hash_algorithm.digest(content) == self.digest
    }
}

/// Verifies COSE_Sign1 against an explicit key or a key fetched from custody.
#[derive(Clone, Debug)]
pub struct CoseVerifier {
    config: VerifierConfiguration,
}

impl CoseVerifier {
    pub fn new(config: VerifierConfiguration) -> Self {
        Self { config }
    }

    /// Returns the verified payload: the content for direct messages, the
    /// digest for hash envelopes.
    pub async fn verify(&self, message: &[u8]) -> Result<Vec<u8>> {
        let message = CoseSign1::from_bytes(message)?;
        self.check_signature(&message).await?;
        Ok(message.payload)
    }

    pub async fn verify_hash_envelope(&self, message: &[u8]) -> Result<VerifiedHashEnvelope> {
        let message = CoseSign1::from_bytes(message)?;
        let hash_algorithm = message
            .header
            .payload_hash_alg
            .ok_or_else(|| Error::malformed("not a hash envelope: no payload hash algorithm"))?;
        let location = message
            .header
            .payload_location
            .clone()
            .ok_or_else(|| Error::malformed("not a hash envelope: no payload location"))?;
        if message.payload.len() != hash_algorithm.output_len() {
            return Err(Error::malformed(format!(
                "digest is {} bytes, expected {}",
                message.payload.len(),
                hash_algorithm.output_len()
            )));
        }

        self.check_signature(&message).await?;
        Ok(VerifiedHashEnvelope {
            hash_algorithm,
            location,
            preimage_content_type: message.header.preimage_content_type,
            digest: message.payload,
        })
    }

    async fn check_signature(&self, message: &CoseSign1) -> Result<()> {
        let public_key = resolve(&self.config).await?;
        public_key.verify(message.header.alg, &message.sig_structure()?, &message.signature)
    }
}
