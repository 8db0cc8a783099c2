use std::error::Error as StdError;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("unsupported curve: {0}")]
    UnsupportedCurve(String),
    #[error("detached jws requires b64: false and crit[b64] in header")]
    DetachedHeaderContractViolation,
    #[error("verifier requires a public key, or a key reference and custody access")]
    MissingVerifierCredentials,
    #[error("verifier was given both a public key and a key reference")]
    ConflictingVerifierCredentials,
    #[error("failed to resolve public key for {key}: {source}")]
    KeyResolutionFailure {
        key: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to sign with {key}: {source}")]
    KeySigningFailure {
        key: String,
        #[source]
        source: BoxError,
    },
    #[error("signature verification failed")]
    SignatureVerificationFailure,
    #[error("invalid key reference: {0}")]
    InvalidKeyReference(String),
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("header alg {header} does not match signer algorithm {signer}")]
    AlgorithmMismatch { header: String, signer: String },
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
}

impl Error {
    pub(crate) fn key_resolution(key: impl ToString, source: anyhow::Error) -> Self {
        Self::KeyResolutionFailure {
            key: key.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn key_signing(key: impl ToString, source: anyhow::Error) -> Self {
        Self::KeySigningFailure {
            key: key.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEnvelope(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
