//! JWS and COSE_Sign1 envelopes whose signatures come from keys held in a
//! remote custody service.
//!
//! The custody service is reached through [`KeyCustody`]; everything else
//! (signing input construction, key resolution, verification) happens here.

pub mod algorithm;
pub mod base64url;
pub mod cose;
pub mod error;
pub mod jose;
pub mod key;
pub mod signing;

pub use algorithm::{Algorithm, PayloadHashAlgorithm, algorithm_for_curve};
pub use cose::{CoseProtectedHeader, CoseSign1, CoseSigner, CoseVerifier, VerifiedHashEnvelope};
pub use error::{Error, Result};
pub use jose::{DetachedJws, JoseHeader, JoseSigner, JoseVerifier, VerifiedJws};
pub use key::{KeyReference, PublicKeyMaterial};
pub use signing::{
    CustodyKey, KeyCustody, LocalCustody, RemoteSigningAgent, SigningConfiguration,
    VerifierConfiguration, fetch_public_key, resolve,
};
