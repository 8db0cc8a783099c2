use std::fmt;
use std::str::FromStr;

use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::ecdsa::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::algorithm::{Algorithm, algorithm_for_curve};
use crate::base64url;
use crate::error::{Error, Result};
use crate::signing::CustodyKey;

const KEYS_SEGMENT: &str = "/keys/";
const P256_COORDINATE_LEN: usize = 32;

/// Address of a key in the custody service:
/// `<serviceEndpoint>/keys/<keyName>[/<version>]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyReference {
    raw: String,
    endpoint_len: usize,
    name_start: usize,
    name_len: usize,
}

impl KeyReference {
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let invalid = || Error::InvalidKeyReference(raw.clone());

        let (endpoint, key_path) = raw.split_once(KEYS_SEGMENT).ok_or_else(invalid)?;
        if endpoint.is_empty() {
            return Err(invalid());
        }

        let mut segments = key_path.split('/');
        let name = segments.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        match (segments.next(), segments.next()) {
            (None, _) => {}
            (Some(version), None) if !version.is_empty() => {}
            _ => return Err(invalid()),
        }

        let endpoint_len = endpoint.len();
        let name_len = name.len();
        Ok(Self {
            endpoint_len,
            name_start: endpoint_len + KEYS_SEGMENT.len(),
            name_len,
            raw,
        })
    }

    /// Base URL of the custody service.
    pub fn endpoint(&self) -> &str {
        &self.raw[..self.endpoint_len]
    }

    pub fn name(&self) -> &str {
        &self.raw[self.name_start..self.name_start + self.name_len]
    }

    /// Pinned key version, when the reference carries one.
    pub fn version(&self) -> Option<&str> {
        let rest = &self.raw[self.name_start + self.name_len..];
        rest.strip_prefix('/')
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for KeyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for KeyReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for KeyReference {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(raw)
    }
}

impl From<KeyReference> for String {
    fn from(reference: KeyReference) -> Self {
        reference.raw
    }
}

/// An elliptic-curve public key in JWK form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyMaterial {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    pub kty: String,
    pub crv: String,
    pub alg: String,
    #[serde(with = "base64url::bytes")]
    pub x: Vec<u8>,
    #[serde(with = "base64url::bytes")]
    pub y: Vec<u8>,
}

impl PublicKeyMaterial {
    /// Composes key material from custody metadata, deriving `alg` from the curve.
    pub fn from_custody(reference: &KeyReference, key: CustodyKey) -> Result<Self> {
        let alg = algorithm_for_curve(&key.crv)?;
        Ok(Self {
            kid: Some(reference.to_string()),
            kty: key.kty,
            crv: key.crv,
            alg: alg.jose_name().to_string(),
            x: key.x,
            y: key.y,
        })
    }

    pub fn algorithm(&self) -> Result<Algorithm> {
        Algorithm::from_jose_name(&self.alg)
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        if self.kty != "EC" {
            return Err(Error::InvalidPublicKey(format!("unexpected kty {}", self.kty)));
        }
        algorithm_for_curve(&self.crv)?;
        if self.x.len() != P256_COORDINATE_LEN || self.y.len() != P256_COORDINATE_LEN {
            return Err(Error::InvalidPublicKey(format!(
                "expected {P256_COORDINATE_LEN}-byte coordinates, got x={} y={}",
                self.x.len(),
                self.y.len()
            )));
        }

        let mut sec1 = Vec::with_capacity(1 + 2 * P256_COORDINATE_LEN);
        sec1.push(0x04);
        sec1.extend_from_slice(&self.x);
        sec1.extend_from_slice(&self.y);
        VerifyingKey::from_sec1_bytes(&sec1)
            .map_err(|e| Error::InvalidPublicKey(format!("point is not on {}: {e}", self.crv)))
    }

    /// Checks a raw `r || s` signature over `message` under `alg`.
    ///
    /// The digest is computed here, mirroring what the signing side sends
    /// to the custody service.
    pub fn verify(&self, alg: Algorithm, message: &[u8], signature: &[u8]) -> Result<()> {
        let key_alg = self.algorithm()?;
        if key_alg != alg {
            return Err(Error::UnsupportedAlgorithm(format!(
                "{alg} envelope with {key_alg} key"
            )));
        }

        let verifying_key = self.verifying_key()?;
        let digest = Sha256::digest(message);
        let verified = Signature::from_slice(signature)
            .ok()
            .and_then(|signature| verifying_key.verify_prehash(&digest, &signature).ok());

        match verified {
            Some(()) => Ok(()),
            None => {
                tracing::warn!(kid = ?self.kid, %alg, "signature verification failed");
                Err(Error::SignatureVerificationFailure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reference_without_version() {
        let reference = KeyReference::parse("https://vault.example.net/keys/signer").unwrap();
        assert_eq!(reference.endpoint(), "https://vault.example.net");
        assert_eq!(reference.name(), "signer");
        assert_eq!(reference.version(), None);
    }

    #[test]
    fn parses_reference_with_version() {
        let reference =
            KeyReference::parse("https://vault.example.net/keys/signer/0123abcd").unwrap();
        assert_eq!(reference.name(), "signer");
        assert_eq!(reference.version(), Some("0123abcd"));
        assert_eq!(reference.as_str(), "https://vault.example.net/keys/signer/0123abcd");
    }

    #[test]
    fn rejects_malformed_references() {
        for raw in [
            "https://vault.example.net/secrets/signer",
            "/keys/signer",
            "https://vault.example.net/keys/",
            "https://vault.example.net/keys/signer/",
            "https://vault.example.net/keys/signer/v1/extra",
            "https://vault.example.net/keys//v1",
        ] {
            assert!(
                matches!(KeyReference::parse(raw), Err(Error::InvalidKeyReference(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn reference_serializes_as_string() {
        let reference = KeyReference::parse("https://vault.example.net/keys/signer").unwrap();
        let json = serde_json::to_string(&reference).unwrap();
        assert_eq!(json, r#""https://vault.example.net/keys/signer""#);
        let back: KeyReference = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reference);
        assert!(serde_json::from_str::<KeyReference>(r#""not a key""#).is_err());
    }

    #[test]
    fn custody_key_with_unknown_curve_is_rejected() {
        let reference = KeyReference::parse("https://vault.example.net/keys/signer").unwrap();
        let key = CustodyKey {
            kty: "EC".into(),
            crv: "P-384".into(),
            x: vec![0; 48],
            y: vec![0; 48],
        };
        assert!(matches!(
            PublicKeyMaterial::from_custody(&reference, key),
            Err(Error::UnsupportedCurve(crv)) if crv == "P-384"
        ));
    }

    #[test]
    fn jwk_wire_form_uses_base64url_coordinates() {
        let material = PublicKeyMaterial {
            kid: None,
            kty: "EC".into(),
            crv: "P-256".into(),
            alg: "ES256".into(),
            x: vec![0xff; 32],
            y: vec![0x00; 32],
        };
        let value = serde_json::to_value(&material).unwrap();
        assert_eq!(value["x"], base64url::encode([0xff; 32]));
        assert!(value.get("kid").is_none());
    }

    #[test]
    fn short_coordinates_are_invalid() {
        let material = PublicKeyMaterial {
            kid: None,
            kty: "EC".into(),
            crv: "P-256".into(),
            alg: "ES256".into(),
            x: vec![1; 31],
            y: vec![1; 32],
        };
        assert!(matches!(material.verifying_key(), Err(Error::InvalidPublicKey(_))));
    }
}
