use super::{JoseHeader, JoseSigner, JoseVerifier, decode_segment, header_algorithm};
use crate::base64url;
use crate::error::{Error, Result};
use crate::signing::resolve;

/// A detached JWS as presented for verification, with the payload supplied
/// out-of-band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedJws {
    pub protected: String,
    pub payload: Vec<u8>,
    pub signature: String,
}

impl DetachedJws {
    /// Splits a `header..signature` token and pairs it with `payload`.
    pub fn from_token(token: &str, payload: impl Into<Vec<u8>>) -> Result<Self> {
        let (protected, signature) = token
            .split_once("..")
            .filter(|(protected, signature)| {
                !protected.is_empty()
                    && !signature.is_empty()
                    && !protected.contains('.')
                    && !signature.contains('.')
            })
            .ok_or_else(|| Error::malformed("detached JWS must be header..signature"))?;

        Ok(Self {
            protected: protected.to_string(),
            payload: payload.into(),
            signature: signature.to_string(),
        })
    }
}

/// `base64url(header) || "." || payload`, with the payload left unencoded.
fn signing_input(protected: &str, payload: &[u8]) -> Vec<u8> {
    let mut input = Vec::with_capacity(protected.len() + 1 + payload.len());
    input.extend_from_slice(protected.as_bytes());
    input.push(b'.');
    input.extend_from_slice(payload);
    input
}

impl JoseSigner {
    /// Produces `header..signature`; the payload is signed but not embedded.
    pub async fn sign_detached(&self, header: &JoseHeader, payload: &[u8]) -> Result<String> {
        if !header.is_detached() {
            return Err(Error::DetachedHeaderContractViolation);
        }
        self.check_algorithm(header)?;
        header.check_critical()?;

        let protected = header.encode()?;
        let signature = self
            .agent
            .sign_with(&self.config, &signing_input(&protected, payload))
            .await?;
        Ok(format!("{protected}..{}", base64url::encode(signature)))
    }
}

impl JoseVerifier {
    /// Verifies a detached JWS and echoes back the supplied payload.
    pub async fn verify_detached(&self, jws: &DetachedJws) -> Result<Vec<u8>> {
        let header = JoseHeader::decode(&jws.protected)?;
        if !header.is_detached() {
            return Err(Error::DetachedHeaderContractViolation);
        }
        let alg = header_algorithm(&header)?;
        let signature = decode_segment("signature", &jws.signature)?;

        let public_key = resolve(&self.config).await?;
        public_key.verify(alg, &signing_input(&jws.protected, &jws.payload), &signature)?;

        Ok(jws.payload.clone())
    }
}
