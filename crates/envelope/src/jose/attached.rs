use super::{JoseHeader, JoseSigner, JoseVerifier, VerifiedJws, decode_segment, header_algorithm};
use crate::base64url;
use crate::error::{Error, Result};
use crate::signing::resolve;

impl JoseSigner {
    /// Produces `header.payload.signature` with the payload embedded.
    pub async fn sign_attached(&self, header: &JoseHeader, payload: &[u8]) -> Result<String> {
        self.check_algorithm(header)?;
        header.check_critical()?;
        if header.b64 == Some(false) {
            return Err(Error::malformed("b64: false requires detached signing"));
        }

        let signing_input = format!("{}.{}", header.encode()?, base64url::encode(payload));
        let signature = self.agent.sign_with(&self.config, signing_input.as_bytes()).await?;
        Ok(format!("{signing_input}.{}", base64url::encode(signature)))
    }
}

impl JoseVerifier {
    /// Verifies a compact JWS and returns its decoded header and payload.
    pub async fn verify_attached(&self, token: &str) -> Result<VerifiedJws> {
        let (signing_input, signature) = token
            .rsplit_once('.')
            .ok_or_else(|| Error::malformed("compact JWS needs three segments"))?;
        let (header_segment, payload_segment) = signing_input
            .split_once('.')
            .filter(|(_, payload)| !payload.contains('.'))
            .ok_or_else(|| Error::malformed("compact JWS needs three segments"))?;

        let header = JoseHeader::decode(header_segment)?;
        let alg = header_algorithm(&header)?;
        if header.b64 == Some(false) {
            return Err(Error::malformed("unencoded payload in compact JWS"));
        }
        let payload = decode_segment("payload", payload_segment)?;
        let signature = decode_segment("signature", signature)?;

        let public_key = resolve(&self.config).await?;
        public_key.verify(alg, signing_input.as_bytes(), &signature)?;

        Ok(VerifiedJws { header, payload })
    }
}
