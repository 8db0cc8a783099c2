//! HTTP client for the Key Vault keys API

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::{Client, StatusCode, header};

use remote_envelope::{Algorithm, CustodyKey, KeyCustody, KeyReference};

use crate::error::{KeyVaultError, Result};
use crate::types::{KeyBundle, KeyVaultConfig, SignRequest, SignResult};

/// Key custody backed by Azure Key Vault.
///
/// Keys are addressed by the vault URL and key name taken from the
/// reference. Both calls go to the key's current version, so a rotated
/// key is picked up without changing the reference.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use keyvault_custody::{KeyVaultClient, KeyVaultConfig};
/// use remote_envelope::{JoseHeader, JoseSigner, KeyReference, RemoteSigningAgent, SigningConfiguration};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = KeyVaultClient::new(KeyVaultConfig {
///     bearer_token: Some("<token>".into()),
///     ..Default::default()
/// })?;
/// let key = KeyReference::parse("https://myvault.vault.azure.net/keys/release-signer")?;
/// let signer = JoseSigner::new(
///     RemoteSigningAgent::new(Arc::new(client)),
///     SigningConfiguration::es256(key),
/// );
/// let _token = signer.sign_attached(&JoseHeader::new("ES256"), b"hello").await?;
/// # Ok(())
/// # }
/// ```
pub struct KeyVaultClient {
    config: KeyVaultConfig,
    client: Client,
}

impl KeyVaultClient {
    pub fn new(config: KeyVaultConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = config.bearer_token {
            let value = header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| KeyVaultError::InvalidToken)?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn key_url(&self, key: &KeyReference) -> String {
        format!("{}/keys/{}", key.endpoint().trim_end_matches('/'), key.name())
    }

    /// Current public key for `key`.
    pub async fn get_key(&self, key: &KeyReference) -> Result<CustodyKey> {
        let response = self
            .client
            .get(self.key_url(key))
            .query(&[("api-version", self.config.api_version.as_str())])
            .send()
            .await?;
        let bundle: KeyBundle = self.handle_response(key, response).await?;

        let jwk = bundle.key;
        let kty = match jwk.kty.as_str() {
            "EC" | "EC-HSM" => "EC".to_string(),
            other => {
                return Err(KeyVaultError::InvalidResponse(format!(
                    "key {} has kty {other}, expected EC",
                    key.name()
                )));
            }
        };
        let (Some(crv), Some(x), Some(y)) = (jwk.crv, jwk.x, jwk.y) else {
            return Err(KeyVaultError::InvalidResponse(format!(
                "key {} is missing crv, x or y",
                key.name()
            )));
        };

        Ok(CustodyKey {
            kty,
            crv,
            x: URL_SAFE_NO_PAD.decode(x)?,
            y: URL_SAFE_NO_PAD.decode(y)?,
        })
    }

    /// Signs a precomputed digest with the current version of `key`.
    pub async fn sign(&self, key: &KeyReference, alg: Algorithm, digest: &[u8]) -> Result<Vec<u8>> {
        let request = SignRequest {
            alg: alg.jose_name().to_string(),
            value: URL_SAFE_NO_PAD.encode(digest),
        };
        let response = self
            .client
            .post(format!("{}/sign", self.key_url(key)))
            .query(&[("api-version", self.config.api_version.as_str())])
            .json(&request)
            .send()
            .await?;
        let result: SignResult = self.handle_response(key, response).await?;

        tracing::debug!(key = %key, signed_by = ?result.kid, "key vault signature received");
        Ok(URL_SAFE_NO_PAD.decode(result.value)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        key: &KeyReference,
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status() == StatusCode::NOT_FOUND {
            return Err(KeyVaultError::NotFound(key.to_string()));
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(KeyVaultError::Server { status, message });
        }

        let body = response.json().await?;
        Ok(body)
    }
}

#[async_trait]
impl KeyCustody for KeyVaultClient {
    async fn get_public_key(&self, key: &KeyReference) -> anyhow::Result<CustodyKey> {
        Ok(self.get_key(key).await?)
    }

    async fn sign_digest(
        &self,
        key: &KeyReference,
        alg: Algorithm,
        digest: &[u8],
    ) -> anyhow::Result<Vec<u8>> {
        Ok(self.sign(key, alg, digest).await?)
    }
}
