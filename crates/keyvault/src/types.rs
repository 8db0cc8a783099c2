//! Key Vault configuration and REST payloads

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_VERSION: &str = "7.4";

/// Client configuration
#[derive(Debug, Clone)]
pub struct KeyVaultConfig {
    /// Bearer token for the vault audience. Acquiring it is the caller's job.
    pub bearer_token: Option<String>,
    /// REST API version sent as `api-version`
    pub api_version: String,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

impl Default for KeyVaultConfig {
    fn default() -> Self {
        Self {
            bearer_token: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Response of `GET {vault}/keys/{name}`
#[derive(Debug, Clone, Deserialize)]
pub struct KeyBundle {
    pub key: JsonWebKey,
}

/// Key Vault's JWK; coordinates are base64url.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonWebKey {
    #[serde(default)]
    pub kid: Option<String>,
    pub kty: String,
    #[serde(default)]
    pub crv: Option<String>,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
}

/// Body of `POST {vault}/keys/{name}/sign`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRequest {
    pub alg: String,
    /// base64url digest
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignResult {
    #[serde(default)]
    pub kid: Option<String>,
    /// base64url signature
    pub value: String,
}
