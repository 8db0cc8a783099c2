//! Compact JWS with the payload embedded or detached.
//!
//! The signing input is always built from the exact base64url segments that
//! end up in the token, never from a re-serialized header.

mod attached;
mod detached;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::algorithm::Algorithm;
use crate::base64url;
use crate::error::{Error, Result};
use crate::signing::{RemoteSigningAgent, SigningConfiguration, VerifierConfiguration};

pub use detached::DetachedJws;

/// Header parameters that this codec knows how to process when marked critical.
const UNDERSTOOD_CRITICAL: &[&str] = &["b64"];

/// JWS protected header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoseHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b64: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crit: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JoseHeader {
    pub fn new(alg: impl Into<String>) -> Self {
        Self {
            alg: alg.into(),
            kid: None,
            b64: None,
            crit: None,
            extra: Map::new(),
        }
    }

    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Marks the header for detached signing: `b64: false`, `crit: ["b64"]`.
    pub fn detached(mut self) -> Self {
        self.b64 = Some(false);
        let crit = self.crit.get_or_insert_with(Vec::new);
        if !crit.iter().any(|name| name == "b64") {
            crit.push("b64".to_string());
        }
        self
    }

    pub fn is_detached(&self) -> bool {
        self.b64 == Some(false)
            && self
                .crit
                .as_ref()
                .is_some_and(|crit| crit.iter().any(|name| name == "b64"))
    }

    fn check_critical(&self) -> Result<()> {
        let Some(crit) = &self.crit else {
            return Ok(());
        };
        if crit.is_empty() {
            return Err(Error::malformed("crit must not be empty"));
        }
        for name in crit {
            if !UNDERSTOOD_CRITICAL.contains(&name.as_str()) {
                return Err(Error::malformed(format!("unsupported critical header {name}")));
            }
            if name == "b64" && self.b64.is_none() {
                return Err(Error::malformed("crit lists b64 but header has no b64"));
            }
        }
        Ok(())
    }

    fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| Error::malformed(format!("header is not serializable: {e}")))?;
        Ok(base64url::encode(json))
    }

    fn decode(segment: &str) -> Result<Self> {
        let json = decode_segment("protected header", segment)?;
        serde_json::from_slice(&json)
            .map_err(|e| Error::malformed(format!("protected header is not a JWS header: {e}")))
    }
}

/// Header and payload of a verified attached JWS.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedJws {
    pub header: JoseHeader,
    pub payload: Vec<u8>,
}

/// Signs JWS with a remote key.
#[derive(Clone)]
pub struct JoseSigner {
    agent: RemoteSigningAgent,
    config: SigningConfiguration,
}

impl JoseSigner {
    pub fn new(agent: RemoteSigningAgent, config: SigningConfiguration) -> Self {
        Self { agent, config }
    }

    fn check_algorithm(&self, header: &JoseHeader) -> Result<()> {
        if header.alg != self.config.algorithm {
            return Err(Error::AlgorithmMismatch {
                header: header.alg.clone(),
                signer: self.config.algorithm.clone(),
            });
        }
        Ok(())
    }
}

/// Verifies JWS against an explicit key or a key fetched from custody.
#[derive(Clone, Debug)]
pub struct JoseVerifier {
    config: VerifierConfiguration,
}

impl JoseVerifier {
    pub fn new(config: VerifierConfiguration) -> Self {
        Self { config }
    }
}

fn decode_segment(what: &str, segment: &str) -> Result<Vec<u8>> {
    base64url::decode(segment).map_err(|e| Error::malformed(format!("{what} is not base64url: {e}")))
}

fn header_algorithm(header: &JoseHeader) -> Result<Algorithm> {
    header.check_critical()?;
    Algorithm::from_jose_name(&header.alg)
}
