use std::fmt;

use crate::error::{Error, Result};

/// Signature algorithms the custody service can be asked to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// ECDSA over P-256 with SHA-256.
    Es256,
}

impl Algorithm {
    pub fn from_jose_name(name: &str) -> Result<Self> {
        match name {
            "ES256" => Ok(Self::Es256),
            other => Err(Error::UnsupportedAlgorithm(other.to_string())),
        }
    }

    pub fn from_cose_id(id: i64) -> Result<Self> {
        match id {
            -7 => Ok(Self::Es256),
            other => Err(Error::UnsupportedAlgorithm(other.to_string())),
        }
    }

    pub fn jose_name(&self) -> &'static str {
        match self {
            Self::Es256 => "ES256",
        }
    }

    pub fn cose_id(&self) -> i64 {
        match self {
            Self::Es256 => -7,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.jose_name())
    }
}

/// Curve identifier to signature algorithm. New pairs are added here.
const CURVE_ALGORITHMS: &[(&str, Algorithm)] = &[("P-256", Algorithm::Es256)];

pub fn algorithm_for_curve(curve: &str) -> Result<Algorithm> {
    CURVE_ALGORITHMS
        .iter()
        .find(|(crv, _)| *crv == curve)
        .map(|(_, alg)| *alg)
        .ok_or_else(|| Error::UnsupportedCurve(curve.to_string()))
}

/// Digest algorithms for the hash-envelope payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadHashAlgorithm {
    Sha256,
}

impl PayloadHashAlgorithm {
    pub fn from_cose_id(id: i64) -> Result<Self> {
        match id {
            -16 => Ok(Self::Sha256),
            other => Err(Error::UnsupportedAlgorithm(other.to_string())),
        }
    }

    pub fn cose_id(&self) -> i64 {
        match self {
            Self::Sha256 => -16,
        }
    }

    pub fn output_len(&self) -> usize {
        match self {
            Self::Sha256 => 32,
        }
    }

    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        use sha2::{Digest, Sha256};

        match self {
            Self::Sha256 => Sha256::digest(data).to_vec(),
        }
    }
}
