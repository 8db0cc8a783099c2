//! Error types for the Key Vault client

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyVaultError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Vault returned a non-success status
    #[error("Key Vault error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Key not found: {0}")]
    NotFound(String),

    /// Response parsed but is missing what we need
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid bearer token")]
    InvalidToken,
}

pub type Result<T> = std::result::Result<T, KeyVaultError>;
