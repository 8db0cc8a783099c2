//! Azure Key Vault as the key custody service for `remote-envelope`.

pub mod client;
pub mod error;
pub mod types;

pub use client::KeyVaultClient;
pub use error::{KeyVaultError, Result};
pub use types::{DEFAULT_API_VERSION, KeyVaultConfig};
