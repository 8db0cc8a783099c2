mod custody;
mod agent;
mod resolver;
mod local;

pub use custody::{CustodyKey, KeyCustody};
pub use agent::{RemoteSigningAgent, SigningConfiguration};
pub use resolver::{VerifierConfiguration, fetch_public_key, resolve};
pub use local::LocalCustody;
