use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use keyvault_custody::{DEFAULT_API_VERSION, KeyVaultClient, KeyVaultConfig};
use remote_envelope::{
    Algorithm, CoseProtectedHeader, CoseSign1, CoseSigner, CoseVerifier, DetachedJws, JoseHeader,
    JoseSigner, JoseVerifier, KeyCustody, KeyReference, LocalCustody, PayloadHashAlgorithm,
    PublicKeyMaterial, RemoteSigningAgent, SigningConfiguration, VerifierConfiguration,
    fetch_public_key,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(name = "envelope", about = "Sign and verify JWS and COSE_Sign1 envelopes with vault-held keys")]
struct Args {
    /// `<vault>/keys/<name>[/<version>]`
    #[clap(long, global = true, env = "ENVELOPE_KEY_ID")]
    key_id: Option<KeyReference>,
    #[clap(long, global = true, env = "KEYVAULT_TOKEN", hide_env_values = true)]
    keyvault_token: Option<String>,
    #[clap(long, global = true, env = "KEYVAULT_API_VERSION", default_value = DEFAULT_API_VERSION)]
    keyvault_api_version: String,
    #[clap(long, global = true, env = "KEYVAULT_TIMEOUT_SECS", default_value = "30")]
    keyvault_timeout_secs: u64,
    /// Use an in-process key derived from this seed instead of Key Vault
    #[clap(long, global = true, env = "LOCAL_KEY_SEED", hide_env_values = true)]
    local_key_seed: Option<String>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the public key of --key-id as a JWK
    PublicKey,
    /// Sign a file as a compact JWS
    SignJws {
        payload: PathBuf,
        /// Leave the payload out of the token (`b64: false`)
        #[clap(long)]
        detached: bool,
    },
    /// Verify a compact JWS and print its payload
    VerifyJws {
        token: String,
        /// Payload of a detached `header..signature` token
        #[clap(long)]
        payload_file: Option<PathBuf>,
        /// JWK file to verify against instead of fetching --key-id
        #[clap(long)]
        public_key: Option<PathBuf>,
    },
    /// Sign a file as a hex-encoded COSE_Sign1 message
    SignCose {
        payload: PathBuf,
        /// Sign the SHA-256 digest of the file instead of its content
        #[clap(long, requires = "location")]
        hash_envelope: bool,
        /// Where the content of a hash envelope can be retrieved
        #[clap(long, requires = "hash_envelope")]
        location: Option<String>,
        #[clap(long)]
        content_type: Option<String>,
    },
    /// Verify a hex-encoded COSE_Sign1 message
    VerifyCose {
        message: String,
        /// Content a hash envelope's digest must match
        #[clap(long)]
        payload_file: Option<PathBuf>,
        #[clap(long)]
        public_key: Option<PathBuf>,
    },
}

impl Args {
    fn key_id(&self) -> Result<&KeyReference> {
        self.key_id
            .as_ref()
            .context("no key configured: pass --key-id or set ENVELOPE_KEY_ID")
    }

    fn custody(&self, key: &KeyReference) -> Result<Arc<dyn KeyCustody>> {
        if let Some(ref seed) = self.local_key_seed {
            tracing::debug!(key = %key, "using in-process key custody");
            return Ok(Arc::new(LocalCustody::from_seed(key.name(), seed)?));
        }

        let client = KeyVaultClient::new(KeyVaultConfig {
            bearer_token: self.keyvault_token.clone(),
            api_version: self.keyvault_api_version.clone(),
            timeout_secs: self.keyvault_timeout_secs,
        })
        .context("failed to create Key Vault client")?;
        Ok(Arc::new(client))
    }

    fn signing(&self) -> Result<(RemoteSigningAgent, SigningConfiguration)> {
        let key = self.key_id()?;
        let agent = RemoteSigningAgent::new(self.custody(key)?);
        Ok((agent, SigningConfiguration::es256(key.clone())))
    }

    fn verifier(&self, public_key: Option<&Path>) -> Result<VerifierConfiguration> {
        let public_key = public_key.map(read_public_key).transpose()?;
        let custody = match (&public_key, &self.key_id) {
            (None, Some(key)) => Some(self.custody(key)?),
            _ => None,
        };
        Ok(VerifierConfiguration::from_parts(
            public_key,
            self.key_id.clone(),
            custody,
        )?)
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn read_public_key(path: &Path) -> Result<PublicKeyMaterial> {
    serde_json::from_slice(&read(path)?)
        .with_context(|| format!("{} is not a JWK", path.display()))
}

fn line(text: impl Into<String>) -> Vec<u8> {
    let mut text = text.into();
    text.push('\n');
    text.into_bytes()
}

/// Runs one command and returns what it prints to stdout.
async fn run(args: &Args) -> Result<Vec<u8>> {
    match &args.command {
        Command::PublicKey => {
            let key = args.key_id()?;
            let custody = args.custody(key)?;
            let jwk = fetch_public_key(custody.as_ref(), key).await?;
            Ok(line(serde_json::to_string_pretty(&jwk)?))
        }

        Command::SignJws { payload, detached } => {
            let payload = read(payload)?;
            let (agent, config) = args.signing()?;
            let header = JoseHeader::new(config.algorithm.as_str())
                .with_kid(config.key_reference.as_str());
            let signer = JoseSigner::new(agent, config);

            let token = if *detached {
                signer.sign_detached(&header.detached(), &payload).await?
            } else {
                signer.sign_attached(&header, &payload).await?
            };
            Ok(line(token))
        }

        Command::VerifyJws {
            token,
            payload_file,
            public_key,
        } => {
            let verifier = JoseVerifier::new(args.verifier(public_key.as_deref())?);
            match payload_file {
                Some(path) => {
                    let jws = DetachedJws::from_token(token.trim(), read(path)?)?;
                    verifier.verify_detached(&jws).await?;
                    Ok(line("verified"))
                }
                None => Ok(verifier.verify_attached(token.trim()).await?.payload),
            }
        }

        Command::SignCose {
            payload,
            hash_envelope,
            location,
            content_type,
        } => {
            let payload = read(payload)?;
            let (agent, config) = args.signing()?;
            let kid = config.key_reference.as_str().as_bytes().to_vec();
            let signer = CoseSigner::new(agent, config);

            let message = if *hash_envelope {
                let location = location
                    .clone()
                    .context("--hash-envelope needs --location")?;
                let header = CoseProtectedHeader::hash_envelope(
                    Algorithm::Es256,
                    PayloadHashAlgorithm::Sha256,
                    content_type.clone(),
                    location,
                )
                .with_kid(kid);
                signer.sign_hash_envelope(&header, &payload).await?
            } else {
                let header = CoseProtectedHeader {
                    content_type: content_type.clone(),
                    ..CoseProtectedHeader::new(Algorithm::Es256)
                }
                .with_kid(kid);
                signer.sign(&header, &payload).await?
            };
            Ok(line(hex::encode(message)))
        }

        Command::VerifyCose {
            message,
            payload_file,
            public_key,
        } => {
            let bytes = hex::decode(message.trim()).context("message is not hex")?;
            let envelope = CoseSign1::from_bytes(&bytes)?;
            let verifier = CoseVerifier::new(args.verifier(public_key.as_deref())?);

            if !envelope.header.is_hash_envelope() {
                if payload_file.is_some() {
                    bail!("--payload-file only applies to hash envelopes");
                }
                return Ok(verifier.verify(&bytes).await?);
            }

            let verified = verifier.verify_hash_envelope(&bytes).await?;
            if let Some(path) = payload_file {
                if !verified.matches_preimage(&read(path)?) {
                    bail!("{} does not match the signed digest", path.display());
                }
            }
            Ok(line(format!(
                "{} {}",
                hex::encode(&verified.digest),
                verified.location
            )))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let output = run(&args).await?;
    std::io::stdout().write_all(&output)?;
    Ok(())
}
