use std::sync::Arc;

use futures::future::join_all;
use remote_envelope::{
    Algorithm, CoseProtectedHeader, CoseSigner, CoseVerifier, DetachedJws, Error, JoseHeader,
    JoseSigner, JoseVerifier, KeyCustody, KeyReference, LocalCustody, PayloadHashAlgorithm,
    RemoteSigningAgent, SigningConfiguration, VerifierConfiguration, fetch_public_key,
};

const KID: &str = "https://vault.example.net/keys/release-signer";
const MESSAGE: &str = "It’s a dangerous business, Frodo, going out your door.";

fn reference() -> KeyReference {
    KeyReference::parse(KID).unwrap()
}

fn custody() -> Arc<LocalCustody> {
    Arc::new(
        LocalCustody::from_seed("release-signer", "envelope-tests")
            .unwrap()
            .with_key("imposter", "someone-else")
            .unwrap(),
    )
}

fn agent(custody: &Arc<LocalCustody>) -> RemoteSigningAgent {
    RemoteSigningAgent::new(custody.clone())
}

fn lookup(custody: &Arc<LocalCustody>) -> VerifierConfiguration {
    VerifierConfiguration::lookup(reference(), custody.clone())
}

// ── attached JWS ─────────────────────────────────────────────────────

#[tokio::test]
async fn attached_hello_scenario() {
    let custody = custody();
    let signer = JoseSigner::new(agent(&custody), SigningConfiguration::es256(reference()));
    let header = JoseHeader::new("ES256").with_kid(KID);

    let token = signer.sign_attached(&header, b"hello").await.unwrap();
    let verified = JoseVerifier::new(lookup(&custody))
        .verify_attached(&token)
        .await
        .unwrap();

    assert_eq!(verified.payload, b"hello");
    assert_eq!(verified.header.kid.as_deref(), Some(KID));
}

#[tokio::test]
async fn attached_roundtrip_for_assorted_payloads() {
    let custody = custody();
    let signer = JoseSigner::new(agent(&custody), SigningConfiguration::es256(reference()));
    let verifier = JoseVerifier::new(lookup(&custody));

    let payloads: [&[u8]; 4] = [b"", b"hello", MESSAGE.as_bytes(), &[0, 0xff, 0x2e, 0x2e]];
    for payload in payloads {
        let token = signer
            .sign_attached(&JoseHeader::new("ES256"), payload)
            .await
            .unwrap();
        let verified = verifier.verify_attached(&token).await.unwrap();
        assert_eq!(verified.payload, payload);
    }
}

#[tokio::test]
async fn attached_with_explicit_public_key() {
    let custody = custody();
    let public_key = fetch_public_key(custody.as_ref(), &reference()).await.unwrap();
    let signer = JoseSigner::new(agent(&custody), SigningConfiguration::es256(reference()));
    let token = signer
        .sign_attached(&JoseHeader::new("ES256"), MESSAGE.as_bytes())
        .await
        .unwrap();

    let fetches_before = custody.key_fetches();
    let verified = JoseVerifier::new(VerifierConfiguration::explicit(public_key))
        .verify_attached(&token)
        .await
        .unwrap();

    assert_eq!(verified.payload, MESSAGE.as_bytes());
    assert_eq!(custody.key_fetches(), fetches_before, "explicit key must not hit custody");
}

// ── detached JWS ─────────────────────────────────────────────────────

#[tokio::test]
async fn detached_hello_scenario() {
    let custody = custody();
    let signer = JoseSigner::new(agent(&custody), SigningConfiguration::es256(reference()));
    let header = JoseHeader::new("ES256").with_kid(KID).detached();

    let token = signer.sign_detached(&header, b"hello").await.unwrap();
    let (protected, signature) = token.split_once("..").unwrap();
    let verifier = JoseVerifier::new(lookup(&custody));

    let ok = DetachedJws {
        protected: protected.to_string(),
        payload: b"hello".to_vec(),
        signature: signature.to_string(),
    };
    assert_eq!(verifier.verify_detached(&ok).await.unwrap(), b"hello");

    let tampered = DetachedJws {
        payload: b"hellx".to_vec(),
        ..ok
    };
    assert!(matches!(
        verifier.verify_detached(&tampered).await,
        Err(Error::SignatureVerificationFailure)
    ));
}

#[tokio::test]
async fn detached_header_contract_checked_before_network() {
    let custody = custody();
    let signer = JoseSigner::new(agent(&custody), SigningConfiguration::es256(reference()));

    let mut b64_true = JoseHeader::new("ES256").with_kid(KID).detached();
    b64_true.b64 = Some(true);

    for header in [JoseHeader::new("ES256").with_kid(KID), b64_true] {
        assert!(matches!(
            signer.sign_detached(&header, b"hello").await,
            Err(Error::DetachedHeaderContractViolation)
        ));
    }
    assert_eq!(custody.sign_calls(), 0);
    assert_eq!(custody.key_fetches(), 0);
}

// ── key mismatch and algorithms ──────────────────────────────────────

#[tokio::test]
async fn verification_with_another_key_fails() {
    let custody = custody();
    let signer = JoseSigner::new(agent(&custody), SigningConfiguration::es256(reference()));
    let imposter = KeyReference::parse("https://vault.example.net/keys/imposter").unwrap();
    let jose = JoseVerifier::new(VerifierConfiguration::lookup(imposter.clone(), custody.clone()));

    let token = signer
        .sign_attached(&JoseHeader::new("ES256"), b"hello")
        .await
        .unwrap();
    assert!(matches!(
        jose.verify_attached(&token).await,
        Err(Error::SignatureVerificationFailure)
    ));

    let cose_signer = CoseSigner::new(agent(&custody), SigningConfiguration::es256(reference()));
    let message = cose_signer
        .sign(&CoseProtectedHeader::new(Algorithm::Es256), b"hello")
        .await
        .unwrap();
    let cose = CoseVerifier::new(VerifierConfiguration::lookup(imposter, custody.clone()));
    assert!(matches!(
        cose.verify(&message).await,
        Err(Error::SignatureVerificationFailure)
    ));
}

#[tokio::test]
async fn unsupported_algorithm_issues_no_custody_call() {
    let custody = custody();
    let config = SigningConfiguration::new(reference(), "PS256");

    let jose = JoseSigner::new(agent(&custody), config.clone());
    assert!(matches!(
        jose.sign_attached(&JoseHeader::new("PS256"), b"hello").await,
        Err(Error::UnsupportedAlgorithm(_))
    ));

    let cose = CoseSigner::new(agent(&custody), config);
    assert!(matches!(
        cose.sign(&CoseProtectedHeader::new(Algorithm::Es256), b"hello").await,
        Err(Error::UnsupportedAlgorithm(_))
    ));

    assert_eq!(custody.sign_calls(), 0);
}

#[tokio::test]
async fn public_key_from_custody() {
    let custody = custody();
    let public_key = fetch_public_key(custody.as_ref(), &reference()).await.unwrap();
    assert_eq!(public_key.crv, "P-256");
    assert_eq!(public_key.alg, "ES256");
    assert_eq!(public_key.kid.as_deref(), Some(KID));
}

// ── COSE ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn cose_sign1_roundtrip() {
    let custody = custody();
    let signer = CoseSigner::new(agent(&custody), SigningConfiguration::es256(reference()));
    let message = signer
        .sign(&CoseProtectedHeader::new(Algorithm::Es256), MESSAGE.as_bytes())
        .await
        .unwrap();

    let payload = CoseVerifier::new(lookup(&custody)).verify(&message).await.unwrap();
    assert_eq!(String::from_utf8(payload).unwrap(), MESSAGE);
}

#[tokio::test]
async fn cose_hash_envelope_returns_sha256_of_payload() {
    let custody = custody();
    let signer = CoseSigner::new(agent(&custody), SigningConfiguration::es256(reference()));
    let header = CoseProtectedHeader::hash_envelope(
        Algorithm::Es256,
        PayloadHashAlgorithm::Sha256,
        Some("application/spdx+json".to_string()),
        "https://storage.example.net/sbom/release.spdx.json",
    );
    let message = signer
        .sign_hash_envelope(&header, MESSAGE.as_bytes())
        .await
        .unwrap();

    let public_key = fetch_public_key(custody.as_ref(), &reference()).await.unwrap();
    let verifier = CoseVerifier::new(VerifierConfiguration::explicit(public_key));
    let digest = verifier.verify(&message).await.unwrap();

    assert_eq!(
        hex::encode(&digest),
        "ed5fd4988b349c02e8a05926ff26ab09e6ab0a7ab7c22b785e8c7320f080885f"
    );
    assert_eq!(digest.len(), 32);

    let verified = verifier.verify_hash_envelope(&message).await.unwrap();
    assert_eq!(verified.digest, digest);
    assert!(verified.matches_preimage(MESSAGE.as_bytes()));
}

// ── verifier configuration ───────────────────────────────────────────

#[tokio::test]
async fn verifier_configuration_needs_exactly_one_source() {
    let custody = custody();
    let public_key = fetch_public_key(custody.as_ref(), &reference()).await.unwrap();
    let handle: Arc<dyn KeyCustody> = custody.clone();

    assert!(matches!(
        VerifierConfiguration::from_parts(None, None, None),
        Err(Error::MissingVerifierCredentials)
    ));
    assert!(matches!(
        VerifierConfiguration::from_parts(Some(public_key.clone()), Some(reference()), Some(handle)),
        Err(Error::ConflictingVerifierCredentials)
    ));
    assert!(matches!(
        VerifierConfiguration::from_parts(Some(public_key), None, None),
        Ok(VerifierConfiguration::ExplicitKey(_))
    ));
}

// ── concurrency ──────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_signing_is_independent() {
    let custody = custody();
    let signer = JoseSigner::new(agent(&custody), SigningConfiguration::es256(reference()));
    let verifier = JoseVerifier::new(lookup(&custody));

    let header = JoseHeader::new("ES256");
    let payloads: Vec<Vec<u8>> = (0..16).map(|i| format!("payload-{i}").into_bytes()).collect();
    let tokens = join_all(
        payloads
            .iter()
            .map(|payload| signer.sign_attached(&header, payload)),
    )
    .await;

    for (token, payload) in tokens.into_iter().zip(&payloads) {
        let verified = verifier.verify_attached(&token.unwrap()).await.unwrap();
        assert_eq!(&verified.payload, payload);
    }
    assert_eq!(custody.sign_calls(), 16);
}
