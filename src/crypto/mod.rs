//! Cryptographic primitives
//!
//! Hashing and signature verification over the supported COSE algorithms,
//! plus verification against X.509 certificate keys for attestation
//! statements. Signature equality is delegated to the backend crates, which
//! compare in constant time.

pub mod chain;

use sha2::{Digest, Sha256};
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

use crate::codec::cose::{CoseAlgorithm, CosePublicKey, EcCurve};
use crate::error::{WebAuthnError, WebAuthnResult};
use crate::types::Warning;

/// SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Verifies `signature` over `message` with a credential public key.
///
/// ECDSA signatures are ASN.1 DER; Ed25519 signatures are 64 raw bytes; RSA
/// signatures are the raw k-byte integer. High-S ECDSA signatures are
/// accepted and flagged through `warnings`.
pub fn verify_signature(
    key: &CosePublicKey,
    message: &[u8],
    signature: &[u8],
    warnings: &mut Vec<Warning>,
) -> WebAuthnResult<()> {
    match key {
        CosePublicKey::Ec2 { curve: EcCurve::P256, x, y, .. } => {
            verify_es256(x, y, message, signature, warnings)
        }
        CosePublicKey::Ec2 { curve: EcCurve::P384, x, y, .. } => {
            verify_es384(x, y, message, signature, warnings)
        }
        CosePublicKey::Ec2 { alg, curve: EcCurve::P521, .. } => {
            Err(WebAuthnError::UnsupportedAlgorithm(alg.id()))
        }
        CosePublicKey::Rsa { alg: CoseAlgorithm::Rs256, n, e } => {
            verify_rs256(n, e, message, signature)
        }
        CosePublicKey::Rsa { alg: CoseAlgorithm::Ps256, n, e } => {
            verify_ps256(n, e, message, signature)
        }
        CosePublicKey::Rsa { alg, .. } => Err(WebAuthnError::UnsupportedAlgorithm(alg.id())),
        CosePublicKey::Okp { x, .. } => verify_eddsa(x, message, signature),
    }
}

fn verify_es256(
    x: &[u8],
    y: &[u8],
    message: &[u8],
    signature: &[u8],
    warnings: &mut Vec<Warning>,
) -> WebAuthnResult<()> {
    use p256::ecdsa::signature::Verifier;
    use p256::ecdsa::{Signature, VerifyingKey};

    let point = p256::EncodedPoint::from_affine_coordinates(
        p256::FieldBytes::from_slice(x),
        p256::FieldBytes::from_slice(y),
        false,
    );
    let verifying_key = VerifyingKey::from_encoded_point(&point)
        .map_err(|_| WebAuthnError::MalformedData("invalid P-256 public key".to_string()))?;
    let parsed = Signature::from_der(signature).map_err(|_| WebAuthnError::SignatureInvalid)?;
    if parsed.normalize_s().is_some() {
        warnings.push(Warning::NonNormalizedSignature);
    }
    verifying_key.verify(message, &parsed).map_err(|_| WebAuthnError::SignatureInvalid)
}

fn verify_es384(
    x: &[u8],
    y: &[u8],
    message: &[u8],
    signature: &[u8],
    warnings: &mut Vec<Warning>,
) -> WebAuthnResult<()> {
    use p384::ecdsa::signature::Verifier;
    use p384::ecdsa::{Signature, VerifyingKey};

    let point = p384::EncodedPoint::from_affine_coordinates(
        p384::FieldBytes::from_slice(x),
        p384::FieldBytes::from_slice(y),
        false,
    );
    let verifying_key = VerifyingKey::from_encoded_point(&point)
        .map_err(|_| WebAuthnError::MalformedData("invalid P-384 public key".to_string()))?;
    let parsed = Signature::from_der(signature).map_err(|_| WebAuthnError::SignatureInvalid)?;
    if parsed.normalize_s().is_some() {
        warnings.push(Warning::NonNormalizedSignature);
    }
    verifying_key.verify(message, &parsed).map_err(|_| WebAuthnError::SignatureInvalid)
}

fn verify_rs256(n: &[u8], e: &[u8], message: &[u8], signature: &[u8]) -> WebAuthnResult<()> {
    use rsa::pkcs1v15::{Signature, VerifyingKey};
    use rsa::signature::Verifier;

    let key = rsa_public_key(n, e)?;
    let verifying_key = VerifyingKey::<Sha256>::new(key);
    let parsed = Signature::try_from(signature).map_err(|_| WebAuthnError::SignatureInvalid)?;
    verifying_key.verify(message, &parsed).map_err(|_| WebAuthnError::SignatureInvalid)
}

fn verify_ps256(n: &[u8], e: &[u8], message: &[u8], signature: &[u8]) -> WebAuthnResult<()> {
    use rsa::pss::{Signature, VerifyingKey};
    use rsa::signature::Verifier;

    let key = rsa_public_key(n, e)?;
    let verifying_key = VerifyingKey::<Sha256>::new(key);
    let parsed = Signature::try_from(signature).map_err(|_| WebAuthnError::SignatureInvalid)?;
    verifying_key.verify(message, &parsed).map_err(|_| WebAuthnError::SignatureInvalid)
}

fn verify_eddsa(x: &[u8], message: &[u8], signature: &[u8]) -> WebAuthnResult<()> {
    use ed25519_dalek::{Signature, VerifyingKey};

    let key_bytes: [u8; 32] = x
        .try_into()
        .map_err(|_| WebAuthnError::MalformedData("Ed25519 key length".to_string()))?;
    let verifying_key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|_| WebAuthnError::MalformedData("invalid Ed25519 public key".to_string()))?;
    let parsed = Signature::from_slice(signature).map_err(|_| WebAuthnError::SignatureInvalid)?;
    verifying_key.verify_strict(message, &parsed).map_err(|_| WebAuthnError::SignatureInvalid)
}

fn rsa_public_key(n: &[u8], e: &[u8]) -> WebAuthnResult<rsa::RsaPublicKey> {
    rsa::RsaPublicKey::new(
        rsa::BigUint::from_bytes_be(n),
        rsa::BigUint::from_bytes_be(e),
    )
    .map_err(|_| WebAuthnError::MalformedData("invalid RSA public key".to_string()))
}

/// Verifies `signature` over `message` with the subject public key of an
/// attestation certificate, using the signing algorithm the statement
/// declares.
pub fn verify_with_certificate(
    alg: CoseAlgorithm,
    certificate: &X509Certificate<'_>,
    message: &[u8],
    signature: &[u8],
    warnings: &mut Vec<Warning>,
) -> WebAuthnResult<()> {
    let spki = certificate.public_key();
    let parsed = spki
        .parsed()
        .map_err(|e| WebAuthnError::MalformedData(format!("certificate public key: {e:?}")))?;

    match (alg, parsed) {
        (CoseAlgorithm::Es256, PublicKey::EC(point)) => {
            use p256::ecdsa::signature::Verifier;
            use p256::ecdsa::{Signature, VerifyingKey};

            let verifying_key = VerifyingKey::from_sec1_bytes(point.data()).map_err(|_| {
                WebAuthnError::MalformedData("certificate key is not P-256".to_string())
            })?;
            let parsed =
                Signature::from_der(signature).map_err(|_| WebAuthnError::SignatureInvalid)?;
            if parsed.normalize_s().is_some() {
                warnings.push(Warning::NonNormalizedSignature);
            }
            verifying_key.verify(message, &parsed).map_err(|_| WebAuthnError::SignatureInvalid)
        }
        (CoseAlgorithm::Es384, PublicKey::EC(point)) => {
            use p384::ecdsa::signature::Verifier;
            use p384::ecdsa::{Signature, VerifyingKey};

            let verifying_key = VerifyingKey::from_sec1_bytes(point.data()).map_err(|_| {
                WebAuthnError::MalformedData("certificate key is not P-384".to_string())
            })?;
            let parsed =
                Signature::from_der(signature).map_err(|_| WebAuthnError::SignatureInvalid)?;
            if parsed.normalize_s().is_some() {
                warnings.push(Warning::NonNormalizedSignature);
            }
            verifying_key.verify(message, &parsed).map_err(|_| WebAuthnError::SignatureInvalid)
        }
        (CoseAlgorithm::Rs256, PublicKey::RSA(key)) => {
            verify_rs256(key.modulus, key.exponent, message, signature)
        }
        (CoseAlgorithm::Ps256, PublicKey::RSA(key)) => {
            verify_ps256(key.modulus, key.exponent, message, signature)
        }
        (alg, _) => Err(WebAuthnError::UnsupportedAlgorithm(alg.id())),
    }
}
