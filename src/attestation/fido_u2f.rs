//! `fido-u2f` attestation
//!
//! Legacy U2F authenticators sign a reconstructed registration payload
//! rather than the authenticator data itself:
//!
//! `0x00 || rpIdHash || clientDataHash || credentialId || publicKeyU2F`
//!
//! where `publicKeyU2F` is the uncompressed P-256 point of the credential
//! key. The single attestation certificate must itself hold a P-256 key.

use ciborium::Value;

use crate::codec::cbor;
use crate::codec::cose::{CoseAlgorithm, CosePublicKey, EcCurve};
use crate::crypto;
use crate::error::{WebAuthnError, WebAuthnResult};
use crate::types::{AttestationType, Warning};

use super::{packed::decode_certificate_array, AttestationContext, VerifiedAttestation};

pub(super) fn verify(
    att_stmt: &[(Value, Value)],
    ctx: &AttestationContext<'_>,
    warnings: &mut Vec<Warning>,
) -> WebAuthnResult<VerifiedAttestation> {
    let signature = cbor::map_bytes(att_stmt, "sig")
        .ok_or_else(|| WebAuthnError::InvalidAttestation("fido-u2f: missing sig".to_string()))?;
    let x5c = cbor::map_array(att_stmt, "x5c")
        .ok_or_else(|| WebAuthnError::InvalidAttestation("fido-u2f: missing x5c".to_string()))?;
    let chain = decode_certificate_array(x5c)?;
    if chain.len() != 1 {
        return Err(WebAuthnError::InvalidAttestation(
            "fido-u2f: x5c must contain exactly one certificate".to_string(),
        ));
    }

    let credential = ctx.attested_credential()?;
    let public_key_u2f = uncompressed_point(&credential.public_key)?;

    let mut verification_data =
        Vec::with_capacity(1 + 32 + 32 + credential.credential_id.as_bytes().len() + 65);
    verification_data.push(0x00);
    verification_data.extend_from_slice(&ctx.auth_data.rp_id_hash);
    verification_data.extend_from_slice(ctx.client_data_hash);
    verification_data.extend_from_slice(credential.credential_id.as_bytes());
    verification_data.extend_from_slice(&public_key_u2f);

    let leaf = crypto::chain::parse_certificate(&chain[0])?;
    crypto::verify_with_certificate(
        CoseAlgorithm::Es256,
        &leaf,
        &verification_data,
        signature,
        warnings,
    )
    .map_err(|e| match e {
        WebAuthnError::SignatureInvalid => WebAuthnError::InvalidAttestation(
            "fido-u2f: attestation signature verification failed".to_string(),
        ),
        WebAuthnError::UnsupportedAlgorithm(_) | WebAuthnError::MalformedData(_) => {
            WebAuthnError::InvalidAttestation(
                "fido-u2f: attestation certificate key is not P-256".to_string(),
            )
        }
        other => other,
    })?;

    Ok(VerifiedAttestation { attestation_type: AttestationType::Basic, trust_path: chain })
}

/// `0x04 || x || y` from the credential's COSE EC key.
fn uncompressed_point(key: &CosePublicKey) -> WebAuthnResult<Vec<u8>> {
    match key {
        CosePublicKey::Ec2 { curve: EcCurve::P256, x, y, .. } => {
            let mut point = Vec::with_capacity(65);
            point.push(0x04);
            point.extend_from_slice(x);
            point.extend_from_slice(y);
            Ok(point)
        }
        _ => Err(WebAuthnError::InvalidAttestation(
            "fido-u2f: credential public key is not P-256".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::auth_data::AuthenticatorData;
    use chrono::Utc;

    fn attested_auth_data(key: &CosePublicKey) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&[0xdd; 32]);
        data.push(0b0100_0001);
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&[0x00; 16]);
        let credential_id = [0x42u8; 16];
        data.extend_from_slice(&(credential_id.len() as u16).to_be_bytes());
        data.extend_from_slice(&credential_id);
        data.extend_from_slice(&key.encode().expect("encodes"));
        data
    }

    #[test]
    fn test_uncompressed_point_shape() {
        let key = CosePublicKey::Ec2 {
            alg: CoseAlgorithm::Es256,
            curve: EcCurve::P256,
            x: vec![0x11; 32],
            y: vec![0x22; 32],
        };
        let point = uncompressed_point(&key).expect("point");
        assert_eq!(point.len(), 65);
        assert_eq!(point[0], 0x04);
        assert_eq!(&point[1..33], &[0x11; 32]);
    }

    #[test]
    fn test_uncompressed_point_rejects_non_p256() {
        let key = CosePublicKey::Okp { alg: CoseAlgorithm::Eddsa, x: vec![0x33; 32] };
        assert!(matches!(
            uncompressed_point(&key),
            Err(WebAuthnError::InvalidAttestation(_))
        ));
    }

    #[test]
    fn test_rejects_missing_x5c() {
        let key = CosePublicKey::Ec2 {
            alg: CoseAlgorithm::Es256,
            curve: EcCurve::P256,
            x: vec![0x11; 32],
            y: vec![0x22; 32],
        };
        let raw = attested_auth_data(&key);
        let auth_data = AuthenticatorData::parse(&raw).expect("parses");
        let client_data_hash = [0x99u8; 32];
        let ctx = AttestationContext {
            auth_data: &auth_data,
            raw_auth_data: &raw,
            client_data_hash: &client_data_hash,
            now: Utc::now(),
            safetynet_clock_skew_ms: 60_000,
        };
        let stmt = vec![(Value::Text("sig".to_string()), Value::Bytes(vec![0u8; 70]))];
        let mut warnings = Vec::new();
        assert!(matches!(
            verify(&stmt, &ctx, &mut warnings),
            Err(WebAuthnError::InvalidAttestation(_))
        ));
    }

    #[test]
    fn test_rejects_multi_certificate_chain() {
        let key = CosePublicKey::Ec2 {
            alg: CoseAlgorithm::Es256,
            curve: EcCurve::P256,
            x: vec![0x11; 32],
            y: vec![0x22; 32],
        };
        let raw = attested_auth_data(&key);
        let auth_data = AuthenticatorData::parse(&raw).expect("parses");
        let client_data_hash = [0x99u8; 32];
        let ctx = AttestationContext {
            auth_data: &auth_data,
            raw_auth_data: &raw,
            client_data_hash: &client_data_hash,
            now: Utc::now(),
            safetynet_clock_skew_ms: 60_000,
        };
        let stmt = vec![
            (Value::Text("sig".to_string()), Value::Bytes(vec![0u8; 70])),
            (
                Value::Text("x5c".to_string()),
                Value::Array(vec![
                    Value::Bytes(vec![0x30, 0x00]),
                    Value::Bytes(vec![0x30, 0x00]),
                ]),
            ),
        ];
        let mut warnings = Vec::new();
        assert!(matches!(
            verify(&stmt, &ctx, &mut warnings),
            Err(WebAuthnError::InvalidAttestation(_))
        ));
    }
}
