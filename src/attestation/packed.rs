//! `packed` attestation
//!
//! Two sub-forms share the format identifier. With `x5c` present, the leaf
//! attestation certificate signs over `authData || clientDataHash` and must
//! meet the packed certificate profile. Without `x5c`, the credential key
//! itself produced the signature (self attestation) and the declared
//! algorithm must equal the credential key's algorithm.

use std::str::FromStr;

use ciborium::Value;
use x509_parser::oid_registry::Oid;
use x509_parser::prelude::*;

use crate::codec::cbor;
use crate::codec::cose::CoseAlgorithm;
use crate::crypto;
use crate::error::{WebAuthnError, WebAuthnResult};
use crate::types::{AttestationType, Warning};

use super::{AttestationContext, VerifiedAttestation};

// id-fido-gen-ce-aaguid: ties the certificate to one authenticator model.
const AAGUID_EXTENSION_OID: &str = "1.3.6.1.4.1.45724.1.1.4";

const REQUIRED_SUBJECT_OU: &str = "Authenticator Attestation";

pub(super) fn verify(
    att_stmt: &[(Value, Value)],
    ctx: &AttestationContext<'_>,
    warnings: &mut Vec<Warning>,
) -> WebAuthnResult<VerifiedAttestation> {
    let alg_id = cbor::map_int(att_stmt, "alg")
        .ok_or_else(|| WebAuthnError::InvalidAttestation("packed: missing alg".to_string()))?;
    let alg = CoseAlgorithm::try_from(alg_id)?;
    let signature = cbor::map_bytes(att_stmt, "sig")
        .ok_or_else(|| WebAuthnError::InvalidAttestation("packed: missing sig".to_string()))?;

    if cbor::map_bytes(att_stmt, "ecdaaKeyId").is_some() {
        return Err(WebAuthnError::InvalidAttestation(
            "packed: ECDAA attestation is not supported".to_string(),
        ));
    }

    let message = ctx.signed_message();

    match cbor::map_array(att_stmt, "x5c") {
        Some(x5c) => {
            let chain = decode_certificate_array(x5c)?;
            let leaf_der = chain.first().ok_or_else(|| {
                WebAuthnError::InvalidAttestation("packed: empty x5c".to_string())
            })?;
            let leaf = crypto::chain::parse_certificate(leaf_der)?;

            crypto::verify_with_certificate(alg, &leaf, &message, signature, warnings)
                .map_err(|e| match e {
                    WebAuthnError::SignatureInvalid => WebAuthnError::InvalidAttestation(
                        "packed: attestation signature verification failed".to_string(),
                    ),
                    other => other,
                })?;

            check_certificate_profile(&leaf, ctx)?;

            Ok(VerifiedAttestation {
                attestation_type: AttestationType::Basic,
                trust_path: chain,
            })
        }
        None => {
            // Self attestation. Older authenticators were tolerated with a
            // declared alg differing from the credential key's; that lenience
            // is gone and the two must match.
            let credential = ctx.attested_credential()?;
            if alg != credential.public_key.alg() {
                return Err(WebAuthnError::InvalidAttestation(
                    "packed: alg does not match credential public key".to_string(),
                ));
            }
            crypto::verify_signature(&credential.public_key, &message, signature, warnings)
                .map_err(|e| match e {
                    WebAuthnError::SignatureInvalid => WebAuthnError::InvalidAttestation(
                        "packed: self attestation signature verification failed".to_string(),
                    ),
                    other => other,
                })?;

            Ok(VerifiedAttestation {
                attestation_type: AttestationType::SelfAttestation,
                trust_path: Vec::new(),
            })
        }
    }
}

pub(super) fn decode_certificate_array(x5c: &[Value]) -> WebAuthnResult<Vec<Vec<u8>>> {
    let chain: Vec<Vec<u8>> =
        x5c.iter().filter_map(|v| v.as_bytes().map(|b| b.to_vec())).collect();
    if chain.len() != x5c.len() || chain.is_empty() {
        return Err(WebAuthnError::InvalidAttestation(
            "x5c must be a non-empty array of certificate byte strings".to_string(),
        ));
    }
    Ok(chain)
}

/// Packed attestation certificate requirements: version 3, the attestation
/// OU, no CA flag, and an AAGUID extension (when present) matching the
/// authenticator data.
fn check_certificate_profile(
    leaf: &X509Certificate<'_>,
    ctx: &AttestationContext<'_>,
) -> WebAuthnResult<()> {
    if leaf.version() != X509Version::V3 {
        return Err(WebAuthnError::InvalidAttestation(
            "packed: attestation certificate is not v3".to_string(),
        ));
    }

    let has_attestation_ou = leaf
        .subject()
        .iter_organizational_unit()
        .filter_map(|ou| ou.as_str().ok())
        .any(|ou| ou == REQUIRED_SUBJECT_OU);
    if !has_attestation_ou {
        return Err(WebAuthnError::InvalidAttestation(
            "packed: subject OU is not Authenticator Attestation".to_string(),
        ));
    }

    match leaf.basic_constraints() {
        Ok(Some(constraints)) if constraints.value.ca => {
            return Err(WebAuthnError::InvalidAttestation(
                "packed: attestation certificate must not be a CA".to_string(),
            ));
        }
        Ok(_) => {}
        Err(_) => {
            return Err(WebAuthnError::InvalidAttestation(
                "packed: malformed basic constraints".to_string(),
            ));
        }
    }

    let aaguid_oid = Oid::from_str(AAGUID_EXTENSION_OID)
        .map_err(|_| WebAuthnError::InternalCryptoError("AAGUID extension OID".to_string()))?;
    if let Some(extension) = leaf.extensions().iter().find(|ext| ext.oid == aaguid_oid) {
        let aaguid = parse_aaguid_extension(extension.value)?;
        let credential = ctx.attested_credential()?;
        if aaguid != credential.aaguid.0 {
            return Err(WebAuthnError::InvalidAttestation(
                "packed: certificate AAGUID does not match authenticator data".to_string(),
            ));
        }
    }

    Ok(())
}

/// The extension value is an OCTET STRING wrapping the 16 AAGUID bytes.
fn parse_aaguid_extension(value: &[u8]) -> WebAuthnResult<[u8; 16]> {
    let (_, obj) = der_parser::parse_der(value).map_err(|_| {
        WebAuthnError::InvalidAttestation("packed: malformed AAGUID extension".to_string())
    })?;
    match obj.content {
        der_parser::ber::BerObjectContent::OctetString(bytes) => {
            bytes.try_into().map_err(|_| {
                WebAuthnError::InvalidAttestation(
                    "packed: AAGUID extension is not 16 bytes".to_string(),
                )
            })
        }
        _ => Err(WebAuthnError::InvalidAttestation(
            "packed: AAGUID extension is not an octet string".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::auth_data::AuthenticatorData;
    use crate::codec::cose::{CosePublicKey, EcCurve};
    use chrono::Utc;
    use p256::ecdsa::signature::Signer;
    use p256::ecdsa::SigningKey;
    use rand::rngs::OsRng;

    fn attested_auth_data(key: &CosePublicKey) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&[0xdd; 32]);
        data.push(0b0100_0001);
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&[0xa1; 16]);
        let credential_id = [0x42u8; 16];
        data.extend_from_slice(&(credential_id.len() as u16).to_be_bytes());
        data.extend_from_slice(&credential_id);
        data.extend_from_slice(&key.encode().expect("encodes"));
        data
    }

    fn statement(alg: i64, signature: &[u8]) -> Vec<(Value, Value)> {
        vec![
            (Value::Text("alg".to_string()), Value::Integer(alg.into())),
            (Value::Text("sig".to_string()), Value::Bytes(signature.to_vec())),
        ]
    }

    struct Fixture {
        raw: Vec<u8>,
        auth_data: AuthenticatorData,
        signing_key: SigningKey,
    }

    fn fixture() -> Fixture {
        let signing_key = SigningKey::random(&mut OsRng);
        let point = signing_key.verifying_key().to_encoded_point(false);
        let key = CosePublicKey::Ec2 {
            alg: CoseAlgorithm::Es256,
            curve: EcCurve::P256,
            x: point.x().expect("x").to_vec(),
            y: point.y().expect("y").to_vec(),
        };
        let raw = attested_auth_data(&key);
        let auth_data = AuthenticatorData::parse(&raw).expect("parses");
        Fixture { raw, auth_data, signing_key }
    }

    fn ctx<'a>(fixture: &'a Fixture, client_data_hash: &'a [u8; 32]) -> AttestationContext<'a> {
        AttestationContext {
            auth_data: &fixture.auth_data,
            raw_auth_data: &fixture.raw,
            client_data_hash,
            now: Utc::now(),
            safetynet_clock_skew_ms: 60_000,
        }
    }

    #[test]
    fn test_self_attestation_verifies() {
        let fixture = fixture();
        let client_data_hash = [0x99u8; 32];
        let ctx = ctx(&fixture, &client_data_hash);
        let signature: p256::ecdsa::DerSignature = fixture.signing_key.sign(&ctx.signed_message());

        let mut warnings = Vec::new();
        let verified =
            verify(&statement(-7, signature.as_bytes()), &ctx, &mut warnings).expect("verifies");
        assert_eq!(verified.attestation_type, AttestationType::SelfAttestation);
        assert!(verified.trust_path.is_empty());
    }

    #[test]
    fn test_self_attestation_rejects_alg_mismatch() {
        let fixture = fixture();
        let client_data_hash = [0x99u8; 32];
        let ctx = ctx(&fixture, &client_data_hash);
        let signature: p256::ecdsa::DerSignature = fixture.signing_key.sign(&ctx.signed_message());

        // Credential key is ES256; statement claims EdDSA.
        let mut warnings = Vec::new();
        assert!(matches!(
            verify(&statement(-8, signature.as_bytes()), &ctx, &mut warnings),
            Err(WebAuthnError::InvalidAttestation(_))
        ));
    }

    #[test]
    fn test_self_attestation_rejects_bad_signature() {
        let fixture = fixture();
        let client_data_hash = [0x99u8; 32];
        let ctx = ctx(&fixture, &client_data_hash);
        let signature: p256::ecdsa::DerSignature = fixture.signing_key.sign(b"something else");

        let mut warnings = Vec::new();
        assert!(matches!(
            verify(&statement(-7, signature.as_bytes()), &ctx, &mut warnings),
            Err(WebAuthnError::InvalidAttestation(_))
        ));
    }

    #[test]
    fn test_rejects_missing_sig() {
        let fixture = fixture();
        let client_data_hash = [0x99u8; 32];
        let ctx = ctx(&fixture, &client_data_hash);
        let stmt = vec![(Value::Text("alg".to_string()), Value::Integer((-7).into()))];
        let mut warnings = Vec::new();
        assert!(matches!(
            verify(&stmt, &ctx, &mut warnings),
            Err(WebAuthnError::InvalidAttestation(_))
        ));
    }

    #[test]
    fn test_rejects_ecdaa() {
        let fixture = fixture();
        let client_data_hash = [0x99u8; 32];
        let ctx = ctx(&fixture, &client_data_hash);
        let mut stmt = statement(-7, &[0u8; 70]);
        stmt.push((Value::Text("ecdaaKeyId".to_string()), Value::Bytes(vec![1, 2, 3])));
        let mut warnings = Vec::new();
        assert!(matches!(
            verify(&stmt, &ctx, &mut warnings),
            Err(WebAuthnError::InvalidAttestation(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_alg() {
        let fixture = fixture();
        let client_data_hash = [0x99u8; 32];
        let ctx = ctx(&fixture, &client_data_hash);
        let mut warnings = Vec::new();
        assert!(matches!(
            verify(&statement(-999, &[0u8; 70]), &ctx, &mut warnings),
            Err(WebAuthnError::UnsupportedAlgorithm(-999))
        ));
    }

    #[test]
    fn test_parse_aaguid_extension_strips_octet_string() {
        // OCTET STRING of 16 bytes
        let mut ext = vec![0x04, 0x10];
        ext.extend_from_slice(&[0xa1; 16]);
        assert_eq!(parse_aaguid_extension(&ext).expect("parses"), [0xa1; 16]);

        // wrong inner length
        let ext = [0x04, 0x02, 0x01, 0x02];
        assert!(parse_aaguid_extension(&ext).is_err());
    }
}
