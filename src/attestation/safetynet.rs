//! `android-safetynet` attestation
//!
//! The statement wraps a SafetyNet attestation response: a compact JWS whose
//! payload binds `SHA256(authData || clientDataHash)` as its nonce. The
//! signing certificate must be issued to `attest.android.com`, the device
//! must pass the CTS profile check, and the attestation timestamp must sit
//! within the configured skew of the RP clock.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use ciborium::Value;
use serde::Deserialize;

use crate::codec::cbor;
use crate::codec::cose::CoseAlgorithm;
use crate::crypto;
use crate::error::{WebAuthnError, WebAuthnResult};
use crate::types::{AttestationType, Warning};

use super::{AttestationContext, VerifiedAttestation};

const EXPECTED_HOSTNAME: &str = "attest.android.com";

#[derive(Debug, Deserialize)]
struct JwsHeader {
    alg: String,
    /// Certificates, standard base64 as JWS prescribes.
    x5c: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct JwsPayload {
    nonce: String,
    #[serde(rename = "timestampMs")]
    timestamp_ms: i64,
    #[serde(rename = "ctsProfileMatch")]
    cts_profile_match: bool,
}

pub(super) fn verify(
    att_stmt: &[(Value, Value)],
    ctx: &AttestationContext<'_>,
    warnings: &mut Vec<Warning>,
) -> WebAuthnResult<VerifiedAttestation> {
    let version = cbor::map_text(att_stmt, "ver").ok_or_else(|| {
        WebAuthnError::InvalidAttestation("android-safetynet: missing ver".to_string())
    })?;
    if version.is_empty() {
        return Err(WebAuthnError::InvalidAttestation(
            "android-safetynet: empty ver".to_string(),
        ));
    }
    let response = cbor::map_bytes(att_stmt, "response").ok_or_else(|| {
        WebAuthnError::InvalidAttestation("android-safetynet: missing response".to_string())
    })?;

    let jws = std::str::from_utf8(response).map_err(|_| {
        WebAuthnError::InvalidAttestation("android-safetynet: response is not UTF-8".to_string())
    })?;
    let mut parts = jws.split('.');
    let (header_b64, payload_b64, signature_b64) =
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(p), Some(s), None) => (h, p, s),
            _ => {
                return Err(WebAuthnError::InvalidAttestation(
                    "android-safetynet: response is not a compact JWS".to_string(),
                ))
            }
        };

    let header: JwsHeader = serde_json::from_slice(&decode_jws_segment(header_b64)?)
        .map_err(|e| {
            WebAuthnError::InvalidAttestation(format!("android-safetynet: JWS header: {e}"))
        })?;
    let payload: JwsPayload = serde_json::from_slice(&decode_jws_segment(payload_b64)?)
        .map_err(|e| {
            WebAuthnError::InvalidAttestation(format!("android-safetynet: JWS payload: {e}"))
        })?;
    let signature = decode_jws_segment(signature_b64)?;

    // Certificate chain from the JWS header; the leaf signs the JWS.
    let chain: Vec<Vec<u8>> = header
        .x5c
        .iter()
        .map(|cert| STANDARD.decode(cert))
        .collect::<Result<_, _>>()
        .map_err(|_| {
            WebAuthnError::InvalidAttestation(
                "android-safetynet: x5c certificate is not base64".to_string(),
            )
        })?;
    let leaf_der = chain.first().ok_or_else(|| {
        WebAuthnError::InvalidAttestation("android-safetynet: empty x5c".to_string())
    })?;
    let leaf = crypto::chain::parse_certificate(leaf_der)?;

    let hostname_matches = leaf
        .subject()
        .iter_common_name()
        .filter_map(|cn| cn.as_str().ok())
        .any(|cn| cn == EXPECTED_HOSTNAME);
    if !hostname_matches {
        return Err(WebAuthnError::InvalidAttestation(format!(
            "android-safetynet: leaf CN is not {EXPECTED_HOSTNAME}"
        )));
    }

    // JWS signing input is the ASCII of "<header>.<payload>".
    let signing_input = format!("{header_b64}.{payload_b64}");
    let alg = match header.alg.as_str() {
        "RS256" => CoseAlgorithm::Rs256,
        "ES256" => CoseAlgorithm::Es256,
        other => {
            return Err(WebAuthnError::InvalidAttestation(format!(
                "android-safetynet: unsupported JWS alg {other}"
            )))
        }
    };
    let signature = match alg {
        // JWS ES256 signatures are raw r||s; re-encode as DER for the backend.
        CoseAlgorithm::Es256 => ecdsa_raw_to_der(&signature)?,
        _ => signature,
    };
    crypto::verify_with_certificate(alg, &leaf, signing_input.as_bytes(), &signature, warnings)
        .map_err(|e| match e {
            WebAuthnError::SignatureInvalid => WebAuthnError::InvalidAttestation(
                "android-safetynet: JWS signature verification failed".to_string(),
            ),
            other => other,
        })?;

    // Nonce binds the JWS to this ceremony.
    let expected_nonce = STANDARD.encode(crypto::sha256(&ctx.signed_message()));
    if payload.nonce != expected_nonce {
        return Err(WebAuthnError::InvalidAttestation(
            "android-safetynet: nonce mismatch".to_string(),
        ));
    }

    if !payload.cts_profile_match {
        return Err(WebAuthnError::InvalidAttestation(
            "android-safetynet: ctsProfileMatch is false".to_string(),
        ));
    }

    let now_ms = ctx.now.timestamp_millis();
    let skew = i64::try_from(ctx.safetynet_clock_skew_ms).unwrap_or(i64::MAX);
    if (now_ms - payload.timestamp_ms).abs() > skew {
        return Err(WebAuthnError::InvalidAttestation(
            "android-safetynet: timestamp outside the accepted window".to_string(),
        ));
    }

    Ok(VerifiedAttestation { attestation_type: AttestationType::Basic, trust_path: chain })
}

fn decode_jws_segment(segment: &str) -> WebAuthnResult<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(segment).map_err(|_| {
        WebAuthnError::InvalidAttestation("android-safetynet: JWS segment is not base64url".to_string())
    })
}

/// Wraps a raw `r || s` ECDSA signature as the ASN.1 DER SEQUENCE the
/// verification backend expects.
fn ecdsa_raw_to_der(raw: &[u8]) -> WebAuthnResult<Vec<u8>> {
    if raw.len() != 64 {
        return Err(WebAuthnError::InvalidAttestation(
            "android-safetynet: ES256 signature is not 64 bytes".to_string(),
        ));
    }
    let signature = p256::ecdsa::Signature::from_slice(raw).map_err(|_| {
        WebAuthnError::InvalidAttestation("android-safetynet: invalid ES256 signature".to_string())
    })?;
    Ok(signature.to_der().as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::auth_data::AuthenticatorData;
    use chrono::Utc;

    fn plain_ctx<'a>(
        raw: &'a [u8],
        auth_data: &'a AuthenticatorData,
        hash: &'a [u8; 32],
    ) -> AttestationContext<'a> {
        AttestationContext {
            auth_data,
            raw_auth_data: raw,
            client_data_hash: hash,
            now: Utc::now(),
            safetynet_clock_skew_ms: 60_000,
        }
    }

    fn minimal_auth_data() -> Vec<u8> {
        let mut data = vec![0u8; 37];
        data[32] = 0b0000_0001;
        data
    }

    #[test]
    fn test_rejects_missing_response() {
        let raw = minimal_auth_data();
        let auth_data = AuthenticatorData::parse(&raw).expect("parses");
        let hash = [0u8; 32];
        let ctx = plain_ctx(&raw, &auth_data, &hash);
        let stmt = vec![(Value::Text("ver".to_string()), Value::Text("14799021".to_string()))];
        let mut warnings = Vec::new();
        assert!(matches!(
            verify(&stmt, &ctx, &mut warnings),
            Err(WebAuthnError::InvalidAttestation(_))
        ));
    }

    #[test]
    fn test_rejects_non_jws_response() {
        let raw = minimal_auth_data();
        let auth_data = AuthenticatorData::parse(&raw).expect("parses");
        let hash = [0u8; 32];
        let ctx = plain_ctx(&raw, &auth_data, &hash);
        let stmt = vec![
            (Value::Text("ver".to_string()), Value::Text("14799021".to_string())),
            (Value::Text("response".to_string()), Value::Bytes(b"not.a".to_vec())),
        ];
        let mut warnings = Vec::new();
        assert!(matches!(
            verify(&stmt, &ctx, &mut warnings),
            Err(WebAuthnError::InvalidAttestation(_))
        ));
    }

    #[test]
    fn test_rejects_garbage_jws_segments() {
        let raw = minimal_auth_data();
        let auth_data = AuthenticatorData::parse(&raw).expect("parses");
        let hash = [0u8; 32];
        let ctx = plain_ctx(&raw, &auth_data, &hash);
        let stmt = vec![
            (Value::Text("ver".to_string()), Value::Text("14799021".to_string())),
            (
                Value::Text("response".to_string()),
                Value::Bytes(b"!!!.@@@.###".to_vec()),
            ),
        ];
        let mut warnings = Vec::new();
        assert!(matches!(
            verify(&stmt, &ctx, &mut warnings),
            Err(WebAuthnError::InvalidAttestation(_))
        ));
    }

    #[test]
    fn test_ecdsa_raw_to_der_rejects_wrong_length() {
        assert!(ecdsa_raw_to_der(&[0u8; 63]).is_err());
    }
}
