//! `android-key` attestation
//!
//! The leaf certificate's key signs `authData || clientDataHash`, and the
//! certificate carries the Key Attestation extension whose KeyDescription
//! binds the key to this ceremony:
//!
//! ```asn1
//! KeyDescription ::= SEQUENCE {
//!     attestationVersion         INTEGER,
//!     attestationSecurityLevel   SecurityLevel,
//!     keymasterVersion           INTEGER,
//!     keymasterSecurityLevel     SecurityLevel,
//!     attestationChallenge       OCTET STRING,
//!     uniqueId                   OCTET STRING,
//!     softwareEnforced           AuthorizationList,
//!     teeEnforced                AuthorizationList,
//! }
//! ```
//!
//! `attestationChallenge` must equal the client data hash, neither
//! authorization list may scope the key to all applications, the key origin
//! must be GENERATED, and the purposes must include SIGN.

use ciborium::Value;
use der_parser::ber::{BerObject, BerObjectContent};
use der_parser::oid::Oid;

use crate::codec::cbor;
use crate::codec::cose::CoseAlgorithm;
use crate::crypto;
use crate::error::{WebAuthnError, WebAuthnResult};
use crate::types::{AttestationType, Warning};

use super::{packed::decode_certificate_array, AttestationContext, VerifiedAttestation};

// Android Key Attestation extension OID: 1.3.6.1.4.1.11129.2.1.17
const KEY_ATTESTATION_EXTENSION_OID: &[u64] = &[1, 3, 6, 1, 4, 1, 11129, 2, 1, 17];

// AuthorizationList tags of interest
const TAG_PURPOSE: u32 = 1;
const TAG_ALL_APPLICATIONS: u32 = 600;
const TAG_ORIGIN: u32 = 702;

// KeyMaster constants
const KM_PURPOSE_SIGN: i64 = 2;
const KM_ORIGIN_GENERATED: i64 = 0;

pub(super) fn verify(
    att_stmt: &[(Value, Value)],
    ctx: &AttestationContext<'_>,
    warnings: &mut Vec<Warning>,
) -> WebAuthnResult<VerifiedAttestation> {
    let alg_id = cbor::map_int(att_stmt, "alg").ok_or_else(|| {
        WebAuthnError::InvalidAttestation("android-key: missing alg".to_string())
    })?;
    let alg = CoseAlgorithm::try_from(alg_id)?;
    let signature = cbor::map_bytes(att_stmt, "sig").ok_or_else(|| {
        WebAuthnError::InvalidAttestation("android-key: missing sig".to_string())
    })?;
    let x5c = cbor::map_array(att_stmt, "x5c").ok_or_else(|| {
        WebAuthnError::InvalidAttestation("android-key: missing x5c".to_string())
    })?;
    let chain = decode_certificate_array(x5c)?;

    let leaf = crypto::chain::parse_certificate(&chain[0])?;
    let message = ctx.signed_message();
    crypto::verify_with_certificate(alg, &leaf, &message, signature, warnings).map_err(|e| {
        match e {
            WebAuthnError::SignatureInvalid => WebAuthnError::InvalidAttestation(
                "android-key: attestation signature verification failed".to_string(),
            ),
            other => other,
        }
    })?;

    let description = parse_key_description(&leaf)?;

    if description.attestation_challenge != ctx.client_data_hash {
        return Err(WebAuthnError::InvalidAttestation(
            "android-key: attestationChallenge does not match client data hash".to_string(),
        ));
    }
    if description.software_enforced.all_applications
        || description.tee_enforced.all_applications
    {
        return Err(WebAuthnError::InvalidAttestation(
            "android-key: key is scoped to all applications".to_string(),
        ));
    }

    let origin =
        description.tee_enforced.origin.or(description.software_enforced.origin);
    if origin != Some(KM_ORIGIN_GENERATED) {
        return Err(WebAuthnError::InvalidAttestation(
            "android-key: key origin is not GENERATED".to_string(),
        ));
    }

    let purposes = description
        .tee_enforced
        .purpose
        .as_deref()
        .or(description.software_enforced.purpose.as_deref())
        .unwrap_or(&[]);
    if !purposes.contains(&KM_PURPOSE_SIGN) {
        return Err(WebAuthnError::InvalidAttestation(
            "android-key: key purpose does not include SIGN".to_string(),
        ));
    }

    Ok(VerifiedAttestation { attestation_type: AttestationType::Basic, trust_path: chain })
}

/// The KeyDescription fields this verifier acts on.
#[derive(Debug, Default)]
struct KeyDescription {
    attestation_challenge: Vec<u8>,
    software_enforced: AuthorizationList,
    tee_enforced: AuthorizationList,
}

#[derive(Debug, Default)]
struct AuthorizationList {
    purpose: Option<Vec<i64>>,
    origin: Option<i64>,
    all_applications: bool,
}

fn parse_key_description(
    leaf: &x509_parser::certificate::X509Certificate<'_>,
) -> WebAuthnResult<KeyDescription> {
    let attestation_oid = Oid::from(KEY_ATTESTATION_EXTENSION_OID)
        .map_err(|_| WebAuthnError::InternalCryptoError("Key Attestation OID".to_string()))?;

    let extension = leaf
        .extensions()
        .iter()
        .find(|ext| ext.oid == attestation_oid)
        .ok_or_else(|| {
            WebAuthnError::InvalidAttestation(
                "android-key: Key Attestation extension not found".to_string(),
            )
        })?;

    let (_, sequence) = der_parser::parse_der(extension.value).map_err(|e| {
        WebAuthnError::InvalidAttestation(format!("android-key: extension parse: {e:?}"))
    })?;

    let items = match &sequence.content {
        BerObjectContent::Sequence(items) => items,
        _ => {
            return Err(WebAuthnError::InvalidAttestation(
                "android-key: KeyDescription is not a SEQUENCE".to_string(),
            ))
        }
    };
    if items.len() < 8 {
        return Err(WebAuthnError::InvalidAttestation(format!(
            "android-key: KeyDescription requires 8 fields, got {}",
            items.len()
        )));
    }

    Ok(KeyDescription {
        attestation_challenge: parse_octet_string(&items[4])?,
        software_enforced: parse_authorization_list(&items[6])?,
        tee_enforced: parse_authorization_list(&items[7])?,
    })
}

fn parse_authorization_list(obj: &BerObject<'_>) -> WebAuthnResult<AuthorizationList> {
    let items = match &obj.content {
        BerObjectContent::Sequence(items) => items,
        _ => {
            return Err(WebAuthnError::InvalidAttestation(
                "android-key: AuthorizationList is not a SEQUENCE".to_string(),
            ))
        }
    };

    let mut list = AuthorizationList::default();
    for item in items {
        match item.tag().0 {
            TAG_PURPOSE => list.purpose = parse_tagged_int_set(item).ok(),
            TAG_ALL_APPLICATIONS => list.all_applications = true,
            TAG_ORIGIN => list.origin = parse_tagged_integer(item).ok(),
            _ => {}
        }
    }
    Ok(list)
}

/// Unwraps an `[TAG] EXPLICIT value` element to the inner DER object.
fn tagged_inner<'a>(obj: &'a BerObject<'a>) -> WebAuthnResult<BerObject<'a>> {
    let data = obj.as_slice().map_err(|_| {
        WebAuthnError::InvalidAttestation("android-key: tagged value has no content".to_string())
    })?;
    let (_, inner) = der_parser::parse_der(data).map_err(|_| {
        WebAuthnError::InvalidAttestation("android-key: tagged value parse".to_string())
    })?;
    Ok(inner)
}

fn parse_tagged_integer(obj: &BerObject<'_>) -> WebAuthnResult<i64> {
    let inner = tagged_inner(obj)?;
    parse_integer(&inner)
}

fn parse_tagged_int_set(obj: &BerObject<'_>) -> WebAuthnResult<Vec<i64>> {
    let inner = tagged_inner(obj)?;
    match &inner.content {
        BerObjectContent::Set(items) => items.iter().map(parse_integer).collect(),
        _ => Err(WebAuthnError::InvalidAttestation(
            "android-key: expected SET OF INTEGER".to_string(),
        )),
    }
}

/// ASN.1 INTEGER in two's complement with sign extension.
fn parse_integer(obj: &BerObject<'_>) -> WebAuthnResult<i64> {
    match &obj.content {
        BerObjectContent::Integer(bytes) => {
            if bytes.is_empty() {
                return Ok(0);
            }
            if bytes.len() > 8 {
                return Err(WebAuthnError::InvalidAttestation(
                    "android-key: oversized INTEGER".to_string(),
                ));
            }
            let is_negative = (bytes[0] & 0x80) != 0;
            let mut value: i64 = if is_negative { -1 } else { 0 };
            for &byte in *bytes {
                value = (value << 8) | i64::from(byte);
            }
            Ok(value)
        }
        BerObjectContent::Enum(value) => i64::try_from(*value).map_err(|_| {
            WebAuthnError::InvalidAttestation("android-key: oversized ENUMERATED".to_string())
        }),
        _ => Err(WebAuthnError::InvalidAttestation(
            "android-key: expected INTEGER".to_string(),
        )),
    }
}

fn parse_octet_string(obj: &BerObject<'_>) -> WebAuthnResult<Vec<u8>> {
    match &obj.content {
        BerObjectContent::OctetString(bytes) => Ok(bytes.to_vec()),
        _ => Err(WebAuthnError::InvalidAttestation(
            "android-key: expected OCTET STRING".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integer_two_complement() {
        let obj = BerObject::from_obj(BerObjectContent::Integer(&[0x05]));
        assert_eq!(parse_integer(&obj).expect("parses"), 5);

        let obj = BerObject::from_obj(BerObjectContent::Integer(&[0x02, 0x58]));
        assert_eq!(parse_integer(&obj).expect("parses"), 600);

        let obj = BerObject::from_obj(BerObjectContent::Integer(&[0xff]));
        assert_eq!(parse_integer(&obj).expect("parses"), -1);
    }

    #[test]
    fn test_parse_integer_rejects_oversized() {
        let obj = BerObject::from_obj(BerObjectContent::Integer(&[0x01; 9]));
        assert!(parse_integer(&obj).is_err());
    }

    #[test]
    fn test_parse_octet_string_content() {
        let obj = BerObject::from_obj(BerObjectContent::OctetString(&[1, 2, 3]));
        assert_eq!(parse_octet_string(&obj).expect("parses"), vec![1, 2, 3]);

        let obj = BerObject::from_obj(BerObjectContent::Integer(&[1]));
        assert!(parse_octet_string(&obj).is_err());
    }

    #[test]
    fn test_missing_statement_fields_are_invalid() {
        let raw = {
            let mut data = vec![0u8; 37];
            data[32] = 0b0000_0001;
            data
        };
        let auth_data = crate::codec::auth_data::AuthenticatorData::parse(&raw).expect("parses");
        let client_data_hash = [0u8; 32];
        let ctx = AttestationContext {
            auth_data: &auth_data,
            raw_auth_data: &raw,
            client_data_hash: &client_data_hash,
            now: chrono::Utc::now(),
            safetynet_clock_skew_ms: 60_000,
        };
        let mut warnings = Vec::new();
        assert!(matches!(
            verify(&[], &ctx, &mut warnings),
            Err(WebAuthnError::InvalidAttestation(_))
        ));
    }
}
