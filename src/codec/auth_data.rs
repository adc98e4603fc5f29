//! Authenticator data parsing
//!
//! Binary layout (all lengths fixed unless noted):
//!
//! | Offset | Length | Field                                  |
//! |--------|--------|----------------------------------------|
//! | 0      | 32     | RP ID hash (SHA-256)                   |
//! | 32     | 1      | Flags                                  |
//! | 33     | 4      | Signature counter (big-endian u32)     |
//! | 37     | 16     | AAGUID                  (AT flag only)  |
//! | 53     | 2      | Credential ID length L  (AT flag only)  |
//! | 55     | L      | Credential ID           (AT flag only)  |
//! | 55+L   | var    | COSE public key (CBOR)  (AT flag only)  |
//! | ...    | var    | Extension CBOR map      (ED flag only)  |
//!
//! Parsing is total: every length-bearing read is bounds-checked, and the
//! input must be consumed exactly.

use ciborium::Value;

use crate::codec::{cbor, cose::CosePublicKey};
use crate::error::{WebAuthnError, WebAuthnResult};
use crate::types::{Aaguid, CredentialId};

/// Flag bits: UP(0), UV(2), AT(6), ED(7). Bits 1 and 3 to 5 are reserved and
/// carried through in `raw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatorDataFlags {
    pub user_present: bool,
    pub user_verified: bool,
    pub attested_credential_data: bool,
    pub extension_data: bool,
    pub raw: u8,
}

impl From<u8> for AuthenticatorDataFlags {
    fn from(raw: u8) -> Self {
        Self {
            user_present: raw & (1 << 0) != 0,
            user_verified: raw & (1 << 2) != 0,
            attested_credential_data: raw & (1 << 6) != 0,
            extension_data: raw & (1 << 7) != 0,
            raw,
        }
    }
}

/// Credential material present when the AT flag is set.
#[derive(Debug, Clone)]
pub struct AttestedCredentialData {
    pub aaguid: Aaguid,
    pub credential_id: CredentialId,
    pub public_key: CosePublicKey,
    /// COSE_Key bytes exactly as transmitted, for persistence.
    pub public_key_bytes: Vec<u8>,
}

/// Parsed authenticator data.
#[derive(Debug, Clone)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    pub flags: AuthenticatorDataFlags,
    pub sign_count: u32,
    pub attested_credential_data: Option<AttestedCredentialData>,
    pub extensions: Option<Value>,
}

/// Fixed head: rpIdHash(32) + flags(1) + signCount(4).
const FIXED_HEAD_LENGTH: usize = 37;

/// AAGUID(16) + credential ID length(2).
const ATTESTED_PREFIX_LENGTH: usize = 18;

/// Protocol ceiling on credential ID length.
const MAX_CREDENTIAL_ID_LENGTH: usize = 1023;

impl AuthenticatorData {
    /// Parses authenticator data, consuming `data` exactly.
    pub fn parse(data: &[u8]) -> WebAuthnResult<Self> {
        if data.len() < FIXED_HEAD_LENGTH {
            return Err(WebAuthnError::MalformedData(format!(
                "authenticator data too short: {} bytes, expected at least {FIXED_HEAD_LENGTH}",
                data.len()
            )));
        }

        let rp_id_hash: [u8; 32] = data[0..32]
            .try_into()
            .map_err(|_| WebAuthnError::MalformedData("RP ID hash".to_string()))?;
        let flags = AuthenticatorDataFlags::from(data[32]);
        let sign_count = u32::from_be_bytes(
            data[33..37]
                .try_into()
                .map_err(|_| WebAuthnError::MalformedData("signature counter".to_string()))?,
        );

        let mut offset = FIXED_HEAD_LENGTH;

        let attested_credential_data = if flags.attested_credential_data {
            let (parsed, consumed) = parse_attested_credential_data(&data[offset..])?;
            offset += consumed;
            Some(parsed)
        } else {
            None
        };

        let extensions = if flags.extension_data {
            let rest = &data[offset..];
            if rest.is_empty() {
                return Err(WebAuthnError::MalformedData(
                    "ED flag set but no extension data".to_string(),
                ));
            }
            // The extension map must cover the remaining bytes precisely.
            let value = cbor::decode(rest)?;
            if !value.is_map() {
                return Err(WebAuthnError::MalformedData(
                    "extension data is not a CBOR map".to_string(),
                ));
            }
            offset = data.len();
            Some(value)
        } else {
            None
        };

        if offset != data.len() {
            return Err(WebAuthnError::MalformedData(
                "trailing bytes after authenticator data".to_string(),
            ));
        }

        Ok(Self { rp_id_hash, flags, sign_count, attested_credential_data, extensions })
    }
}

fn parse_attested_credential_data(
    data: &[u8],
) -> WebAuthnResult<(AttestedCredentialData, usize)> {
    if data.len() < ATTESTED_PREFIX_LENGTH {
        return Err(WebAuthnError::MalformedData(
            "attested credential data truncated".to_string(),
        ));
    }

    let aaguid: [u8; 16] = data[0..16]
        .try_into()
        .map_err(|_| WebAuthnError::MalformedData("AAGUID".to_string()))?;
    let credential_id_length = u16::from_be_bytes(
        data[16..18]
            .try_into()
            .map_err(|_| WebAuthnError::MalformedData("credential ID length".to_string()))?,
    ) as usize;

    if credential_id_length > MAX_CREDENTIAL_ID_LENGTH {
        return Err(WebAuthnError::MalformedData(format!(
            "credential ID length {credential_id_length} exceeds {MAX_CREDENTIAL_ID_LENGTH}"
        )));
    }

    let key_offset = ATTESTED_PREFIX_LENGTH
        .checked_add(credential_id_length)
        .ok_or_else(|| WebAuthnError::MalformedData("credential ID length".to_string()))?;
    if data.len() < key_offset {
        return Err(WebAuthnError::MalformedData(
            "credential ID exceeds buffer".to_string(),
        ));
    }
    let credential_id = data[ATTESTED_PREFIX_LENGTH..key_offset].to_vec();

    let key_region = &data[key_offset..];
    if key_region.is_empty() {
        return Err(WebAuthnError::MalformedData("missing credential public key".to_string()));
    }
    let key_length = cbor::item_length(key_region)?;
    let public_key_bytes = key_region[..key_length].to_vec();
    let public_key = CosePublicKey::decode(&public_key_bytes)?;

    Ok((
        AttestedCredentialData {
            aaguid: Aaguid(aaguid),
            credential_id: CredentialId(credential_id),
            public_key,
            public_key_bytes,
        },
        key_offset + key_length,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::cose::{CoseAlgorithm, EcCurve};

    fn sample_key_bytes() -> Vec<u8> {
        CosePublicKey::Ec2 {
            alg: CoseAlgorithm::Es256,
            curve: EcCurve::P256,
            x: vec![0x11; 32],
            y: vec![0x22; 32],
        }
        .encode()
        .expect("encodes")
    }

    fn build_auth_data(flags: u8, counter: u32, attested: bool, extensions: Option<&[u8]>) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&[0xdd; 32]);
        data.push(flags);
        data.extend_from_slice(&counter.to_be_bytes());
        if attested {
            data.extend_from_slice(&[0xa1; 16]);
            let credential_id = [0x42u8; 20];
            data.extend_from_slice(&(credential_id.len() as u16).to_be_bytes());
            data.extend_from_slice(&credential_id);
            data.extend_from_slice(&sample_key_bytes());
        }
        if let Some(ext) = extensions {
            data.extend_from_slice(ext);
        }
        data
    }

    #[test]
    fn test_parse_assertion_shape() {
        let data = build_auth_data(0b0000_0101, 42, false, None);
        let parsed = AuthenticatorData::parse(&data).expect("parses");
        assert!(parsed.flags.user_present);
        assert!(parsed.flags.user_verified);
        assert!(!parsed.flags.attested_credential_data);
        assert_eq!(parsed.sign_count, 42);
        assert!(parsed.attested_credential_data.is_none());
    }

    #[test]
    fn test_parse_attested_shape() {
        let data = build_auth_data(0b0100_0001, 0, true, None);
        let parsed = AuthenticatorData::parse(&data).expect("parses");
        let attested = parsed.attested_credential_data.expect("attested data");
        assert_eq!(attested.credential_id.as_bytes().len(), 20);
        assert_eq!(attested.public_key.alg(), CoseAlgorithm::Es256);
        assert_eq!(attested.public_key_bytes, sample_key_bytes());
    }

    #[test]
    fn test_parse_with_extension_map() {
        let mut ext = Vec::new();
        ciborium::into_writer(
            &Value::Map(vec![(Value::Text("credProtect".to_string()), Value::Integer(2.into()))]),
            &mut ext,
        )
        .expect("encodes");
        let data = build_auth_data(0b1000_0001, 1, false, Some(&ext));
        let parsed = AuthenticatorData::parse(&data).expect("parses");
        assert!(parsed.extensions.is_some());
    }

    #[test]
    fn test_parse_rejects_short_input() {
        let data = vec![0u8; 36];
        assert!(matches!(
            AuthenticatorData::parse(&data),
            Err(WebAuthnError::MalformedData(_))
        ));
    }

    #[test]
    fn test_parse_rejects_trailing_bytes() {
        let mut data = build_auth_data(0b0000_0001, 7, false, None);
        data.push(0x00);
        assert!(matches!(
            AuthenticatorData::parse(&data),
            Err(WebAuthnError::MalformedData(_))
        ));
    }

    #[test]
    fn test_parse_rejects_oversized_credential_id() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0xdd; 32]);
        data.push(0b0100_0001);
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&[0xa1; 16]);
        data.extend_from_slice(&1024u16.to_be_bytes());
        data.extend_from_slice(&[0x42; 1024]);
        data.extend_from_slice(&sample_key_bytes());
        assert!(matches!(
            AuthenticatorData::parse(&data),
            Err(WebAuthnError::MalformedData(_))
        ));
    }

    #[test]
    fn test_parse_rejects_credential_id_past_buffer() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0xdd; 32]);
        data.push(0b0100_0001);
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&[0xa1; 16]);
        data.extend_from_slice(&500u16.to_be_bytes());
        data.extend_from_slice(&[0x42; 10]); // far fewer than claimed
        assert!(matches!(
            AuthenticatorData::parse(&data),
            Err(WebAuthnError::MalformedData(_))
        ));
    }

    #[test]
    fn test_parse_rejects_ed_flag_without_map() {
        let data = build_auth_data(0b1000_0001, 1, false, None);
        assert!(matches!(
            AuthenticatorData::parse(&data),
            Err(WebAuthnError::MalformedData(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_map_extension_data() {
        let mut ext = Vec::new();
        ciborium::into_writer(&Value::Integer(5.into()), &mut ext).expect("encodes");
        let data = build_auth_data(0b1000_0001, 1, false, Some(&ext));
        assert!(matches!(
            AuthenticatorData::parse(&data),
            Err(WebAuthnError::MalformedData(_))
        ));
    }

    #[test]
    fn test_flags_decode_bits() {
        let flags = AuthenticatorDataFlags::from(0b1100_0101);
        assert!(flags.user_present);
        assert!(flags.user_verified);
        assert!(flags.attested_credential_data);
        assert!(flags.extension_data);
        assert_eq!(flags.raw, 0b1100_0101);
    }
}
