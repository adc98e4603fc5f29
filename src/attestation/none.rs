//! `none` attestation
//!
//! No attestation was conveyed. The statement must be an empty map; whether
//! the registration is acceptable is a policy decision made by the
//! registration engine.

use ciborium::Value;

use crate::error::{WebAuthnError, WebAuthnResult};
use crate::types::{AttestationType, Warning};

use super::{AttestationContext, VerifiedAttestation};

pub(super) fn verify(
    att_stmt: &[(Value, Value)],
    _ctx: &AttestationContext<'_>,
    _warnings: &mut Vec<Warning>,
) -> WebAuthnResult<VerifiedAttestation> {
    if !att_stmt.is_empty() {
        return Err(WebAuthnError::InvalidAttestation(
            "attStmt must be empty for format none".to_string(),
        ));
    }
    Ok(VerifiedAttestation { attestation_type: AttestationType::None, trust_path: Vec::new() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::auth_data::AuthenticatorData;
    use chrono::Utc;

    fn auth_data_bytes() -> Vec<u8> {
        let mut data = vec![0u8; 37];
        data[32] = 0b0000_0001;
        data
    }

    #[test]
    fn test_none_accepts_empty_statement() {
        let raw = auth_data_bytes();
        let auth_data = AuthenticatorData::parse(&raw).expect("parses");
        let ctx = AttestationContext {
            auth_data: &auth_data,
            raw_auth_data: &raw,
            client_data_hash: &[0u8; 32],
            now: Utc::now(),
            safetynet_clock_skew_ms: 60_000,
        };
        let mut warnings = Vec::new();
        let verified = verify(&[], &ctx, &mut warnings).expect("verifies");
        assert_eq!(verified.attestation_type, AttestationType::None);
        assert!(verified.trust_path.is_empty());
    }

    #[test]
    fn test_none_rejects_populated_statement() {
        let raw = auth_data_bytes();
        let auth_data = AuthenticatorData::parse(&raw).expect("parses");
        let ctx = AttestationContext {
            auth_data: &auth_data,
            raw_auth_data: &raw,
            client_data_hash: &[0u8; 32],
            now: Utc::now(),
            safetynet_clock_skew_ms: 60_000,
        };
        let statement = vec![(Value::Text("alg".to_string()), Value::Integer((-7).into()))];
        let mut warnings = Vec::new();
        assert!(matches!(
            verify(&statement, &ctx, &mut warnings),
            Err(WebAuthnError::InvalidAttestation(_))
        ));
    }
}
