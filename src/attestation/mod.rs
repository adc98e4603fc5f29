//! Attestation statement verification
//!
//! One verifier per statement format, dispatched over a closed enum. Each
//! verifier checks the statement against the authenticator data and client
//! data hash and, on success, reports the attestation type it established
//! together with the certificate trust path (leaf first, possibly empty).
//! Trust against metadata anchors is decided later by the registration
//! engine; verifiers only establish that the statement is internally sound.

pub mod android_key;
pub mod fido_u2f;
pub mod none;
pub mod packed;
pub mod safetynet;
pub mod tpm;

use chrono::{DateTime, Utc};
use ciborium::Value;

use crate::codec::auth_data::{AttestedCredentialData, AuthenticatorData};
use crate::error::{WebAuthnError, WebAuthnResult};
use crate::types::{AttestationType, Warning};

/// The statement formats this relying party understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationFormat {
    Packed,
    Tpm,
    AndroidKey,
    AndroidSafetynet,
    FidoU2f,
    None,
    /// Anything else, carried for diagnostics.
    Unknown(String),
}

impl AttestationFormat {
    pub fn from_identifier(identifier: &str) -> Self {
        match identifier {
            "packed" => AttestationFormat::Packed,
            "tpm" => AttestationFormat::Tpm,
            "android-key" => AttestationFormat::AndroidKey,
            "android-safetynet" => AttestationFormat::AndroidSafetynet,
            "fido-u2f" => AttestationFormat::FidoU2f,
            "none" => AttestationFormat::None,
            other => AttestationFormat::Unknown(other.to_string()),
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            AttestationFormat::Packed => "packed",
            AttestationFormat::Tpm => "tpm",
            AttestationFormat::AndroidKey => "android-key",
            AttestationFormat::AndroidSafetynet => "android-safetynet",
            AttestationFormat::FidoU2f => "fido-u2f",
            AttestationFormat::None => "none",
            AttestationFormat::Unknown(identifier) => identifier,
        }
    }
}

/// What a statement verifier established.
#[derive(Debug, Clone)]
pub struct VerifiedAttestation {
    pub attestation_type: AttestationType,
    /// DER certificates, leaf first. Empty for `none` and self attestation.
    pub trust_path: Vec<Vec<u8>>,
}

/// Inputs shared by every statement verifier.
pub struct AttestationContext<'a> {
    pub auth_data: &'a AuthenticatorData,
    pub raw_auth_data: &'a [u8],
    pub client_data_hash: &'a [u8; 32],
    /// RP clock reading, for certificate windows and SafetyNet freshness.
    pub now: DateTime<Utc>,
    pub safetynet_clock_skew_ms: u64,
}

impl AttestationContext<'_> {
    /// The byte string attestation signatures cover.
    pub fn signed_message(&self) -> Vec<u8> {
        let mut message = Vec::with_capacity(self.raw_auth_data.len() + 32);
        message.extend_from_slice(self.raw_auth_data);
        message.extend_from_slice(self.client_data_hash);
        message
    }

    /// Attested credential data, required by every format except `none`.
    pub fn attested_credential(&self) -> WebAuthnResult<&AttestedCredentialData> {
        self.auth_data.attested_credential_data.as_ref().ok_or_else(|| {
            WebAuthnError::InvalidAttestation("missing attested credential data".to_string())
        })
    }
}

/// Dispatches to the verifier for `format`.
pub fn verify_statement(
    format: &AttestationFormat,
    att_stmt: &[(Value, Value)],
    ctx: &AttestationContext<'_>,
    warnings: &mut Vec<Warning>,
) -> WebAuthnResult<VerifiedAttestation> {
    tracing::debug!(format = format.identifier(), "verifying attestation statement");
    match format {
        AttestationFormat::Packed => packed::verify(att_stmt, ctx, warnings),
        AttestationFormat::Tpm => tpm::verify(att_stmt, ctx, warnings),
        AttestationFormat::AndroidKey => android_key::verify(att_stmt, ctx, warnings),
        AttestationFormat::AndroidSafetynet => safetynet::verify(att_stmt, ctx, warnings),
        AttestationFormat::FidoU2f => fido_u2f::verify(att_stmt, ctx, warnings),
        AttestationFormat::None => none::verify(att_stmt, ctx, warnings),
        AttestationFormat::Unknown(identifier) => {
            Err(WebAuthnError::UnknownAttestationFormat(identifier.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_identifiers_round_trip() {
        for identifier in ["packed", "tpm", "android-key", "android-safetynet", "fido-u2f", "none"] {
            let format = AttestationFormat::from_identifier(identifier);
            assert!(!matches!(format, AttestationFormat::Unknown(_)));
            assert_eq!(format.identifier(), identifier);
        }
    }

    #[test]
    fn test_unknown_format_is_carried() {
        let format = AttestationFormat::from_identifier("apple");
        assert_eq!(format, AttestationFormat::Unknown("apple".to_string()));
        assert_eq!(format.identifier(), "apple");
    }
}
