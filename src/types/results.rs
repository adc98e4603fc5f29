//! Ceremony outcome types
//!
//! Results carry everything the caller's credential store needs to persist,
//! plus non-fatal advisories collected along the way.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::cose::CoseAlgorithm;

use super::entities::{Aaguid, CredentialId, UserHandle};

/// Attestation type established by the statement verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttestationType {
    /// No attestation was provided.
    None,
    /// The credential key itself signed the attestation.
    SelfAttestation,
    /// A per-model attestation key signed under a vendor CA.
    Basic,
    /// An attestation CA issued the attestation key (e.g. TPM AIK).
    AttCa,
    /// The format cannot distinguish Basic from AttCA.
    BasicOrAttCa,
}

/// Non-fatal advisories surfaced alongside a successful ceremony.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Warning {
    /// The metadata service had no entry for this authenticator.
    NoMetadataFound,
    /// An ECDSA signature carried a non-normalized (high) S value.
    NonNormalizedSignature,
    /// The authenticator reported a signature counter of zero.
    CounterZero,
    /// The signature counter did not increase but policy let the ceremony pass.
    CounterRollback,
    /// A full attestation statement arrived although "none" was requested.
    UnrequestedAttestation,
    /// The metadata service reports this authenticator model as revoked.
    AuthenticatorRevoked,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::NoMetadataFound => write!(f, "NoMetadataFound"),
            Warning::NonNormalizedSignature => write!(f, "NonNormalizedSignature"),
            Warning::CounterZero => write!(f, "CounterZero"),
            Warning::CounterRollback => write!(f, "CounterRollback"),
            Warning::UnrequestedAttestation => write!(f, "UnrequestedAttestation"),
            Warning::AuthenticatorRevoked => write!(f, "AuthenticatorRevoked"),
        }
    }
}

/// Authenticator-model facts attached to a registration when the metadata
/// service knows the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationMetadata {
    pub aaguid: Option<String>,
    #[serde(rename = "authenticatorStatus")]
    pub authenticator_status: Option<String>,
    #[serde(rename = "deviceIdentifiers", default)]
    pub device_identifiers: Vec<String>,
    pub description: Option<String>,
}

/// Outcome of a successful registration ceremony.
///
/// The caller persists `credential_id`, `user_handle`, `public_key_cose`, and
/// `signature_counter` as the stored credential record.
#[derive(Debug, Clone)]
pub struct RegistrationResult {
    pub credential_id: CredentialId,
    pub user_handle: UserHandle,
    /// COSE_Key bytes exactly as the authenticator produced them.
    pub public_key_cose: Vec<u8>,
    pub algorithm: CoseAlgorithm,
    pub aaguid: Aaguid,
    pub attestation_type: AttestationType,
    pub attestation_trusted: bool,
    pub attestation_metadata: Option<AttestationMetadata>,
    pub warnings: Vec<Warning>,
    pub signature_counter: u32,
}

/// Outcome of a successful assertion ceremony.
#[derive(Debug, Clone)]
pub struct AssertionResult {
    pub credential_id: CredentialId,
    pub user_handle: UserHandle,
    /// Account name resolved through the credential store, when known.
    pub username: Option<String>,
    /// The counter reported by the authenticator; the caller stores it on
    /// success.
    pub signature_count: u32,
    /// False when the counter failed to increase past the stored value.
    pub signature_counter_valid: bool,
    pub success: bool,
    pub warnings: Vec<Warning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display_matches_wire_name() {
        assert_eq!(Warning::NoMetadataFound.to_string(), "NoMetadataFound");
        assert_eq!(Warning::NonNormalizedSignature.to_string(), "NonNormalizedSignature");
    }

    #[test]
    fn test_attestation_metadata_serializes_camel_case() {
        let metadata = AttestationMetadata {
            aaguid: Some("00112233-4455-6677-8899-aabbccddeeff".to_string()),
            authenticator_status: Some("FIDO_CERTIFIED".to_string()),
            device_identifiers: vec!["id1".to_string()],
            description: None,
        };
        let json = serde_json::to_value(&metadata).expect("serializes");
        assert!(json.get("authenticatorStatus").is_some());
        assert!(json.get("deviceIdentifiers").is_some());
    }
}
