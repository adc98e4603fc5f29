//! Ceremony error handling module
//!
//! Defines the error type returned by every fallible ceremony step, together
//! with stable error codes and messages that are safe to forward to clients.

use thiserror::Error;

/// Stable error codes, one per error kind, for host transport layers.
pub mod codes {
    pub const MALFORMED_DATA: &str = "MALFORMED_DATA";
    pub const CHALLENGE_MISMATCH: &str = "CHALLENGE_MISMATCH";
    pub const ORIGIN_MISMATCH: &str = "ORIGIN_MISMATCH";
    pub const RP_ID_HASH_MISMATCH: &str = "RP_ID_HASH_MISMATCH";
    pub const USER_PRESENCE_MISSING: &str = "USER_PRESENCE_MISSING";
    pub const USER_VERIFICATION_REQUIRED: &str = "USER_VERIFICATION_REQUIRED";
    pub const UNSUPPORTED_ALGORITHM: &str = "UNSUPPORTED_ALGORITHM";
    pub const UNKNOWN_ATTESTATION_FORMAT: &str = "UNKNOWN_ATTESTATION_FORMAT";
    pub const INVALID_ATTESTATION: &str = "INVALID_ATTESTATION";
    pub const UNTRUSTED_ATTESTATION: &str = "UNTRUSTED_ATTESTATION";
    pub const SIGNATURE_INVALID: &str = "SIGNATURE_INVALID";
    pub const CREDENTIAL_NOT_REGISTERED: &str = "CREDENTIAL_NOT_REGISTERED";
    pub const USER_HANDLE_MISMATCH: &str = "USER_HANDLE_MISMATCH";
    pub const DISALLOWED_CREDENTIAL: &str = "DISALLOWED_CREDENTIAL";
    pub const COUNTER_ROLLBACK: &str = "COUNTER_ROLLBACK";
    pub const UNREQUESTED_EXTENSION: &str = "UNREQUESTED_EXTENSION";
    pub const TOKEN_BINDING_REJECTED: &str = "TOKEN_BINDING_REJECTED";
    pub const CONFIGURATION_ERROR: &str = "CONFIGURATION_ERROR";
    pub const INTERNAL_CRYPTO_ERROR: &str = "INTERNAL_CRYPTO_ERROR";
    pub const INTERNAL_STORE_ERROR: &str = "INTERNAL_STORE_ERROR";
}

/// Error type covering every way a ceremony can fail.
///
/// Messages never embed challenges, public keys, or signatures; the detail
/// strings carry structural context only.
#[derive(Debug, Error)]
pub enum WebAuthnError {
    #[error("Malformed data: {0}")]
    MalformedData(String),

    #[error("Challenge does not match the one issued for this ceremony")]
    ChallengeMismatch,

    #[error("Origin is not in the allowed set")]
    OriginMismatch,

    #[error("RP ID hash does not match this relying party")]
    RpIdHashMismatch,

    #[error("User presence flag not set")]
    UserPresenceMissing,

    #[error("User verification required but flag not set")]
    UserVerificationRequired,

    #[error("Unsupported COSE algorithm: {0}")]
    UnsupportedAlgorithm(i64),

    #[error("Unknown attestation statement format: {0}")]
    UnknownAttestationFormat(String),

    #[error("Invalid attestation: {0}")]
    InvalidAttestation(String),

    #[error("Attestation is not trusted under the current policy")]
    UntrustedAttestation,

    #[error("Signature verification failed")]
    SignatureInvalid,

    #[error("Credential is not registered")]
    CredentialNotRegistered,

    #[error("User handle does not match the registered credential")]
    UserHandleMismatch,

    #[error("Credential is not allowed for this ceremony")]
    DisallowedCredential,

    #[error("Signature counter did not increase: received {received}, stored {stored}")]
    CounterRollback { received: u32, stored: u32 },

    #[error("Authenticator returned extension output that was not requested")]
    UnrequestedExtension,

    #[error("Token binding verification rejected the connection binding")]
    TokenBindingRejected,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cryptographic backend failure: {0}")]
    InternalCryptoError(String),

    #[error("Credential store failure")]
    InternalStoreError(#[from] anyhow::Error),
}

impl WebAuthnError {
    /// Returns the stable error code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            WebAuthnError::MalformedData(_) => codes::MALFORMED_DATA,
            WebAuthnError::ChallengeMismatch => codes::CHALLENGE_MISMATCH,
            WebAuthnError::OriginMismatch => codes::ORIGIN_MISMATCH,
            WebAuthnError::RpIdHashMismatch => codes::RP_ID_HASH_MISMATCH,
            WebAuthnError::UserPresenceMissing => codes::USER_PRESENCE_MISSING,
            WebAuthnError::UserVerificationRequired => codes::USER_VERIFICATION_REQUIRED,
            WebAuthnError::UnsupportedAlgorithm(_) => codes::UNSUPPORTED_ALGORITHM,
            WebAuthnError::UnknownAttestationFormat(_) => codes::UNKNOWN_ATTESTATION_FORMAT,
            WebAuthnError::InvalidAttestation(_) => codes::INVALID_ATTESTATION,
            WebAuthnError::UntrustedAttestation => codes::UNTRUSTED_ATTESTATION,
            WebAuthnError::SignatureInvalid => codes::SIGNATURE_INVALID,
            WebAuthnError::CredentialNotRegistered => codes::CREDENTIAL_NOT_REGISTERED,
            WebAuthnError::UserHandleMismatch => codes::USER_HANDLE_MISMATCH,
            WebAuthnError::DisallowedCredential => codes::DISALLOWED_CREDENTIAL,
            WebAuthnError::CounterRollback { .. } => codes::COUNTER_ROLLBACK,
            WebAuthnError::UnrequestedExtension => codes::UNREQUESTED_EXTENSION,
            WebAuthnError::TokenBindingRejected => codes::TOKEN_BINDING_REJECTED,
            WebAuthnError::Configuration(_) => codes::CONFIGURATION_ERROR,
            WebAuthnError::InternalCryptoError(_) => codes::INTERNAL_CRYPTO_ERROR,
            WebAuthnError::InternalStoreError(_) => codes::INTERNAL_STORE_ERROR,
        }
    }

    /// Returns a message safe for end-user consumption (no internal details).
    pub fn safe_message(&self) -> String {
        match self {
            // These are safe to expose as-is
            WebAuthnError::ChallengeMismatch
            | WebAuthnError::OriginMismatch
            | WebAuthnError::UserPresenceMissing
            | WebAuthnError::UserVerificationRequired
            | WebAuthnError::SignatureInvalid
            | WebAuthnError::CredentialNotRegistered
            | WebAuthnError::DisallowedCredential
            | WebAuthnError::UntrustedAttestation => self.to_string(),

            WebAuthnError::MalformedData(_) => {
                "The authenticator response could not be parsed".to_string()
            }
            WebAuthnError::RpIdHashMismatch => {
                "The response was produced for a different relying party".to_string()
            }
            WebAuthnError::UnsupportedAlgorithm(_) => {
                "The credential uses an unsupported algorithm".to_string()
            }
            WebAuthnError::UnknownAttestationFormat(_) => {
                "The attestation statement format is not recognized".to_string()
            }
            WebAuthnError::InvalidAttestation(_) => {
                "Attestation statement verification failed".to_string()
            }
            WebAuthnError::UserHandleMismatch => {
                "The credential belongs to a different account".to_string()
            }
            WebAuthnError::CounterRollback { .. } => {
                "The authenticator signature counter did not increase".to_string()
            }
            WebAuthnError::UnrequestedExtension => {
                "The authenticator returned unexpected extension data".to_string()
            }
            WebAuthnError::TokenBindingRejected => {
                "Token binding verification failed".to_string()
            }

            // These should not expose internal details
            WebAuthnError::Configuration(_) => "The relying party is misconfigured".to_string(),
            WebAuthnError::InternalCryptoError(_) => "An internal error occurred".to_string(),
            WebAuthnError::InternalStoreError(_) => "A credential store error occurred".to_string(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type WebAuthnResult<T> = Result<T, WebAuthnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_is_stable_per_kind() {
        assert_eq!(WebAuthnError::ChallengeMismatch.code(), codes::CHALLENGE_MISMATCH);
        assert_eq!(
            WebAuthnError::CounterRollback { received: 5, stored: 5 }.code(),
            codes::COUNTER_ROLLBACK
        );
        assert_eq!(
            WebAuthnError::MalformedData("cbor".to_string()).code(),
            codes::MALFORMED_DATA
        );
    }

    #[test]
    fn test_safe_message_hides_structural_detail() {
        let err = WebAuthnError::MalformedData("authData truncated at offset 53".to_string());
        assert!(!err.safe_message().contains("53"));

        let err = WebAuthnError::InternalCryptoError("p256 backend rejected point".to_string());
        assert!(!err.safe_message().contains("p256"));
    }
}
