//! External collaborator capabilities
//!
//! The core holds no long-lived credential state. The caller supplies a
//! credential repository (account and key lookups) and, optionally, a
//! metadata service (attestation trust anchors per authenticator model).
//! Both may block and both may fail; failures surface to ceremonies as
//! `InternalStoreError` with the underlying reason attached. The core never
//! writes to either.

use crate::types::{Aaguid, CredentialId, PublicKeyCredentialDescriptor, UserHandle};

/// A credential as the caller's store persisted it after registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredCredential {
    pub credential_id: CredentialId,
    pub user_handle: UserHandle,
    /// COSE_Key bytes exactly as returned in the registration result.
    pub public_key_cose: Vec<u8>,
    /// Last signature counter the caller stored for this credential.
    pub signature_count: u32,
}

/// Account and credential lookups owned by the caller.
///
/// Implementations are the only non-pure inputs to a ceremony besides the
/// clock; they are permitted to block.
pub trait CredentialRepository: Send + Sync {
    /// Descriptors of every credential registered to `username`, for
    /// exclude/allow lists.
    fn credential_ids_for_username(
        &self,
        username: &str,
    ) -> anyhow::Result<Vec<PublicKeyCredentialDescriptor>>;

    fn user_handle_for_username(&self, username: &str) -> anyhow::Result<Option<UserHandle>>;

    fn username_for_user_handle(&self, user_handle: &UserHandle)
        -> anyhow::Result<Option<String>>;

    /// The credential registered under exactly this id and user handle.
    fn lookup(
        &self,
        credential_id: &CredentialId,
        user_handle: &UserHandle,
    ) -> anyhow::Result<Option<RegisteredCredential>>;

    /// Every credential stored under this id, across user handles. Non-empty
    /// results with distinct handles indicate a cross-account id collision.
    fn lookup_all(&self, credential_id: &CredentialId) -> anyhow::Result<Vec<RegisteredCredential>>;
}

/// Certification status a metadata entry reports for an authenticator model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticatorStatus {
    Certified,
    NotCertified,
    Revoked,
}

impl AuthenticatorStatus {
    /// Whether policy accepts attestations from a model in this status.
    pub fn is_acceptable(self) -> bool {
        !matches!(self, AuthenticatorStatus::Revoked)
    }
}

/// Metadata entry for one authenticator model.
#[derive(Debug, Clone)]
pub struct AuthenticatorMetadata {
    /// DER trust anchors the attestation chain must terminate at.
    pub trusted_roots: Vec<Vec<u8>>,
    pub status: AuthenticatorStatus,
    pub device_identifiers: Vec<String>,
    pub description: Option<String>,
}

/// Attestation metadata lookups, keyed by AAGUID or, for U2F authenticators,
/// by the attestation certificate (typically its subject key identifier).
pub trait MetadataService: Send + Sync {
    fn lookup(
        &self,
        aaguid: Option<&Aaguid>,
        attestation_certificate: Option<&[u8]>,
    ) -> anyhow::Result<Option<AuthenticatorMetadata>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revoked_status_is_not_acceptable() {
        assert!(AuthenticatorStatus::Certified.is_acceptable());
        assert!(AuthenticatorStatus::NotCertified.is_acceptable());
        assert!(!AuthenticatorStatus::Revoked.is_acceptable());
    }
}
