//! Relying party façade
//!
//! An immutable value constructed once by the host, holding the
//! configuration and the injected capabilities (credential repository,
//! metadata service, clock, challenge generator, token-binding hook). The
//! four ceremony entry points live in the registration and assertion
//! modules; everything they share sits here.

use std::sync::Arc;

use crate::challenge::{ChallengeGenerator, OsChallengeGenerator};
use crate::clock::{Clock, SystemClock};
use crate::config::RpConfig;
use crate::crypto;
use crate::error::{WebAuthnError, WebAuthnResult};
use crate::store::{CredentialRepository, MetadataService};
use crate::types::{Challenge, CollectedClientData, TokenBinding, TokenBindingStatus};

/// Hook for verifying a client's token binding statement against the
/// connection. The protocol feature is deprecated; the default accepts any
/// binding.
pub trait TokenBindingVerifier: Send + Sync {
    fn verify(&self, binding: &TokenBinding) -> bool;
}

/// Default token-binding hook: accept any binding.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAnyTokenBinding;

impl TokenBindingVerifier for AcceptAnyTokenBinding {
    fn verify(&self, _binding: &TokenBinding) -> bool {
        true
    }
}

/// The WebAuthn relying party. Stateless across ceremonies; a finish call is
/// a pure function of its arguments, the repository, and the clock.
pub struct RelyingParty {
    pub(crate) config: RpConfig,
    pub(crate) repository: Arc<dyn CredentialRepository>,
    pub(crate) metadata: Option<Arc<dyn MetadataService>>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) challenges: Arc<dyn ChallengeGenerator>,
    pub(crate) token_binding: Arc<dyn TokenBindingVerifier>,
}

impl RelyingParty {
    /// Builds a relying party over a validated configuration, with the
    /// production clock and challenge generator.
    pub fn new(
        config: RpConfig,
        repository: Arc<dyn CredentialRepository>,
    ) -> WebAuthnResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            repository,
            metadata: None,
            clock: Arc::new(SystemClock),
            challenges: Arc::new(OsChallengeGenerator),
            token_binding: Arc::new(AcceptAnyTokenBinding),
        })
    }

    /// Attaches a metadata service for attestation trust decisions.
    #[must_use]
    pub fn with_metadata_service(mut self, metadata: Arc<dyn MetadataService>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_challenge_generator(mut self, challenges: Arc<dyn ChallengeGenerator>) -> Self {
        self.challenges = challenges;
        self
    }

    #[must_use]
    pub fn with_token_binding_verifier(
        mut self,
        token_binding: Arc<dyn TokenBindingVerifier>,
    ) -> Self {
        self.token_binding = token_binding;
        self
    }

    pub fn config(&self) -> &RpConfig {
        &self.config
    }

    /// Issues a fresh challenge of the configured length.
    pub(crate) fn new_challenge(&self) -> Challenge {
        Challenge(self.challenges.generate(self.config.challenge_length))
    }

    /// SHA-256 of the configured RP id, which authenticator data must echo.
    pub(crate) fn rp_id_hash(&self) -> [u8; 32] {
        crypto::sha256(self.config.rp.id.as_bytes())
    }

    /// Parses and checks collected client data shared by both ceremonies:
    /// ceremony type, challenge equality, origin membership, token binding.
    pub(crate) fn check_client_data(
        &self,
        client_data_json: &[u8],
        expected_type: &str,
        expected_challenge: &Challenge,
    ) -> WebAuthnResult<CollectedClientData> {
        let client_data: CollectedClientData = serde_json::from_slice(client_data_json)
            .map_err(|e| WebAuthnError::MalformedData(format!("client data JSON: {e}")))?;

        if client_data.type_ != expected_type {
            return Err(WebAuthnError::MalformedData(format!(
                "client data type is not {expected_type}"
            )));
        }

        let challenge = crate::types::b64url::decode(&client_data.challenge)
            .map_err(|_| WebAuthnError::MalformedData("client data challenge".to_string()))?;
        if challenge != expected_challenge.as_bytes() {
            return Err(WebAuthnError::ChallengeMismatch);
        }

        if !self.config.origin_allowed(&client_data.origin) {
            tracing::warn!(origin = %client_data.origin, "origin not in allowed set");
            return Err(WebAuthnError::OriginMismatch);
        }

        if let Some(binding) = &client_data.token_binding {
            if binding.status == TokenBindingStatus::Present
                && !self.token_binding.verify(binding)
            {
                return Err(WebAuthnError::TokenBindingRejected);
            }
        }

        Ok(client_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RelyingPartyIdentity;
    use anyhow::Result;

    struct EmptyRepository;

    impl CredentialRepository for EmptyRepository {
        fn credential_ids_for_username(
            &self,
            _username: &str,
        ) -> Result<Vec<crate::types::PublicKeyCredentialDescriptor>> {
            Ok(Vec::new())
        }
        fn user_handle_for_username(
            &self,
            _username: &str,
        ) -> Result<Option<crate::types::UserHandle>> {
            Ok(None)
        }
        fn username_for_user_handle(
            &self,
            _user_handle: &crate::types::UserHandle,
        ) -> Result<Option<String>> {
            Ok(None)
        }
        fn lookup(
            &self,
            _credential_id: &crate::types::CredentialId,
            _user_handle: &crate::types::UserHandle,
        ) -> Result<Option<crate::store::RegisteredCredential>> {
            Ok(None)
        }
        fn lookup_all(
            &self,
            _credential_id: &crate::types::CredentialId,
        ) -> Result<Vec<crate::store::RegisteredCredential>> {
            Ok(Vec::new())
        }
    }

    fn rp() -> RelyingParty {
        let config = RpConfig::new(
            RelyingPartyIdentity::new("example.com", "Example"),
            vec!["https://example.com".to_string()],
        );
        RelyingParty::new(config, Arc::new(EmptyRepository)).expect("valid config")
    }

    fn client_data_json(type_: &str, challenge: &Challenge, origin: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "type": type_,
            "challenge": crate::types::b64url::encode(challenge.as_bytes()),
            "origin": origin,
        }))
        .expect("serializes")
    }

    #[test]
    fn test_check_client_data_accepts_valid() {
        let rp = rp();
        let challenge = Challenge(vec![0x42; 32]);
        let json = client_data_json("webauthn.create", &challenge, "https://example.com");
        rp.check_client_data(&json, "webauthn.create", &challenge).expect("accepted");
    }

    #[test]
    fn test_check_client_data_rejects_wrong_type() {
        let rp = rp();
        let challenge = Challenge(vec![0x42; 32]);
        let json = client_data_json("webauthn.get", &challenge, "https://example.com");
        assert!(matches!(
            rp.check_client_data(&json, "webauthn.create", &challenge),
            Err(WebAuthnError::MalformedData(_))
        ));
    }

    #[test]
    fn test_check_client_data_rejects_challenge_mismatch() {
        let rp = rp();
        let issued = Challenge(vec![0x42; 32]);
        let other = Challenge(vec![0x43; 32]);
        let json = client_data_json("webauthn.create", &other, "https://example.com");
        assert!(matches!(
            rp.check_client_data(&json, "webauthn.create", &issued),
            Err(WebAuthnError::ChallengeMismatch)
        ));
    }

    #[test]
    fn test_check_client_data_rejects_foreign_origin() {
        let rp = rp();
        let challenge = Challenge(vec![0x42; 32]);
        let json = client_data_json("webauthn.create", &challenge, "https://evil.example.net");
        assert!(matches!(
            rp.check_client_data(&json, "webauthn.create", &challenge),
            Err(WebAuthnError::OriginMismatch)
        ));
    }

    #[test]
    fn test_check_client_data_token_binding_hook() {
        struct RejectAll;
        impl TokenBindingVerifier for RejectAll {
            fn verify(&self, _binding: &TokenBinding) -> bool {
                false
            }
        }

        let rp = rp().with_token_binding_verifier(Arc::new(RejectAll));
        let challenge = Challenge(vec![0x42; 32]);
        let json = serde_json::to_vec(&serde_json::json!({
            "type": "webauthn.create",
            "challenge": crate::types::b64url::encode(challenge.as_bytes()),
            "origin": "https://example.com",
            "tokenBinding": {"status": "present", "id": "AAEC"},
        }))
        .expect("serializes");
        assert!(matches!(
            rp.check_client_data(&json, "webauthn.create", &challenge),
            Err(WebAuthnError::TokenBindingRejected)
        ));
    }
}
