//! Assertion ceremony
//!
//! `start_assertion` assembles request options around a fresh challenge;
//! `finish_assertion` verifies the returned assertion against the stored
//! credential: allow-list membership, user handle resolution, RP binding,
//! flags, client data, the signature over `authData || SHA256(clientDataJSON)`,
//! and signature-counter progress.

use crate::codec::auth_data::AuthenticatorData;
use crate::codec::cose::CosePublicKey;
use crate::crypto;
use crate::error::{WebAuthnError, WebAuthnResult};
use crate::rp::RelyingParty;
use crate::store::RegisteredCredential;
use crate::types::{
    b64url, AssertionCredential, AssertionResult, CredentialId,
    PublicKeyCredentialRequestOptions, UserHandle, UserVerificationPolicy, Warning,
};

impl RelyingParty {
    /// Builds request options. With a username, the allow list is populated
    /// from the repository; without one, the list is left empty for a
    /// discoverable-credential (usernameless) ceremony.
    pub fn start_assertion(
        &self,
        username: Option<&str>,
        extensions: Option<serde_json::Value>,
    ) -> WebAuthnResult<PublicKeyCredentialRequestOptions> {
        let allow_credentials = match username {
            Some(username) => {
                let descriptors = self
                    .repository
                    .credential_ids_for_username(username)
                    .map_err(WebAuthnError::InternalStoreError)?;
                if descriptors.is_empty() {
                    return Err(WebAuthnError::CredentialNotRegistered);
                }
                Some(descriptors)
            }
            None => None,
        };

        tracing::debug!(
            username = username.unwrap_or("<usernameless>"),
            allowed = allow_credentials.as_ref().map_or(0, Vec::len),
            "issuing assertion options"
        );

        Ok(PublicKeyCredentialRequestOptions {
            challenge: self.new_challenge(),
            timeout: self.config.timeout_ms,
            rp_id: self.config.rp.id.clone(),
            allow_credentials,
            user_verification: Some(self.config.user_verification),
            extensions,
        })
    }

    /// Verifies an assertion response against the options that started the
    /// ceremony. On success the caller stores `signature_count` for the
    /// credential.
    pub fn finish_assertion(
        &self,
        options: &PublicKeyCredentialRequestOptions,
        credential: &AssertionCredential,
    ) -> WebAuthnResult<AssertionResult> {
        let mut warnings = Vec::new();

        let credential_id = CredentialId(
            b64url::decode(&credential.id)
                .map_err(|_| WebAuthnError::MalformedData("credential id".to_string()))?,
        );

        if let Some(allowed) = &options.allow_credentials {
            if !allowed.is_empty()
                && !allowed.iter().any(|descriptor| descriptor.id == credential_id)
            {
                return Err(WebAuthnError::DisallowedCredential);
            }
        }

        tracing::debug!(step = "lookup", credential_id = %credential_id, "resolving credential");
        let stored = self.resolve_credential(
            &credential_id,
            credential.response.user_handle.as_deref(),
        )?;
        let username = self
            .repository
            .username_for_user_handle(&stored.user_handle)
            .map_err(WebAuthnError::InternalStoreError)?;

        let public_key = CosePublicKey::decode(&stored.public_key_cose)?;

        tracing::debug!(step = "auth_data", "parsing authenticator data");
        let raw_auth_data = &credential.response.authenticator_data;
        let auth_data = AuthenticatorData::parse(raw_auth_data)?;

        if auth_data.rp_id_hash != self.rp_id_hash() {
            return Err(WebAuthnError::RpIdHashMismatch);
        }

        if !auth_data.flags.user_present {
            return Err(WebAuthnError::UserPresenceMissing);
        }
        let uv_required = options
            .user_verification
            .unwrap_or(self.config.user_verification)
            == UserVerificationPolicy::Required;
        if uv_required && !auth_data.flags.user_verified {
            return Err(WebAuthnError::UserVerificationRequired);
        }

        if auth_data.extensions.is_some()
            && options.extensions.is_none()
            && !self.config.allow_unrequested_extensions
        {
            return Err(WebAuthnError::UnrequestedExtension);
        }

        tracing::debug!(step = "client_data", "checking collected client data");
        self.check_client_data(
            &credential.response.client_data_json,
            "webauthn.get",
            &options.challenge,
        )?;
        let client_data_hash = crypto::sha256(&credential.response.client_data_json);

        tracing::debug!(step = "signature", "verifying assertion signature");
        let mut message = Vec::with_capacity(raw_auth_data.len() + client_data_hash.len());
        message.extend_from_slice(raw_auth_data);
        message.extend_from_slice(&client_data_hash);
        crypto::verify_signature(
            &public_key,
            &message,
            &credential.response.signature,
            &mut warnings,
        )?;

        tracing::debug!(
            step = "counter",
            received = auth_data.sign_count,
            stored = stored.signature_count,
            "checking signature counter"
        );
        let received = auth_data.sign_count;
        let signature_counter_valid =
            received > stored.signature_count || (received == 0 && stored.signature_count == 0);
        if !signature_counter_valid {
            if self.config.validate_signature_counter {
                return Err(WebAuthnError::CounterRollback {
                    received,
                    stored: stored.signature_count,
                });
            }
            warnings.push(Warning::CounterRollback);
        }
        if received == 0 && stored.signature_count == 0 {
            warnings.push(Warning::CounterZero);
        }

        tracing::info!(
            credential_id = %credential_id,
            username = username.as_deref().unwrap_or("<unknown>"),
            counter = received,
            counter_valid = signature_counter_valid,
            "assertion verified"
        );

        Ok(AssertionResult {
            credential_id,
            user_handle: stored.user_handle,
            username,
            signature_count: received,
            signature_counter_valid,
            success: true,
            warnings,
        })
    }

    /// Resolves the stored credential, honoring the response's user handle
    /// when present: a provided handle must equal the stored one.
    fn resolve_credential(
        &self,
        credential_id: &CredentialId,
        response_user_handle: Option<&[u8]>,
    ) -> WebAuthnResult<RegisteredCredential> {
        match response_user_handle {
            Some(handle) => {
                let handle = UserHandle(handle.to_vec());
                match self
                    .repository
                    .lookup(credential_id, &handle)
                    .map_err(WebAuthnError::InternalStoreError)?
                {
                    Some(credential) => Ok(credential),
                    None => {
                        // Distinguish a handle mismatch from an unknown id.
                        let stored = self
                            .repository
                            .lookup_all(credential_id)
                            .map_err(WebAuthnError::InternalStoreError)?;
                        if stored.is_empty() {
                            Err(WebAuthnError::CredentialNotRegistered)
                        } else {
                            Err(WebAuthnError::UserHandleMismatch)
                        }
                    }
                }
            }
            None => {
                // Without a response handle the stored one is used; a
                // credential id shared across accounts is ambiguous.
                let mut stored = self
                    .repository
                    .lookup_all(credential_id)
                    .map_err(WebAuthnError::InternalStoreError)?;
                match stored.len() {
                    0 => Err(WebAuthnError::CredentialNotRegistered),
                    1 => Ok(stored.remove(0)),
                    _ => Err(WebAuthnError::UserHandleMismatch),
                }
            }
        }
    }
}
