//! Registration ceremony
//!
//! `start_registration` assembles creation options around a fresh challenge;
//! `finish_registration` runs the ordered verification pipeline over the
//! client's attestation response and, on success, returns everything the
//! caller's store needs to persist the new credential.

use crate::attestation::{
    self, AttestationContext, AttestationFormat, VerifiedAttestation,
};
use crate::codec::auth_data::AuthenticatorData;
use crate::codec::cbor;
use crate::crypto;
use crate::error::{WebAuthnError, WebAuthnResult};
use crate::rp::RelyingParty;
use crate::store::AuthenticatorMetadata;
use crate::types::{
    b64url, Aaguid, AttestationConveyance, AttestationMetadata, AttestationType,
    AuthenticatorSelectionCriteria, CredentialId, PublicKeyCredentialCreationOptions,
    PublicKeyCredentialDescriptor, PublicKeyCredentialParameters, RegistrationCredential,
    RegistrationResult, UserIdentity, UserVerificationPolicy, Warning,
};

impl RelyingParty {
    /// Builds creation options for registering a new credential to `user`.
    ///
    /// When `exclude_credentials` is `None`, the user's registered
    /// credentials are fetched from the repository so the client refuses to
    /// re-register an authenticator it already holds.
    pub fn start_registration(
        &self,
        user: &UserIdentity,
        exclude_credentials: Option<Vec<PublicKeyCredentialDescriptor>>,
        extensions: Option<serde_json::Value>,
    ) -> WebAuthnResult<PublicKeyCredentialCreationOptions> {
        if user.id.as_bytes().is_empty() || user.id.as_bytes().len() > 64 {
            return Err(WebAuthnError::Configuration(
                "user handle must be 1 to 64 bytes".to_string(),
            ));
        }

        let exclude_credentials = match exclude_credentials {
            Some(descriptors) => Some(descriptors),
            None => {
                let descriptors = self
                    .repository
                    .credential_ids_for_username(&user.name)
                    .map_err(WebAuthnError::InternalStoreError)?;
                if descriptors.is_empty() { None } else { Some(descriptors) }
            }
        };

        let challenge = self.new_challenge();
        tracing::debug!(
            user = %user.name,
            excluded = exclude_credentials.as_ref().map_or(0, Vec::len),
            "issuing registration options"
        );

        Ok(PublicKeyCredentialCreationOptions {
            rp: self.config.rp.clone(),
            user: user.clone(),
            challenge,
            pub_key_cred_params: self
                .config
                .algorithms
                .iter()
                .map(|&alg| PublicKeyCredentialParameters::new(alg))
                .collect(),
            timeout: self.config.timeout_ms,
            exclude_credentials,
            authenticator_selection: Some(AuthenticatorSelectionCriteria {
                user_verification: Some(self.config.user_verification),
                ..AuthenticatorSelectionCriteria::default()
            }),
            attestation: self.config.attestation,
            extensions,
        })
    }

    /// Verifies a registration response against the options that started the
    /// ceremony.
    pub fn finish_registration(
        &self,
        options: &PublicKeyCredentialCreationOptions,
        credential: &RegistrationCredential,
    ) -> WebAuthnResult<RegistrationResult> {
        let mut warnings = Vec::new();

        // The credential id as the client reported it.
        let credential_id = CredentialId(
            b64url::decode(&credential.id)
                .map_err(|_| WebAuthnError::MalformedData("credential id".to_string()))?,
        );
        if let Some(raw_id) = &credential.raw_id {
            if raw_id != &credential_id.0 {
                return Err(WebAuthnError::MalformedData(
                    "rawId does not match id".to_string(),
                ));
            }
        }

        tracing::debug!(step = "client_data", "checking collected client data");
        self.check_client_data(
            &credential.response.client_data_json,
            "webauthn.create",
            &options.challenge,
        )?;
        let client_data_hash = crypto::sha256(&credential.response.client_data_json);

        tracing::debug!(step = "attestation_object", "decoding attestation object");
        let attestation_object = cbor::decode(&credential.response.attestation_object)?;
        let attestation_map = attestation_object
            .as_map()
            .ok_or_else(|| {
                WebAuthnError::MalformedData("attestation object is not a map".to_string())
            })?
            .as_slice();
        let format_id = cbor::map_text(attestation_map, "fmt")
            .ok_or_else(|| WebAuthnError::MalformedData("attestation fmt".to_string()))?;
        let raw_auth_data = cbor::map_bytes(attestation_map, "authData")
            .ok_or_else(|| WebAuthnError::MalformedData("attestation authData".to_string()))?;
        let att_stmt = cbor::map_map(attestation_map, "attStmt")
            .ok_or_else(|| WebAuthnError::MalformedData("attestation attStmt".to_string()))?;

        let auth_data = AuthenticatorData::parse(raw_auth_data)?;

        tracing::debug!(step = "rp_id_hash", "checking RP ID hash");
        if auth_data.rp_id_hash != self.rp_id_hash() {
            return Err(WebAuthnError::RpIdHashMismatch);
        }

        tracing::debug!(step = "flags", flags = auth_data.flags.raw, "checking flags");
        if !auth_data.flags.user_present {
            return Err(WebAuthnError::UserPresenceMissing);
        }
        let uv_required = options
            .user_verification()
            .unwrap_or(self.config.user_verification)
            == UserVerificationPolicy::Required;
        if uv_required && !auth_data.flags.user_verified {
            return Err(WebAuthnError::UserVerificationRequired);
        }

        if !auth_data.flags.attested_credential_data {
            return Err(WebAuthnError::MalformedData(
                "AT flag not set on registration".to_string(),
            ));
        }
        let attested = auth_data.attested_credential_data.as_ref().ok_or_else(|| {
            WebAuthnError::MalformedData("attested credential data missing".to_string())
        })?;

        if attested.credential_id != credential_id {
            return Err(WebAuthnError::MalformedData(
                "credential id does not match attested credential data".to_string(),
            ));
        }

        tracing::debug!(step = "algorithm", alg = attested.public_key.alg().id(), "checking algorithm");
        let algorithm = attested.public_key.alg();
        if !options.pub_key_cred_params.iter().any(|param| param.alg == algorithm) {
            return Err(WebAuthnError::UnsupportedAlgorithm(algorithm.id()));
        }

        if auth_data.extensions.is_some()
            && options.extensions.is_none()
            && !self.config.allow_unrequested_extensions
        {
            return Err(WebAuthnError::UnrequestedExtension);
        }

        tracing::debug!(step = "attestation", format = format_id, "verifying attestation statement");
        let format = AttestationFormat::from_identifier(format_id);
        if options.attestation == AttestationConveyance::None
            && format != AttestationFormat::None
        {
            warnings.push(Warning::UnrequestedAttestation);
        }
        let ctx = AttestationContext {
            auth_data: &auth_data,
            raw_auth_data,
            client_data_hash: &client_data_hash,
            now: self.clock.now(),
            safetynet_clock_skew_ms: self.config.safetynet_clock_skew_ms,
        };
        let verified = attestation::verify_statement(&format, att_stmt, &ctx, &mut warnings)?;

        tracing::debug!(step = "trust", "determining attestation trust");
        let (attestation_trusted, attestation_metadata) =
            self.determine_trust(&format, &verified, attested.aaguid, &mut warnings)?;
        if !attestation_trusted && !self.config.allow_untrusted_attestation {
            return Err(WebAuthnError::UntrustedAttestation);
        }

        if let Some(excluded) = &options.exclude_credentials {
            if excluded.iter().any(|descriptor| descriptor.id == credential_id) {
                return Err(WebAuthnError::DisallowedCredential);
            }
        }

        if auth_data.sign_count == 0 {
            warnings.push(Warning::CounterZero);
        }

        tracing::info!(
            credential_id = %credential_id,
            format = format.identifier(),
            attestation_type = ?verified.attestation_type,
            trusted = attestation_trusted,
            "registration verified"
        );

        Ok(RegistrationResult {
            credential_id,
            user_handle: options.user.id.clone(),
            public_key_cose: attested.public_key_bytes.clone(),
            algorithm,
            aaguid: attested.aaguid,
            attestation_type: verified.attestation_type,
            attestation_trusted,
            attestation_metadata,
            warnings,
            signature_counter: auth_data.sign_count,
        })
    }

    /// Combines the verifier output with a metadata lookup: trusted iff the
    /// trust path validates against a metadata root and the authenticator
    /// status is acceptable.
    fn determine_trust(
        &self,
        format: &AttestationFormat,
        verified: &VerifiedAttestation,
        aaguid: Aaguid,
        warnings: &mut Vec<Warning>,
    ) -> WebAuthnResult<(bool, Option<AttestationMetadata>)> {
        let Some(metadata_service) = &self.metadata else {
            warnings.push(Warning::NoMetadataFound);
            return Ok((false, None));
        };

        // U2F authenticators carry no AAGUID; key the lookup by the
        // attestation certificate instead.
        let entry = if *format == AttestationFormat::FidoU2f {
            metadata_service
                .lookup(None, verified.trust_path.first().map(Vec::as_slice))
                .map_err(WebAuthnError::InternalStoreError)?
        } else {
            metadata_service
                .lookup(Some(&aaguid), None)
                .map_err(WebAuthnError::InternalStoreError)?
        };

        let Some(entry) = entry else {
            warnings.push(Warning::NoMetadataFound);
            return Ok((false, None));
        };

        if !entry.status.is_acceptable() {
            warnings.push(Warning::AuthenticatorRevoked);
        }

        let chain_valid = !verified.trust_path.is_empty()
            && crypto::chain::verify_chain(
                &verified.trust_path,
                &entry.trusted_roots,
                self.clock.now(),
            )
            .is_ok();

        let trusted = chain_valid
            && entry.status.is_acceptable()
            && verified.attestation_type != AttestationType::None
            && verified.attestation_type != AttestationType::SelfAttestation;

        Ok((trusted, Some(metadata_entry_summary(&entry, aaguid))))
    }
}

fn metadata_entry_summary(
    entry: &AuthenticatorMetadata,
    aaguid: Aaguid,
) -> AttestationMetadata {
    AttestationMetadata {
        aaguid: if aaguid.is_zero() { None } else { Some(aaguid.to_string()) },
        authenticator_status: Some(format!("{:?}", entry.status)),
        device_identifiers: entry.device_identifiers.clone(),
        description: entry.description.clone(),
    }
}
