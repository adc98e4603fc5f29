//! Ceremony option documents
//!
//! These are the JSON artifacts the RP hands to its client for
//! `navigator.credentials.create()` / `.get()`. The caller stores them for
//! the lifetime of the ceremony and passes them back to the matching finish
//! call; they carry the challenge that binds the two halves together.

use serde::{Deserialize, Serialize};

use crate::codec::cose::CoseAlgorithm;

use super::entities::{
    AttestationConveyance, AuthenticatorSelectionCriteria, Challenge,
    PublicKeyCredentialDescriptor, PublicKeyCredentialType, RelyingPartyIdentity, UserIdentity,
    UserVerificationPolicy,
};

/// One entry of `pubKeyCredParams`: an algorithm the RP will accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyCredentialParameters {
    #[serde(rename = "type")]
    pub type_: PublicKeyCredentialType,
    pub alg: CoseAlgorithm,
}

impl PublicKeyCredentialParameters {
    pub fn new(alg: CoseAlgorithm) -> Self {
        Self { type_: PublicKeyCredentialType::PublicKey, alg }
    }
}

/// Options for a registration ceremony.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyCredentialCreationOptions {
    pub rp: RelyingPartyIdentity,
    pub user: UserIdentity,
    pub challenge: Challenge,
    #[serde(rename = "pubKeyCredParams")]
    pub pub_key_cred_params: Vec<PublicKeyCredentialParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(rename = "excludeCredentials", skip_serializing_if = "Option::is_none")]
    pub exclude_credentials: Option<Vec<PublicKeyCredentialDescriptor>>,
    #[serde(rename = "authenticatorSelection", skip_serializing_if = "Option::is_none")]
    pub authenticator_selection: Option<AuthenticatorSelectionCriteria>,
    pub attestation: AttestationConveyance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

impl PublicKeyCredentialCreationOptions {
    /// User verification requirement in effect for this ceremony.
    pub fn user_verification(&self) -> Option<UserVerificationPolicy> {
        self.authenticator_selection.as_ref().and_then(|s| s.user_verification)
    }
}

/// Options for an authentication ceremony.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyCredentialRequestOptions {
    pub challenge: Challenge,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(rename = "rpId")]
    pub rp_id: String,
    /// Empty for usernameless (discoverable-credential) ceremonies.
    #[serde(rename = "allowCredentials", skip_serializing_if = "Option::is_none")]
    pub allow_credentials: Option<Vec<PublicKeyCredentialDescriptor>>,
    #[serde(rename = "userVerification", skip_serializing_if = "Option::is_none")]
    pub user_verification: Option<UserVerificationPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}
