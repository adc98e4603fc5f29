//! Client response envelopes
//!
//! The `PublicKeyCredential` documents a client posts back after
//! `navigator.credentials.create()` / `.get()`, plus the collected client
//! data embedded in both.

use serde::{Deserialize, Serialize};

use super::entities::PublicKeyCredentialType;
use super::{b64url, b64url_opt};

/// Registration response: `{id, type, response: {clientDataJSON, attestationObject}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationCredential {
    /// base64url encoding of the credential ID.
    pub id: String,
    #[serde(rename = "rawId", default, skip_serializing_if = "Option::is_none")]
    #[serde(with = "b64url_opt")]
    pub raw_id: Option<Vec<u8>>,
    #[serde(rename = "type")]
    pub type_: PublicKeyCredentialType,
    pub response: AuthenticatorAttestationResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatorAttestationResponse {
    #[serde(rename = "clientDataJSON", with = "b64url")]
    pub client_data_json: Vec<u8>,
    #[serde(rename = "attestationObject", with = "b64url")]
    pub attestation_object: Vec<u8>,
}

/// Assertion response: `{id, type, response: {clientDataJSON, authenticatorData, signature, userHandle?}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionCredential {
    /// base64url encoding of the credential ID.
    pub id: String,
    #[serde(rename = "rawId", default, skip_serializing_if = "Option::is_none")]
    #[serde(with = "b64url_opt")]
    pub raw_id: Option<Vec<u8>>,
    #[serde(rename = "type")]
    pub type_: PublicKeyCredentialType,
    pub response: AuthenticatorAssertionResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatorAssertionResponse {
    #[serde(rename = "clientDataJSON", with = "b64url")]
    pub client_data_json: Vec<u8>,
    #[serde(rename = "authenticatorData", with = "b64url")]
    pub authenticator_data: Vec<u8>,
    #[serde(with = "b64url")]
    pub signature: Vec<u8>,
    #[serde(rename = "userHandle", default, skip_serializing_if = "Option::is_none")]
    #[serde(with = "b64url_opt")]
    pub user_handle: Option<Vec<u8>>,
}

/// The JSON the client collected and the authenticator signed over.
///
/// Unknown members are tolerated; the ceremony checks only the fields below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectedClientData {
    #[serde(rename = "type")]
    pub type_: String,
    /// base64url-encoded copy of the ceremony challenge.
    pub challenge: String,
    pub origin: String,
    #[serde(rename = "crossOrigin", default, skip_serializing_if = "Option::is_none")]
    pub cross_origin: Option<bool>,
    #[serde(rename = "tokenBinding", default, skip_serializing_if = "Option::is_none")]
    pub token_binding: Option<TokenBinding>,
}

/// Token binding statement from the client. The protocol feature is
/// deprecated; verification is a pluggable hook on the relying party.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBinding {
    pub status: TokenBindingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenBindingStatus {
    Present,
    Supported,
}
