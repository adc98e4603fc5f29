//! Core protocol entities shared by both ceremonies

use std::fmt;

use serde::{Deserialize, Serialize};

use super::b64url;

/// Identifies the relying party.
///
/// `id` scopes every credential this party issues and must be a registrable
/// suffix of each allowed origin's host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelyingPartyIdentity {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl RelyingPartyIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), icon: None }
    }
}

/// Identifies a user account within the relying party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    /// The user handle: opaque bytes chosen by the RP, 1 to 64 bytes.
    pub id: UserHandle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// RP-chosen opaque account identifier, returned by the authenticator during
/// resident-key assertions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserHandle(#[serde(with = "b64url")] pub Vec<u8>);

impl UserHandle {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Authenticator-chosen identifier for a stored key pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialId(#[serde(with = "b64url")] pub Vec<u8>);

impl CredentialId {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&b64url::encode(&self.0))
    }
}

/// Per-ceremony random value binding a finish call to its start call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge(#[serde(with = "b64url")] pub Vec<u8>);

impl Challenge {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// 128-bit Authenticator Attestation GUID identifying the authenticator model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Aaguid(pub [u8; 16]);

impl Aaguid {
    pub const ZERO: Aaguid = Aaguid([0u8; 16]);

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 16]
    }
}

impl fmt::Display for Aaguid {
    /// Formats as the conventional hyphenated GUID form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7], b[8], b[9], b[10], b[11], b[12],
            b[13], b[14], b[15]
        )
    }
}

/// The single credential type the protocol defines today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublicKeyCredentialType {
    #[serde(rename = "public-key")]
    PublicKey,
}

/// Transport hints attached to a credential descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticatorTransport {
    Usb,
    Nfc,
    Ble,
    Internal,
}

/// Identifies a credential along with the transports it can be reached on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyCredentialDescriptor {
    #[serde(rename = "type")]
    pub type_: PublicKeyCredentialType,
    pub id: CredentialId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<AuthenticatorTransport>>,
}

impl PublicKeyCredentialDescriptor {
    pub fn new(id: CredentialId) -> Self {
        Self { type_: PublicKeyCredentialType::PublicKey, id, transports: None }
    }
}

/// How strongly the RP insists on user verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationPolicy {
    Required,
    Preferred,
    Discouraged,
}

/// Resident-key requirement communicated to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResidentKeyRequirement {
    Discouraged,
    Preferred,
    Required,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticatorAttachment {
    Platform,
    CrossPlatform,
}

/// Authenticator filter criteria for registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatorSelectionCriteria {
    #[serde(rename = "residentKey", skip_serializing_if = "Option::is_none")]
    pub resident_key: Option<ResidentKeyRequirement>,
    #[serde(rename = "userVerification", skip_serializing_if = "Option::is_none")]
    pub user_verification: Option<UserVerificationPolicy>,
    #[serde(rename = "authenticatorAttachment", skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
}

/// Attestation conveyance preference sent with creation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationConveyance {
    None,
    Indirect,
    Direct,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_serializes_with_wire_names() {
        let descriptor = PublicKeyCredentialDescriptor {
            type_: PublicKeyCredentialType::PublicKey,
            id: CredentialId(vec![1, 2, 3, 4]),
            transports: Some(vec![AuthenticatorTransport::Usb, AuthenticatorTransport::Nfc]),
        };
        let json = serde_json::to_value(&descriptor).expect("serializes");
        assert_eq!(json["type"], "public-key");
        assert_eq!(json["id"], "AQIDBA");
        assert_eq!(json["transports"][0], "usb");
    }

    #[test]
    fn test_aaguid_display_is_guid_shaped() {
        let aaguid = Aaguid([
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ]);
        assert_eq!(aaguid.to_string(), "00112233-4455-6677-8899-aabbccddeeff");
        assert!(!aaguid.is_zero());
        assert!(Aaguid::ZERO.is_zero());
    }

    #[test]
    fn test_user_verification_wire_encoding() {
        let json = serde_json::to_value(UserVerificationPolicy::Required).expect("serializes");
        assert_eq!(json, "required");
        let json = serde_json::to_value(AuthenticatorAttachment::CrossPlatform).expect("serializes");
        assert_eq!(json, "cross-platform");
    }
}
