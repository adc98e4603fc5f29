//! Wire and domain types for the two WebAuthn ceremonies
//!
//! Binary fields cross the JSON boundary as base64url without padding, per
//! the WebAuthn canonical encoding.

pub mod credential;
pub mod entities;
pub mod options;
pub mod results;

pub use credential::{
    AssertionCredential, AuthenticatorAssertionResponse, AuthenticatorAttestationResponse,
    CollectedClientData, RegistrationCredential, TokenBinding, TokenBindingStatus,
};
pub use entities::{
    Aaguid, AttestationConveyance, AuthenticatorAttachment, AuthenticatorSelectionCriteria,
    AuthenticatorTransport, Challenge, CredentialId, PublicKeyCredentialDescriptor,
    PublicKeyCredentialType, RelyingPartyIdentity, ResidentKeyRequirement, UserHandle,
    UserIdentity, UserVerificationPolicy,
};
pub use options::{
    PublicKeyCredentialCreationOptions, PublicKeyCredentialParameters,
    PublicKeyCredentialRequestOptions,
};
pub use results::{
    AssertionResult, AttestationMetadata, AttestationType, RegistrationResult, Warning,
};

/// Serde adapter encoding byte fields as base64url without padding.
pub(crate) mod b64url {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn encode(data: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(data)
    }

    pub fn decode(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
        URL_SAFE_NO_PAD.decode(data)
    }

    pub fn serialize<S: Serializer>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        decode(&text).map_err(serde::de::Error::custom)
    }
}

/// Variant of [`b64url`] for optional byte fields.
pub(crate) mod b64url_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&super::b64url::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let text: Option<String> = Option::deserialize(deserializer)?;
        text.map(|t| super::b64url::decode(&t).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::b64url;

    #[test]
    fn test_b64url_encoding_has_no_padding() {
        assert_eq!(b64url::encode(&[0xfb, 0xef, 0xff]), "--__");
        assert_eq!(b64url::encode(&[0x01]), "AQ");
    }

    #[test]
    fn test_b64url_round_trip() {
        let bytes: Vec<u8> = (0u8..=63).collect();
        assert_eq!(b64url::decode(&b64url::encode(&bytes)).expect("decodes"), bytes);
    }

    #[test]
    fn test_b64url_rejects_standard_alphabet() {
        assert!(b64url::decode("+/+/").is_err());
    }
}
