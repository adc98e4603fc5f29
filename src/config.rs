//! Relying party configuration
//!
//! An immutable value constructed once by the host. Validation happens at
//! relying-party construction time so ceremonies can assume a coherent
//! configuration.

use crate::challenge::{DEFAULT_CHALLENGE_LENGTH, MIN_CHALLENGE_LENGTH};
use crate::codec::cose::CoseAlgorithm;
use crate::error::{WebAuthnError, WebAuthnResult};
use crate::types::{AttestationConveyance, RelyingPartyIdentity, UserVerificationPolicy};

/// Relying party configuration.
#[derive(Debug, Clone)]
pub struct RpConfig {
    /// The RP identity; `rp.id` scopes every credential.
    pub rp: RelyingPartyIdentity,

    /// Full origins (scheme://host[:port]) permitted in client data.
    pub allowed_origins: Vec<String>,

    /// Accepted algorithms, in preference order, for `pubKeyCredParams`.
    pub algorithms: Vec<CoseAlgorithm>,

    /// User verification requirement applied to both ceremonies.
    pub user_verification: UserVerificationPolicy,

    /// Attestation conveyance requested at registration.
    pub attestation: AttestationConveyance,

    /// Timeout hint forwarded in option documents, in milliseconds.
    pub timeout_ms: Option<u32>,

    /// Challenge length in bytes (default 32, minimum 16).
    pub challenge_length: usize,

    /// Accept registrations whose attestation could not be tied to metadata
    /// trust anchors (default: true).
    pub allow_untrusted_attestation: bool,

    /// Fail assertions whose signature counter does not increase
    /// (default: true).
    pub validate_signature_counter: bool,

    /// Accept client origins on subdomains of a configured origin's host
    /// (default: false).
    pub allow_origin_subdomain: bool,

    /// Accept authenticator extension output that was never requested
    /// (default: false).
    pub allow_unrequested_extensions: bool,

    /// Tolerated divergence between the SafetyNet attestation timestamp and
    /// the RP clock, in milliseconds (default: 60 000).
    pub safetynet_clock_skew_ms: u64,
}

impl RpConfig {
    /// Creates a configuration with the defaults above and ES256/RS256/EdDSA
    /// as the accepted algorithms.
    pub fn new(rp: RelyingPartyIdentity, allowed_origins: Vec<String>) -> Self {
        Self {
            rp,
            allowed_origins,
            algorithms: vec![CoseAlgorithm::Es256, CoseAlgorithm::Rs256, CoseAlgorithm::Eddsa],
            user_verification: UserVerificationPolicy::Preferred,
            attestation: AttestationConveyance::None,
            timeout_ms: Some(60_000),
            challenge_length: DEFAULT_CHALLENGE_LENGTH,
            allow_untrusted_attestation: true,
            validate_signature_counter: true,
            allow_origin_subdomain: false,
            allow_unrequested_extensions: false,
            safetynet_clock_skew_ms: 60_000,
        }
    }

    /// Checks internal coherence: a usable RP id, at least one origin for
    /// which the RP id is a registrable suffix, verifiable algorithms, and a
    /// sufficient challenge length.
    pub fn validate(&self) -> WebAuthnResult<()> {
        if self.rp.id.is_empty() || self.rp.id.contains('/') || self.rp.id.contains(':') {
            return Err(WebAuthnError::Configuration(
                "rp.id must be a bare domain name".to_string(),
            ));
        }

        if self.allowed_origins.is_empty() {
            return Err(WebAuthnError::Configuration(
                "at least one allowed origin is required".to_string(),
            ));
        }
        for origin in &self.allowed_origins {
            let host = origin_host(origin).ok_or_else(|| {
                WebAuthnError::Configuration(format!("allowed origin is not an origin: {origin}"))
            })?;
            if !is_registrable_suffix(&self.rp.id, host) {
                return Err(WebAuthnError::Configuration(format!(
                    "rp.id {} is not a registrable suffix of origin host {host}",
                    self.rp.id
                )));
            }
        }

        if self.algorithms.is_empty() {
            return Err(WebAuthnError::Configuration(
                "at least one algorithm is required".to_string(),
            ));
        }
        if self.algorithms.contains(&CoseAlgorithm::Es512) {
            return Err(WebAuthnError::Configuration(
                "ES512 has no verification backend".to_string(),
            ));
        }

        if self.challenge_length < MIN_CHALLENGE_LENGTH {
            return Err(WebAuthnError::Configuration(format!(
                "challenge length {} below minimum {MIN_CHALLENGE_LENGTH}",
                self.challenge_length
            )));
        }

        Ok(())
    }

    /// Whether a client-reported origin is acceptable under this
    /// configuration.
    pub fn origin_allowed(&self, origin: &str) -> bool {
        if self.allowed_origins.iter().any(|allowed| allowed == origin) {
            return true;
        }
        if !self.allow_origin_subdomain {
            return false;
        }
        let Some((scheme, host, port)) = split_origin(origin) else {
            return false;
        };
        self.allowed_origins.iter().any(|allowed| {
            match split_origin(allowed) {
                Some((allowed_scheme, allowed_host, allowed_port)) => {
                    scheme == allowed_scheme
                        && port == allowed_port
                        && host.ends_with(&format!(".{allowed_host}"))
                }
                None => false,
            }
        })
    }
}

/// Splits `scheme://host[:port]` into its parts. No path is permitted.
fn split_origin(origin: &str) -> Option<(&str, &str, Option<&str>)> {
    let (scheme, rest) = origin.split_once("://")?;
    if scheme.is_empty() || rest.is_empty() || rest.contains('/') {
        return None;
    }
    match rest.split_once(':') {
        Some((host, port)) => {
            if host.is_empty() || port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
                None
            } else {
                Some((scheme, host, Some(port)))
            }
        }
        None => Some((scheme, rest, None)),
    }
}

fn origin_host(origin: &str) -> Option<&str> {
    split_origin(origin).map(|(_, host, _)| host)
}

/// `rp_id` equals `host` or is a parent domain of it.
fn is_registrable_suffix(rp_id: &str, host: &str) -> bool {
    host == rp_id || host.ends_with(&format!(".{rp_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RpConfig {
        RpConfig::new(
            RelyingPartyIdentity::new("example.com", "Example"),
            vec!["https://example.com".to_string()],
        )
    }

    #[test]
    fn test_default_config_validates() {
        config().validate().expect("valid");
    }

    #[test]
    fn test_validate_rejects_foreign_origin_host() {
        let mut config = config();
        config.allowed_origins = vec!["https://evil.example.net".to_string()];
        assert!(matches!(config.validate(), Err(WebAuthnError::Configuration(_))));
    }

    #[test]
    fn test_validate_accepts_subdomain_origin_host() {
        let mut config = config();
        config.allowed_origins = vec!["https://login.example.com:8443".to_string()];
        config.validate().expect("valid");
    }

    #[test]
    fn test_validate_rejects_es512() {
        let mut config = config();
        config.algorithms.push(CoseAlgorithm::Es512);
        assert!(matches!(config.validate(), Err(WebAuthnError::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_short_challenge() {
        let mut config = config();
        config.challenge_length = 8;
        assert!(matches!(config.validate(), Err(WebAuthnError::Configuration(_))));
    }

    #[test]
    fn test_origin_allowed_exact_match_only_by_default() {
        let config = config();
        assert!(config.origin_allowed("https://example.com"));
        assert!(!config.origin_allowed("https://login.example.com"));
        assert!(!config.origin_allowed("http://example.com"));
        assert!(!config.origin_allowed("https://example.com:8443"));
    }

    #[test]
    fn test_origin_allowed_subdomains_when_enabled() {
        let mut config = config();
        config.allow_origin_subdomain = true;
        assert!(config.origin_allowed("https://login.example.com"));
        assert!(!config.origin_allowed("https://login.example.com:8443"));
        assert!(!config.origin_allowed("https://notexample.com"));
        assert!(!config.origin_allowed("http://login.example.com"));
    }

    #[test]
    fn test_split_origin_shapes() {
        assert_eq!(split_origin("https://a.b"), Some(("https", "a.b", None)));
        assert_eq!(split_origin("https://a.b:8443"), Some(("https", "a.b", Some("8443"))));
        assert_eq!(split_origin("https://a.b/path"), None);
        assert_eq!(split_origin("a.b"), None);
        assert_eq!(split_origin("https://a.b:"), None);
    }
}
