//! Server-side W3C Web Authentication (WebAuthn) relying party
//!
//! This crate implements the two RP ceremonies: **registration** (binding a
//! new public-key credential to an account) and **authentication**
//! (verifying an assertion from a registered credential). It parses binary
//! authenticator messages, validates attestation statements, verifies
//! signatures, and enforces the origin-binding and anti-replay checks the
//! specification requires — all under the assumption that every input is
//! adversarial.
//!
//! The core is stateless: a [`RelyingParty`] is an immutable value, and each
//! `start`/`finish` call is a pure function of its arguments plus the
//! caller-supplied [`store::CredentialRepository`] and (optionally)
//! [`store::MetadataService`]. Challenge storage and replay protection are
//! the caller's job: persist the options a `start` call returns, hand them
//! to exactly one `finish` call, and discard them.
//!
//! ```no_run
//! use std::sync::Arc;
//! use webauthn_rp::{RelyingParty, RpConfig};
//! use webauthn_rp::types::{RelyingPartyIdentity, UserHandle, UserIdentity};
//! # fn repository() -> Arc<dyn webauthn_rp::store::CredentialRepository> { unimplemented!() }
//!
//! let config = RpConfig::new(
//!     RelyingPartyIdentity::new("example.com", "Example"),
//!     vec!["https://example.com".to_string()],
//! );
//! let rp = RelyingParty::new(config, repository())?;
//!
//! let user = UserIdentity {
//!     name: "alice".to_string(),
//!     display_name: "Alice".to_string(),
//!     id: UserHandle(b"alice-handle".to_vec()),
//!     icon: None,
//! };
//! let options = rp.start_registration(&user, None, None)?;
//! // ... send options to the client, receive the credential, then:
//! // let result = rp.finish_registration(&options, &credential)?;
//! # Ok::<(), webauthn_rp::WebAuthnError>(())
//! ```

pub mod attestation;
pub mod challenge;
pub mod clock;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod store;
pub mod types;

mod assertion;
mod registration;
mod rp;

pub use codec::cose::{CoseAlgorithm, CosePublicKey};
pub use config::RpConfig;
pub use error::{WebAuthnError, WebAuthnResult};
pub use rp::{AcceptAnyTokenBinding, RelyingParty, TokenBindingVerifier};
pub use types::{
    AssertionResult, AttestationType, RegistrationResult, Warning,
};
