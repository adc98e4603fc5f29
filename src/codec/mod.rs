//! Binary codec: strict CBOR, COSE keys, and authenticator data
//!
//! Everything an authenticator sends is parsed here before any cryptographic
//! check runs. Parsing is total: hostile lengths and truncated structures
//! surface as `MalformedData`, never as panics or overflowed offsets.

pub mod auth_data;
pub mod cbor;
pub mod cose;

pub use auth_data::{AttestedCredentialData, AuthenticatorData, AuthenticatorDataFlags};
pub use cose::{CoseAlgorithm, CosePublicKey, EcCurve};
