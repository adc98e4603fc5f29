//! Challenge generation
//!
//! Challenges bind a `finish` call to the `start` call that issued it. They
//! are generated from the OS entropy source, are single-use by contract (the
//! caller discards the stored options on the first finish attempt), and must
//! be at least [`MIN_CHALLENGE_LENGTH`] bytes.

use rand::rngs::OsRng;
use rand::RngCore;

/// Smallest challenge the protocol permits.
pub const MIN_CHALLENGE_LENGTH: usize = 16;

/// Default challenge length issued by [`OsChallengeGenerator`].
pub const DEFAULT_CHALLENGE_LENGTH: usize = 32;

/// Source of per-ceremony random challenges.
///
/// Injected into the relying party at construction; implementations must be
/// thread-safe.
pub trait ChallengeGenerator: Send + Sync {
    /// Generates `len` cryptographically random bytes.
    fn generate(&self, len: usize) -> Vec<u8>;
}

/// Production generator backed by the OS CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsChallengeGenerator;

impl ChallengeGenerator for OsChallengeGenerator {
    fn generate(&self, len: usize) -> Vec<u8> {
        let mut challenge = vec![0u8; len];
        OsRng.fill_bytes(&mut challenge);
        challenge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_produces_requested_length() {
        let generator = OsChallengeGenerator;
        assert_eq!(generator.generate(16).len(), 16);
        assert_eq!(generator.generate(32).len(), 32);
    }

    #[test]
    fn test_generate_produces_distinct_challenges() {
        let generator = OsChallengeGenerator;
        let a = generator.generate(DEFAULT_CHALLENGE_LENGTH);
        let b = generator.generate(DEFAULT_CHALLENGE_LENGTH);
        assert_ne!(a, b);
    }
}
