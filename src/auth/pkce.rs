//! PKCE (Proof Key for Code Exchange) verifier and challenge generation
//!
//! Implements the `S256` method of RFC 7636. The verifier stays in memory for
//! one authorization round-trip; only the challenge leaves the process before
//! the code exchange.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of random bytes behind a verifier (43 base64url characters)
const VERIFIER_BYTES: usize = 32;

/// The only challenge method this crate sends
pub const CHALLENGE_METHOD: &str = "S256";

/// Verifier/challenge pair for one authorization attempt
#[derive(Clone, PartialEq, Eq)]
pub struct PkceParameters {
    /// Random secret, sent only with the code exchange
    pub verifier: String,
    /// `BASE64URL(SHA256(verifier))`, sent with the authorization request
    pub challenge: String,
}

impl PkceParameters {
    /// Generate a fresh verifier and derive its challenge
    #[must_use]
    pub fn generate() -> Self {
        let verifier = PkceChallenge::generate_verifier();
        let challenge = PkceChallenge::derive_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

// The verifier is a secret; keep it out of logs.
impl std::fmt::Debug for PkceParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceParameters")
            .field("verifier", &"<redacted>")
            .field("challenge", &self.challenge)
            .finish()
    }
}

/// Stateless PKCE operations
#[derive(Debug, Clone, Copy, Default)]
pub struct PkceChallenge;

impl PkceChallenge {
    /// Draw 32 bytes from the thread-local CSPRNG and base64url-encode them
    #[must_use]
    pub fn generate_verifier() -> String {
        let mut bytes = [0u8; VERIFIER_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Compute `BASE64URL(SHA256(verifier))` without padding
    #[must_use]
    pub fn derive_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn is_base64url(s: &str) -> bool {
        s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    #[test]
    fn test_verifier_length_and_alphabet() {
        let verifier = PkceChallenge::generate_verifier();
        // 32 bytes base64url encoded without padding
        assert_eq!(verifier.len(), 43);
        assert!(is_base64url(&verifier));
        assert!(!verifier.contains('='));
    }

    #[test]
    fn test_verifiers_are_distinct() {
        let verifiers: HashSet<String> = (0..256).map(|_| PkceChallenge::generate_verifier()).collect();
        assert_eq!(verifiers.len(), 256);
    }

    #[test]
    fn test_challenge_known_vector() {
        assert_eq!(
            PkceChallenge::derive_challenge("test-verifier-value"),
            "R-yFp3ykg184xTSr9BXHiHtbqWZXIG_H4B3K5EWSDzM"
        );
    }

    #[test]
    fn test_challenge_is_deterministic() {
        let verifier = PkceChallenge::generate_verifier();
        let first = PkceChallenge::derive_challenge(&verifier);
        let second = PkceChallenge::derive_challenge(&verifier);
        assert_eq!(first, second);
        assert_eq!(first.len(), 43);
        assert!(is_base64url(&first));
    }

    #[test]
    fn test_parameters_pair_up() {
        let params = PkceParameters::generate();
        assert_eq!(
            params.challenge,
            PkceChallenge::derive_challenge(&params.verifier)
        );
    }

    #[test]
    fn test_debug_redacts_verifier() {
        let params = PkceParameters::generate();
        let rendered = format!("{params:?}");
        assert!(!rendered.contains(&params.verifier));
        assert!(rendered.contains("<redacted>"));
    }
}
