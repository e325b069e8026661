//! Single-use approval tokens: a random secret handed to the approver
//! out of band (e.g. a signed link), hashed before storage so the
//! control plane never persists the bearer secret itself.
//!
//! The hashing/constant-time-compare stack (`sha2`, `subtle`, `hex`) is
//! not present in the teacher; it is pulled in from the pack's
//! approval-relay-style dependency set for this concern specifically.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// The bearer secret, shown to the approver exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalToken(pub String);

/// The hex-encoded SHA-256 digest of a token, safe to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHash(pub String);

impl ApprovalToken {
    /// Generate a new 32-byte random token, hex-encoded.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn hash(&self) -> TokenHash {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        TokenHash(hex::encode(hasher.finalize()))
    }

    /// Constant-time comparison against a stored hash, so timing does
    /// not leak how much of the token matched.
    pub fn matches(&self, stored: &TokenHash) -> bool {
        let computed = self.hash();
        computed.0.as_bytes().ct_eq(stored.0.as_bytes()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_unique() {
        let a = ApprovalToken::generate();
        let b = ApprovalToken::generate();
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn matching_token_verifies_against_its_hash() {
        let token = ApprovalToken::generate();
        let hash = token.hash();
        assert!(token.matches(&hash));
    }

    #[test]
    fn wrong_token_does_not_verify() {
        let token = ApprovalToken::generate();
        let other = ApprovalToken::generate();
        assert!(!other.matches(&token.hash()));
    }
}
