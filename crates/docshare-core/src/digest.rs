//! Document digests for convergence checks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain separator mixed into every document digest.
const DIGEST_DOMAIN: &[u8] = b"docshare-document-v0:";

/// A 32-byte Blake3 digest of a document's text.
///
/// Two parties holding equal digests hold identical documents.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentDigest(pub [u8; 32]);

impl DocumentDigest {
    /// Digest the given document text.
    pub fn of(text: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(DIGEST_DOMAIN);
        hasher.update(text.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for DocumentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentDigest({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for DocumentDigest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_deterministic() {
        assert_eq!(DocumentDigest::of("hello"), DocumentDigest::of("hello"));
    }

    #[test]
    fn test_digest_differs_on_content() {
        assert_ne!(DocumentDigest::of("hello"), DocumentDigest::of("hellO"));
        assert_ne!(DocumentDigest::of(""), DocumentDigest::of(" "));
    }

    #[test]
    fn test_digest_is_domain_separated() {
        let plain = blake3::hash(b"hello");
        assert_ne!(DocumentDigest::of("hello").as_bytes(), plain.as_bytes());
    }
}
