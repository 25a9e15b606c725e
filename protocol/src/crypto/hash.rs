//! # Hashing Utilities
//!
//! SHA-256 is the only digest in the derivation path. It is what turns an
//! iris code (or, in fallback mode, a pile of image bytes) into the 32
//! bytes that become a private key, so it is pinned here and nowhere else.
//!
//! Swapping the digest is a breaking change to every derived key. See
//! [`crate::config::DERIVATION_VERSION`].

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use anarchy_auth::crypto::sha256;
///
/// let hash = sha256(b"anarchy");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    sha256_multi(&[data])
}

/// Hash multiple byte slices as if they had been concatenated.
///
/// Parts are fed into the hasher in order without an intermediate buffer,
/// so `sha256_multi(&[a, b]) == sha256(a || b)`. No separators, no length
/// prefixes: the caller owns the framing.
pub fn sha256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Hex-encoded SHA-256, for reporting message digests back to clients.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256 of the empty string.
        let expected = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        assert_eq!(sha256_hex(b""), expected);
    }

    #[test]
    fn test_sha256_abc_vector() {
        let expected = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        assert_eq!(sha256_hex(b"abc"), expected);
    }

    #[test]
    fn sha256_deterministic() {
        assert_eq!(sha256(b"iris"), sha256(b"iris"));
    }

    #[test]
    fn test_multi_equals_concatenation() {
        let multi = sha256_multi(&[&b"left-code"[..], &b"right-code"[..]]);
        let single = sha256(b"left-coderight-code");
        assert_eq!(multi, single);
    }

    #[test]
    fn test_multi_order_matters() {
        let a = sha256_multi(&[&b"left"[..], &b"right"[..]]);
        let b = sha256_multi(&[&b"right"[..], &b"left"[..]]);
        assert_ne!(a, b);
    }
}
