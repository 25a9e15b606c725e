//! # Digital Signatures
//!
//! Ed25519 signing and verification over arbitrary message bytes.
//!
//! Verification has exactly two outcomes for well-formed input: valid or
//! not. Wrong key, tampered message, corrupted signature, a public key that
//! is not a curve point: each is just `false`. The only error is
//! [`SignatureError::Malformed`], raised when the byte lengths are wrong
//! and there is nothing to verify in the first place.

use thiserror::Error;

use super::keys::{KeyError, Keypair, PublicKey, Signature};

/// Errors during signature operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed input: {0}")]
    Malformed(#[from] KeyError),
}

/// Sign a message with a derived keypair.
///
/// # Example
///
/// ```
/// use anarchy_auth::crypto::{sign, verify, Keypair};
///
/// let keypair = Keypair::from_seed(&[7u8; 32]);
/// let signature = sign(&keypair, b"hello");
/// assert!(verify(&keypair.public_key(), b"hello", &signature));
/// ```
pub fn sign(keypair: &Keypair, message: &[u8]) -> Signature {
    keypair.sign(message)
}

/// Verify a typed signature against a typed public key.
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    public_key.verify(message, signature)
}

/// Verify using raw byte slices straight off the wire.
///
/// Fails only when `public_key` is not 32 bytes or `signature` is not 64
/// bytes. Every structurally valid pair yields `Ok(true)` or `Ok(false)`.
pub fn verify_raw(
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<bool, SignatureError> {
    let public_key = PublicKey::try_from_slice(public_key)?;
    let signature = Signature::try_from_slice(signature)?;
    Ok(verify(&public_key, message, &signature))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair(byte: u8) -> Keypair {
        Keypair::from_seed(&[byte; 32])
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = keypair(1);
        let sig = sign(&kp, b"hello, world");
        assert!(verify(&kp.public_key(), b"hello, world", &sig));
    }

    #[test]
    fn test_deterministic_signatures() {
        let kp = keypair(1);
        assert_eq!(sign(&kp, b"same"), sign(&kp, b"same"));
    }

    #[test]
    fn test_every_single_byte_flip_rejected() {
        let kp = keypair(2);
        let msg = b"flip me".to_vec();
        let sig = sign(&kp, &msg);
        let pk = kp.public_key();

        for i in 0..msg.len() {
            let mut tampered = msg.clone();
            tampered[i] ^= 0x01;
            assert!(!verify(&pk, &tampered, &sig), "message byte {i}");
        }

        for i in 0..64 {
            let mut bytes = *sig.as_bytes();
            bytes[i] ^= 0x01;
            let tampered = Signature::from_bytes(bytes);
            assert!(!verify(&pk, &msg, &tampered), "signature byte {i}");
        }
    }

    #[test]
    fn test_substituted_key_rejected() {
        let sig = sign(&keypair(3), b"msg");
        assert!(!verify(&keypair(4).public_key(), b"msg", &sig));
    }

    #[test]
    fn test_verify_raw_valid_and_invalid() {
        let kp = keypair(5);
        let sig = sign(&kp, b"raw");
        let pk = kp.public_key();
        assert_eq!(verify_raw(pk.as_bytes(), b"raw", sig.as_bytes()), Ok(true));
        assert_eq!(verify_raw(pk.as_bytes(), b"raw!", sig.as_bytes()), Ok(false));
    }

    #[test]
    fn test_verify_raw_all_zero_key_is_invalid_not_malformed() {
        // The identity point is a small-order point. Strict verification
        // rejects it, but the input is still structurally fine.
        assert_eq!(verify_raw(&[0u8; 32], b"m", &[0u8; 64]), Ok(false));
    }

    #[test]
    fn test_verify_raw_wrong_lengths_are_malformed() {
        assert_eq!(
            verify_raw(&[0u8; 31], b"m", &[0u8; 64]),
            Err(SignatureError::Malformed(KeyError::InvalidPublicKeyLength(31)))
        );
        assert_eq!(
            verify_raw(&[0u8; 32], b"m", &[0u8; 65]),
            Err(SignatureError::Malformed(KeyError::InvalidSignatureLength(65)))
        );
    }
}
