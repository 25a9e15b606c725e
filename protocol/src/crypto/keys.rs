//! # Key Material
//!
//! Ed25519 keypair, public key, and signature wrappers.
//!
//! Nothing in this crate ever generates a random signing key. Every
//! [`Keypair`] comes from a 32-byte seed produced by the entropy reducer,
//! which is what makes the whole scheme repeatable: same iris, same key.
//!
//! ## Security considerations
//!
//! - Secret key bytes leave this module only inside [`Zeroizing`] buffers.
//! - The signing key itself is zeroized on drop (ed25519-dalek does that).
//! - Key bytes are never logged. `Debug` prints the public half only.

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::{SIGNATURE_LENGTH, SIGNING_KEY_LENGTH, VERIFYING_KEY_LENGTH};

/// Errors that can occur while building key material from raw bytes.
///
/// Deliberately limited to length problems. A 32-byte string that is not a
/// valid curve point is not an error here; it simply never verifies.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid secret key: expected 32 bytes, got {0}")]
    InvalidSecretKeyLength(usize),

    #[error("invalid public key: expected 32 bytes, got {0}")]
    InvalidPublicKeyLength(usize),

    #[error("invalid signature: expected 64 bytes, got {0}")]
    InvalidSignatureLength(usize),

    #[error("keypair validation failed: public key does not match secret key")]
    KeypairMismatch,
}

/// An Ed25519 keypair derived from biometric entropy.
///
/// Intentionally not `Clone`, `Serialize` or `Deserialize`. A session owns
/// exactly one of these; copying it around is how keys end up in places
/// they should not be.
pub struct Keypair {
    signing_key: SigningKey,
}

/// The public half of a derived identity. Safe to share, log, export.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    bytes: [u8; VERIFYING_KEY_LENGTH],
}

/// An Ed25519 signature. Always exactly 64 bytes, enforced by the type.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    bytes: [u8; SIGNATURE_LENGTH],
}

impl Keypair {
    /// Constructs a keypair from a 32-byte seed.
    ///
    /// The seed is the Ed25519 secret key verbatim (RFC 8032 §5.1.5 expands
    /// it internally with SHA-512). No randomness is involved.
    pub fn from_seed(seed: &[u8; SIGNING_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Constructs a keypair from an arbitrary slice, checking the length.
    pub fn from_slice(seed: &[u8]) -> Result<Self, KeyError> {
        let arr: &[u8; SIGNING_KEY_LENGTH] = seed
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKeyLength(seed.len()))?;
        Ok(Self::from_seed(arr))
    }

    /// Returns the public key associated with this keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Sign a message. Deterministic: same key and message, same signature.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature {
            bytes: self.signing_key.sign(message).to_bytes(),
        }
    }

    /// Verify a signature against this keypair's public key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.public_key().verify(message, signature)
    }

    /// Exports the raw 32-byte secret seed.
    ///
    /// The buffer wipes itself on drop. Don't copy the bytes out of it.
    pub fn secret_key_bytes(&self) -> Zeroizing<[u8; SIGNING_KEY_LENGTH]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }

    /// Checks that `public` is the key this keypair actually derives.
    pub fn ensure_matches(&self, public: &PublicKey) -> Result<(), KeyError> {
        if &self.public_key() == public {
            Ok(())
        } else {
            Err(KeyError::KeypairMismatch)
        }
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret key material. Not even "partially."
        write!(f, "Keypair(pub={})", self.public_key().to_hex())
    }
}

impl PartialEq for Keypair {
    /// Keypairs compare by public key. The public key is a pure function of
    /// the secret, and comparing secrets in non-constant time is a bad habit.
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for Keypair {}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

impl PublicKey {
    /// Create a `PublicKey` from raw bytes. No curve check happens here.
    pub fn from_bytes(bytes: [u8; VERIFYING_KEY_LENGTH]) -> Self {
        Self { bytes }
    }

    /// Create a `PublicKey` from a slice, checking only the length.
    ///
    /// Point validity is checked at verification time, where an invalid
    /// point means "not valid" rather than "malformed".
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; VERIFYING_KEY_LENGTH] = slice
            .try_into()
            .map_err(|_| KeyError::InvalidPublicKeyLength(slice.len()))?;
        Ok(Self { bytes })
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; VERIFYING_KEY_LENGTH] {
        &self.bytes
    }

    /// Verify a signature against this public key.
    ///
    /// Strict verification: small-order keys and non-canonical signatures
    /// are rejected. Any failure is just `false`.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let dalek_sig = DalekSignature::from_bytes(&signature.bytes);
        verifying_key.verify_strict(message, &dalek_sig).is_ok()
    }

    /// Hex-encoded representation. 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse a hex-encoded public key.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s.trim()).map_err(|_| KeyError::InvalidPublicKeyLength(0))?;
        Self::try_from_slice(&bytes)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..16])
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

impl Signature {
    /// Create a signature from its 64-byte representation.
    pub fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self { bytes }
    }

    /// Create a signature from a slice, checking the length.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; SIGNATURE_LENGTH] = slice
            .try_into()
            .map_err(|_| KeyError::InvalidSignatureLength(slice.len()))?;
        Ok(Self { bytes })
    }

    /// Returns the raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.bytes
    }

    /// Hex-encoded signature. 128 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse a hex-encoded signature.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s.trim()).map_err(|_| KeyError::InvalidSignatureLength(0))?;
        Self::try_from_slice(&bytes)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        write!(f, "Signature({}...{})", &hex_str[..8], &hex_str[120..])
    }
}
