//! # Cryptographic Primitives
//!
//! Thin, type-safe wrappers around audited implementations:
//!
//! - **Ed25519** (`ed25519-dalek`) for signatures.
//! - **SHA-256** (`sha2`) for entropy reduction and message digests.
//!
//! Nothing here holds state. Every function is safe to call from any
//! number of threads at once.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{sha256, sha256_hex, sha256_multi};
pub use keys::{KeyError, Keypair, PublicKey, Signature};
pub use signatures::{sign, verify, verify_raw, SignatureError};
