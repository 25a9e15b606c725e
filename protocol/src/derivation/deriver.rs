//! # Key Deriver
//!
//! `EntropySeed → Keypair`. The seed is the Ed25519 secret key; standard
//! Ed25519 key generation is already deterministic for a given 32-byte
//! seed, so this step adds no randomness and no state.

use super::entropy::EntropySeed;
use crate::crypto::Keypair;

/// Derive the keypair for a seed.
///
/// Infallible: [`EntropySeed`] holds exactly `SEED_LENGTH` bytes by
/// construction, so there is no length left to check here.
pub fn derive(seed: &EntropySeed) -> Keypair {
    Keypair::from_seed(seed.as_bytes())
}
