//! # Entropy Reducer
//!
//! Collapses variable-length biometric material into a fixed 32-byte seed.
//!
//! ## Primary path
//!
//! ```text
//! seed = SHA-256( code_1 || code_2 || ... )
//! ```
//!
//! Codes are concatenated in canonical eye order, left then right,
//! regardless of the order the extractor returned them in. Two codes for
//! the same eye keep their relative order. No separators or length
//! prefixes are inserted.
//!
//! ## Fallback path
//!
//! ```text
//! seed = SHA-256( image bytes )
//! ```
//!
//! Reproducible for byte-identical files only. A second photo of the same
//! eye gives a different seed. Callers must tag the result as
//! [`DerivationMethod::FallbackHash`](super::DerivationMethod::FallbackHash).

use std::fmt;
use thiserror::Error;
use zeroize::Zeroize;

use crate::biometric::IrisCode;
use crate::config::SEED_LENGTH;
use crate::crypto::sha256_multi;

/// Reasons the reducer has nothing to reduce.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntropyError {
    #[error("no iris codes to reduce")]
    NoIrisCodes,

    #[error("iris code for the {0} eye is empty")]
    EmptyIrisCode(crate::biometric::EyeSide),

    #[error("image is empty")]
    EmptyImage,
}

/// A 32-byte deterministic digest, the sole input to key derivation.
///
/// Lives for one derivation call and is wiped on drop.
pub struct EntropySeed([u8; SEED_LENGTH]);

impl EntropySeed {
    pub fn from_bytes(bytes: [u8; SEED_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LENGTH] {
        &self.0
    }
}

impl Drop for EntropySeed {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl PartialEq for EntropySeed {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for EntropySeed {}

impl fmt::Debug for EntropySeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EntropySeed(<redacted>)")
    }
}

/// Sort codes into canonical concatenation order. Stable, so same-side
/// duplicates keep extractor order.
pub fn canonical_order(codes: &[IrisCode]) -> Vec<&IrisCode> {
    let mut ordered: Vec<&IrisCode> = codes.iter().collect();
    ordered.sort_by_key(|code| code.eye());
    ordered
}

/// Reduce extracted iris codes to a seed.
pub fn reduce(codes: &[IrisCode]) -> Result<EntropySeed, EntropyError> {
    if codes.is_empty() {
        return Err(EntropyError::NoIrisCodes);
    }
    if let Some(empty) = codes.iter().find(|c| c.is_empty()) {
        return Err(EntropyError::EmptyIrisCode(empty.eye()));
    }

    let parts: Vec<&[u8]> = canonical_order(codes)
        .into_iter()
        .map(IrisCode::bytes)
        .collect();
    Ok(EntropySeed(sha256_multi(&parts)))
}

/// Reduce raw image bytes to a seed. Only fails on empty input.
pub fn reduce_fallback(image: &[u8]) -> Result<EntropySeed, EntropyError> {
    if image.is_empty() {
        return Err(EntropyError::EmptyImage);
    }
    Ok(EntropySeed(sha256_multi(&[image])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biometric::EyeSide;
    use crate::crypto::sha256;

    fn code(eye: EyeSide, bytes: &[u8]) -> IrisCode {
        IrisCode::new(eye, bytes.to_vec())
    }

    #[test]
    fn test_single_code_is_plain_sha256() {
        let seed = reduce(&[code(EyeSide::Right, b"right-code")]).unwrap();
        assert_eq!(seed.as_bytes(), &sha256(b"right-code"));
    }

    #[test]
    fn test_reduce_is_deterministic() {
        let a = reduce(&[code(EyeSide::Left, b"abc")]).unwrap();
        let b = reduce(&[code(EyeSide::Left, b"abc")]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_left_then_right_regardless_of_input_order() {
        let forward = reduce(&[code(EyeSide::Left, b"L"), code(EyeSide::Right, b"R")]).unwrap();
        let backward = reduce(&[code(EyeSide::Right, b"R"), code(EyeSide::Left, b"L")]).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward.as_bytes(), &sha256(b"LR"));
    }

    #[test]
    fn test_swapping_eye_labels_changes_seed() {
        let a = reduce(&[code(EyeSide::Left, b"one"), code(EyeSide::Right, b"two")]).unwrap();
        let b = reduce(&[code(EyeSide::Left, b"two"), code(EyeSide::Right, b"one")]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_same_side_codes_keep_extractor_order() {
        let codes = [
            code(EyeSide::Right, b"r1"),
            code(EyeSide::Left, b"l1"),
            code(EyeSide::Right, b"r2"),
        ];
        let order: Vec<&[u8]> = canonical_order(&codes).into_iter().map(IrisCode::bytes).collect();
        assert_eq!(order, vec![&b"l1"[..], &b"r1"[..], &b"r2"[..]]);
    }

    #[test]
    fn test_empty_inputs_rejected() {
        assert_eq!(reduce(&[]).unwrap_err(), EntropyError::NoIrisCodes);
        assert_eq!(
            reduce(&[code(EyeSide::Left, b"")]).unwrap_err(),
            EntropyError::EmptyIrisCode(EyeSide::Left)
        );
        assert_eq!(reduce_fallback(b"").unwrap_err(), EntropyError::EmptyImage);
    }

    #[test]
    fn test_fallback_is_sha256_of_image() {
        let seed = reduce_fallback(b"\x89PNG fake").unwrap();
        assert_eq!(seed.as_bytes(), &sha256(b"\x89PNG fake"));
    }

    #[test]
    fn test_fallback_differs_from_primary() {
        let image = b"\x89PNG image with an eye in it";
        let iris = reduce(&[code(EyeSide::Right, b"extracted template")]).unwrap();
        let fallback = reduce_fallback(image).unwrap();
        assert_ne!(iris, fallback);
    }

    #[test]
    fn test_seed_debug_is_redacted() {
        let seed = reduce_fallback(b"x").unwrap();
        assert_eq!(format!("{:?}", seed), "EntropySeed(<redacted>)");
    }
}
