//! # Biometric-to-Key Derivation
//!
//! ```text
//! image ─▶ Extractor ─▶ IrisCode[] ─▶ reduce ──────────┐
//!   │         │ (fails / unavailable)                  ├─▶ EntropySeed ─▶ derive ─▶ Keypair
//!   └─────────┴──────────────────────▶ reduce_fallback ┘
//! ```
//!
//! Every step is a pure function except the extractor call. The result
//! carries the [`DerivationMethod`] that produced it, so a fallback key is
//! never mistaken for a biometric one, and the scheme version, so a future
//! change to the digest or ordering cannot silently collide with keys
//! derived today.

pub mod deriver;
pub mod entropy;

pub use deriver::derive;
pub use entropy::{canonical_order, reduce, reduce_fallback, EntropyError, EntropySeed};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::biometric::{ExtractionError, Extractor};
use crate::config::DERIVATION_VERSION;
use crate::crypto::Keypair;

/// Warning attached to every fallback derivation.
pub const FALLBACK_WARNING: &str = "iris features could not be extracted; key was derived from a hash \
of the exact image bytes and will not be reproduced by a different photo of the same eye";

/// How the entropy seed behind a keypair was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivationMethod {
    /// SHA-256 over extracted iris codes. Stable across photos of one eye,
    /// to the extent the extractor is.
    Iris,
    /// SHA-256 over the raw image bytes. Stable for byte-identical files only.
    FallbackHash,
}

impl DerivationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DerivationMethod::Iris => "iris",
            DerivationMethod::FallbackHash => "fallback_hash",
        }
    }

    pub fn is_biometric(&self) -> bool {
        matches!(self, DerivationMethod::Iris)
    }
}

impl fmt::Display for DerivationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of one derivation call. Nothing but the keypair survives.
#[derive(Debug)]
pub struct Derivation {
    pub keypair: Keypair,
    pub method: DerivationMethod,
    pub version: u16,
    /// Why the primary path was skipped, for fallback derivations.
    pub fallback_reason: Option<ExtractionError>,
}

/// Run the full pipeline for one image.
///
/// Extraction problems are recovered here by switching to the fallback
/// path. The only hard failure is an empty image, where neither path has
/// anything to work with.
pub async fn derive_from_image(
    extractor: &Extractor,
    image: &[u8],
    extraction_timeout: Duration,
) -> Result<Derivation, EntropyError> {
    if image.is_empty() {
        return Err(EntropyError::EmptyImage);
    }

    let primary = match extractor.extract(image, extraction_timeout).await {
        Ok(codes) => reduce(&codes).map_err(|e| match e {
            EntropyError::NoIrisCodes => ExtractionError::NoCodes,
            _ => ExtractionError::EmptyCode,
        }),
        Err(e) => Err(e),
    };

    let (seed, method, fallback_reason) = match primary {
        Ok(seed) => (seed, DerivationMethod::Iris, None),
        Err(reason) => {
            tracing::warn!(
                extractor = extractor.name(),
                reason = %reason,
                "iris extraction unusable, deriving from image hash"
            );
            (
                reduce_fallback(image)?,
                DerivationMethod::FallbackHash,
                Some(reason),
            )
        }
    };

    Ok(Derivation {
        keypair: derive(&seed),
        method,
        version: DERIVATION_VERSION,
        fallback_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biometric::{BlockingFeatureExtractor, EyeSide, IrisCode};
    use crate::crypto::sha256;

    struct Echo;

    impl BlockingFeatureExtractor for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn extract_blocking(&self, image: &[u8]) -> Result<Vec<IrisCode>, ExtractionError> {
            Ok(vec![IrisCode::new(EyeSide::Right, sha256(image).to_vec())])
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_method_serialization() {
        assert_eq!(serde_json::to_string(&DerivationMethod::Iris).unwrap(), "\"iris\"");
        assert_eq!(
            serde_json::to_string(&DerivationMethod::FallbackHash).unwrap(),
            "\"fallback_hash\""
        );
        assert_eq!(DerivationMethod::FallbackHash.to_string(), "fallback_hash");
    }

    #[tokio::test]
    async fn test_iris_path_is_repeatable() {
        let ex = Extractor::blocking(Echo);
        let a = derive_from_image(&ex, b"image A", TIMEOUT).await.unwrap();
        let b = derive_from_image(&ex, b"image A", TIMEOUT).await.unwrap();
        assert_eq!(a.method, DerivationMethod::Iris);
        assert_eq!(a.version, DERIVATION_VERSION);
        assert!(a.fallback_reason.is_none());
        assert_eq!(a.keypair, b.keypair);
    }

    #[tokio::test]
    async fn test_unavailable_extractor_falls_back() {
        let d = derive_from_image(&Extractor::Unavailable, b"image A", TIMEOUT)
            .await
            .unwrap();
        assert_eq!(d.method, DerivationMethod::FallbackHash);
        assert_eq!(d.fallback_reason, Some(ExtractionError::Unavailable));

        let expected = derive(&reduce_fallback(b"image A").unwrap());
        assert_eq!(d.keypair, expected);
    }

    #[tokio::test]
    async fn test_primary_and_fallback_keys_differ() {
        let iris = derive_from_image(&Extractor::blocking(Echo), b"image A", TIMEOUT)
            .await
            .unwrap();
        let fallback = derive_from_image(&Extractor::Unavailable, b"image A", TIMEOUT)
            .await
            .unwrap();
        assert_ne!(iris.keypair, fallback.keypair);
    }

    #[tokio::test]
    async fn test_empty_image_is_hard_failure() {
        let err = derive_from_image(&Extractor::Unavailable, b"", TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(err, EntropyError::EmptyImage);
    }
}
