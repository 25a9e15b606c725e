//! # Biometric Feature Extraction
//!
//! Iris recognition itself is not implemented here. This module defines the
//! contract a feature extractor must honour and the capability switch the
//! rest of the crate sees:
//!
//! ```text
//! Extractor::Available(..)  → image bytes in, one or more IrisCodes out (or a failure)
//! Extractor::Unavailable    → every call fails, derivation falls back to hashing the image
//! ```
//!
//! The variant is chosen once at startup. Nothing downstream inspects
//! extractor internals; the entropy reducer only ever sees "codes" or
//! "no codes".
//!
//! Two adapters ship with the crate:
//!
//! - [`CommandExtractor`] runs an external program (an iris pipeline in
//!   Python, say) and parses its stdout.
//! - [`BlockingExtractor`] wraps an in-process, CPU-bound extractor and runs
//!   it on tokio's blocking pool, so one slow image never stalls requests
//!   for unrelated sessions.

pub mod command;

pub use command::CommandExtractor;

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

/// Why an extractor produced no usable iris code.
///
/// Every one of these is recovered locally by the fallback path. They are
/// reported (logged, surfaced as a warning) but never fail a derivation on
/// their own.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no feature extractor is available")]
    Unavailable,

    #[error("no eye detected in image")]
    NoEyeDetected,

    #[error("image resolution too low for feature extraction")]
    InsufficientResolution,

    #[error("iris is occluded")]
    Occluded,

    #[error("image format could not be decoded")]
    UnreadableFormat,

    #[error("extractor returned no iris codes")]
    NoCodes,

    #[error("extractor returned a zero-length iris code")]
    EmptyCode,

    #[error("feature extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("extractor output could not be parsed: {0}")]
    InvalidOutput(String),

    #[error("extractor failed: {0}")]
    Failed(String),
}

/// Which eye an iris code was extracted from.
///
/// The declaration order is the canonical concatenation order used by the
/// entropy reducer: left before right. Do not reorder these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EyeSide {
    Left,
    Right,
}

impl EyeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            EyeSide::Left => "left",
            EyeSide::Right => "right",
        }
    }
}

impl fmt::Display for EyeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EyeSide {
    type Err = ExtractionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(EyeSide::Left),
            "right" | "r" => Ok(EyeSide::Right),
            other => Err(ExtractionError::InvalidOutput(format!(
                "unknown eye side {other:?}"
            ))),
        }
    }
}

/// One extracted biometric template.
///
/// The canonical byte representation is `bytes()` exactly as the extractor
/// produced it, e.g. a flattened bit matrix packed into bytes. Held only for
/// the duration of a single derivation and wiped on drop.
pub struct IrisCode {
    eye: EyeSide,
    bytes: Vec<u8>,
}

impl IrisCode {
    pub fn new(eye: EyeSide, bytes: Vec<u8>) -> Self {
        Self { eye, bytes }
    }

    pub fn eye(&self) -> EyeSide {
        self.eye
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Drop for IrisCode {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for IrisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Biometric templates are as sensitive as private keys.
        write!(f, "IrisCode({}, {} bytes)", self.eye, self.bytes.len())
    }
}

/// An asynchronous feature extractor.
///
/// Implementations must be safe to call concurrently. The caller enforces
/// the timeout; implementations should still release resources promptly if
/// the returned future is dropped.
#[async_trait]
pub trait FeatureExtractor: Send + Sync {
    /// Short identifier, reported by health checks and in logs.
    fn name(&self) -> &str;

    /// Turn image bytes into one or more iris codes.
    async fn extract(&self, image: &[u8]) -> Result<Vec<IrisCode>, ExtractionError>;
}

/// A synchronous, CPU-bound extractor. Wrap it in [`BlockingExtractor`].
pub trait BlockingFeatureExtractor: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn extract_blocking(&self, image: &[u8]) -> Result<Vec<IrisCode>, ExtractionError>;
}

/// Runs a [`BlockingFeatureExtractor`] on tokio's blocking thread pool.
pub struct BlockingExtractor<E> {
    inner: Arc<E>,
}

impl<E: BlockingFeatureExtractor> BlockingExtractor<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

#[async_trait]
impl<E: BlockingFeatureExtractor> FeatureExtractor for BlockingExtractor<E> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn extract(&self, image: &[u8]) -> Result<Vec<IrisCode>, ExtractionError> {
        let inner = Arc::clone(&self.inner);
        let image = Zeroizing::new(image.to_vec());
        tokio::task::spawn_blocking(move || inner.extract_blocking(&image))
            .await
            .map_err(|e| ExtractionError::Failed(format!("extraction worker panicked: {e}")))?
    }
}

/// The extraction capability, fixed at startup.
#[derive(Clone)]
pub enum Extractor {
    Available(Arc<dyn FeatureExtractor>),
    Unavailable,
}

impl Extractor {
    pub fn new<E: FeatureExtractor + 'static>(extractor: E) -> Self {
        Extractor::Available(Arc::new(extractor))
    }

    pub fn blocking<E: BlockingFeatureExtractor>(extractor: E) -> Self {
        Self::new(BlockingExtractor::new(extractor))
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Extractor::Available(_))
    }

    pub fn name(&self) -> &str {
        match self {
            Extractor::Available(e) => e.name(),
            Extractor::Unavailable => "unavailable",
        }
    }

    /// Run extraction under `timeout`.
    ///
    /// Post-conditions on success: at least one code, none of them empty.
    /// An extractor that violates this gets the same treatment as one that
    /// failed outright.
    pub async fn extract(
        &self,
        image: &[u8],
        timeout: Duration,
    ) -> Result<Vec<IrisCode>, ExtractionError> {
        let extractor = match self {
            Extractor::Available(e) => e,
            Extractor::Unavailable => return Err(ExtractionError::Unavailable),
        };

        let codes = tokio::time::timeout(timeout, extractor.extract(image))
            .await
            .map_err(|_| ExtractionError::Timeout(timeout))??;

        if codes.is_empty() {
            return Err(ExtractionError::NoCodes);
        }
        if codes.iter().any(IrisCode::is_empty) {
            return Err(ExtractionError::EmptyCode);
        }
        Ok(codes)
    }
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Extractor({})", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<(EyeSide, Vec<u8>)>);

    impl BlockingFeatureExtractor for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn extract_blocking(&self, _image: &[u8]) -> Result<Vec<IrisCode>, ExtractionError> {
            Ok(self
                .0
                .iter()
                .map(|(eye, bytes)| IrisCode::new(*eye, bytes.clone()))
                .collect())
        }
    }

    struct Slow;

    #[async_trait]
    impl FeatureExtractor for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn extract(&self, _image: &[u8]) -> Result<Vec<IrisCode>, ExtractionError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![IrisCode::new(EyeSide::Left, vec![1])])
        }
    }

    #[test]
    fn test_eye_side_canonical_order() {
        assert!(EyeSide::Left < EyeSide::Right);
    }

    #[test]
    fn test_eye_side_parsing() {
        assert_eq!("Left".parse::<EyeSide>().unwrap(), EyeSide::Left);
        assert_eq!(" r ".parse::<EyeSide>().unwrap(), EyeSide::Right);
        assert!("middle".parse::<EyeSide>().is_err());
    }

    #[test]
    fn test_iris_code_debug_hides_bytes() {
        let code = IrisCode::new(EyeSide::Right, vec![0xde, 0xad]);
        assert_eq!(format!("{:?}", code), "IrisCode(right, 2 bytes)");
    }

    #[tokio::test]
    async fn test_unavailable_always_fails() {
        let ex = Extractor::Unavailable;
        assert!(!ex.is_available());
        assert_eq!(ex.name(), "unavailable");
        let err = ex.extract(b"img", Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err, ExtractionError::Unavailable);
    }

    #[tokio::test]
    async fn test_blocking_extractor_returns_codes() {
        let ex = Extractor::blocking(Fixed(vec![(EyeSide::Left, vec![1, 2, 3])]));
        assert!(ex.is_available());
        let codes = ex.extract(b"img", Duration::from_secs(5)).await.unwrap();
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].bytes(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_empty_code_list_is_failure() {
        let ex = Extractor::blocking(Fixed(vec![]));
        let err = ex.extract(b"img", Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err, ExtractionError::NoCodes);
    }

    #[tokio::test]
    async fn test_zero_length_code_is_failure() {
        let ex = Extractor::blocking(Fixed(vec![
            (EyeSide::Left, vec![1]),
            (EyeSide::Right, vec![]),
        ]));
        let err = ex.extract(b"img", Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err, ExtractionError::EmptyCode);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_extraction_failure() {
        let ex = Extractor::new(Slow);
        let timeout = Duration::from_millis(250);
        let err = ex.extract(b"img", timeout).await.unwrap_err();
        assert_eq!(err, ExtractionError::Timeout(timeout));
    }
}
