//! Service-level error taxonomy.
//!
//! Callers need to tell "biometric not usable" from "session gone" from
//! "bad input", so each of those is its own variant. Module errors convert
//! into these with `?`.

use thiserror::Error;

use crate::armor::ArmorError;
use crate::biometric::ExtractionError;
use crate::crypto::{KeyError, SignatureError};
use crate::derivation::EntropyError;
use crate::session::SessionError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Neither the extractor nor the fallback path had anything to work
    /// with. Only an empty image gets here.
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("session not found")]
    SessionNotFound,

    #[error("session expired")]
    SessionExpired,

    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A derivation invariant was violated. Never happens in correct code:
    /// seeds are typed `[u8; 32]`, so nothing in this crate constructs it.
    /// Transport layers still map it to a 500.
    #[error("internal derivation error: {0}")]
    InternalDerivation(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    /// Stable machine-readable code for transport layers.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::ExtractionFailed(_) => "extraction_failed",
            ServiceError::SessionNotFound => "session_not_found",
            ServiceError::SessionExpired => "session_expired",
            ServiceError::MalformedInput(_) => "malformed_input",
            ServiceError::InternalDerivation(_) => "internal_derivation",
        }
    }
}

impl From<SessionError> for ServiceError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound => ServiceError::SessionNotFound,
            SessionError::Expired => ServiceError::SessionExpired,
        }
    }
}

impl From<KeyError> for ServiceError {
    fn from(e: KeyError) -> Self {
        ServiceError::MalformedInput(e.to_string())
    }
}

impl From<SignatureError> for ServiceError {
    fn from(e: SignatureError) -> Self {
        ServiceError::MalformedInput(e.to_string())
    }
}

impl From<ArmorError> for ServiceError {
    fn from(e: ArmorError) -> Self {
        ServiceError::MalformedInput(e.to_string())
    }
}

impl From<ExtractionError> for ServiceError {
    fn from(e: ExtractionError) -> Self {
        ServiceError::ExtractionFailed(e.to_string())
    }
}

impl From<EntropyError> for ServiceError {
    fn from(e: EntropyError) -> Self {
        ServiceError::ExtractionFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_errors_stay_distinct() {
        assert_eq!(
            ServiceError::from(SessionError::NotFound),
            ServiceError::SessionNotFound
        );
        assert_eq!(
            ServiceError::from(SessionError::Expired),
            ServiceError::SessionExpired
        );
    }

    #[test]
    fn test_length_errors_are_malformed_input() {
        let err = ServiceError::from(KeyError::InvalidSignatureLength(10));
        assert_eq!(err.code(), "malformed_input");
        assert!(err.to_string().contains("expected 64 bytes, got 10"));
    }

    #[test]
    fn test_empty_image_is_extraction_failure() {
        let err = ServiceError::from(EntropyError::EmptyImage);
        assert_eq!(err, ServiceError::ExtractionFailed("image is empty".into()));
    }
}
