//! # Protocol Configuration & Constants
//!
//! Every magic number in Anarchy Auth lives here. If you're hardcoding a
//! constant somewhere else, you're doing it wrong.
//!
//! Some of these values are part of the derivation contract. Changing the
//! digest, the iris code ordering, or the seed length silently changes
//! every key ever derived from every iris. Those changes MUST come with a
//! bump of [`DERIVATION_VERSION`].

use std::time::Duration;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Derivation Contract
// ---------------------------------------------------------------------------

/// Version of the biometric-to-key derivation scheme.
///
/// Version 1: SHA-256 over the raw concatenation of iris codes in
/// left-then-right order (or over the raw image bytes in fallback mode),
/// used directly as the Ed25519 secret seed.
pub const DERIVATION_VERSION: u16 = 1;

/// Length of an entropy seed in bytes. Equal to the SHA-256 output length
/// and to the Ed25519 secret key length, which is the whole point.
pub const SEED_LENGTH: usize = 32;

/// Digest used by the entropy reducer.
pub const ENTROPY_DIGEST: &str = "SHA-256";

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Ed25519 is the only signing algorithm we derive keys for.
pub const SIGNING_ALGORITHM: &str = "Ed25519";

/// Signing key length in bytes.
pub const SIGNING_KEY_LENGTH: usize = 32;

/// Public (verifying) key length in bytes.
pub const VERIFYING_KEY_LENGTH: usize = 32;

/// Ed25519 signature length. Always 64 bytes.
pub const SIGNATURE_LENGTH: usize = 64;

// ---------------------------------------------------------------------------
// PGP Framing
// ---------------------------------------------------------------------------

/// Key packet version. We only ever emit v4 packets.
pub const PGP_PACKET_VERSION: u8 = 0x04;

/// OpenPGP public-key algorithm id for EdDSA (legacy, RFC 4880bis).
pub const PGP_ALGO_EDDSA: u8 = 0x16;

/// OpenPGP hash algorithm id for SHA-256.
pub const PGP_HASH_SHA256: u8 = 0x08;

/// OpenPGP signature type: signature of a binary document.
pub const PGP_SIG_BINARY_DOCUMENT: u8 = 0x00;

/// Creation time written into every key packet.
///
/// Pinned to the epoch so that armoring is a pure function of the key:
/// the same iris must always export the same public key block.
pub const PGP_KEY_CREATION_TIME: u32 = 0;

/// Base64 body lines are wrapped at this many columns.
pub const ARMOR_LINE_WIDTH: usize = 64;

/// Comment header stamped on every armor block we produce.
pub const ARMOR_COMMENT_PREFIX: &str = "Generated by Anarchy Auth";

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Random bytes in a session id. 256 bits, far past the 128-bit floor for
/// unguessable handles. Rendered as 64 hex characters.
pub const SESSION_ID_BYTES: usize = 32;

/// Default lifetime of a session, measured from creation.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(15 * 60);

/// Default interval between active sweeps of expired sessions.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Biometric Processing
// ---------------------------------------------------------------------------

/// Upper bound on a single feature extraction before it is treated as
/// failed. Iris pipelines are slow, but not this slow.
pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest image the core will accept. The transport layer enforces its own
/// limit first; this is the backstop.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Runtime Configuration
// ---------------------------------------------------------------------------

/// Errors raised when a [`ServiceConfig`] makes no sense.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("session ttl must be greater than zero")]
    ZeroSessionTtl,

    #[error("extraction timeout must be greater than zero")]
    ZeroExtractionTimeout,

    #[error("sweep interval must be greater than zero")]
    ZeroSweepInterval,
}

/// Tunables for a running key custody service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// How long a session (and the private key it holds) lives.
    pub session_ttl: Duration,
    /// Budget for one feature extraction call.
    pub extraction_timeout: Duration,
    /// How often the background sweeper evicts expired sessions.
    pub sweep_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            session_ttl: DEFAULT_SESSION_TTL,
            extraction_timeout: DEFAULT_EXTRACTION_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl ServiceConfig {
    /// Rejects zero durations. A zero TTL would expire every session at
    /// birth; a zero timeout would fail every extraction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_ttl.is_zero() {
            return Err(ConfigError::ZeroSessionTtl);
        }
        if self.extraction_timeout.is_zero() {
            return Err(ConfigError::ZeroExtractionTimeout);
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::ZeroSweepInterval);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_matches_signing_key_length() {
        // The seed is used as the Ed25519 secret verbatim. If these drift,
        // derivation stops being well-defined.
        assert_eq!(SEED_LENGTH, SIGNING_KEY_LENGTH);
        assert_eq!(SEED_LENGTH, ed25519_dalek::SECRET_KEY_LENGTH);
    }

    #[test]
    fn test_crypto_parameter_sizes() {
        assert_eq!(VERIFYING_KEY_LENGTH, ed25519_dalek::PUBLIC_KEY_LENGTH);
        assert_eq!(SIGNATURE_LENGTH, ed25519_dalek::SIGNATURE_LENGTH);
    }

    #[test]
    fn test_session_id_entropy_floor() {
        assert!(SESSION_ID_BYTES * 8 >= 128);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(ServiceConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_zero_durations_rejected() {
        let cfg = ServiceConfig {
            session_ttl: Duration::ZERO,
            ..ServiceConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroSessionTtl));

        let cfg = ServiceConfig {
            extraction_timeout: Duration::ZERO,
            ..ServiceConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroExtractionTimeout));

        let cfg = ServiceConfig {
            sweep_interval: Duration::ZERO,
            ..ServiceConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroSweepInterval));
    }
}
