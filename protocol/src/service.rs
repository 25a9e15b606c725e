//! # Key Custody Service
//!
//! The boundary the transport layer talks to:
//!
//! | Operation       | Does                                                  |
//! |-----------------|-------------------------------------------------------|
//! | `process_image` | extract → reduce (or fall back) → derive → new session |
//! | `download_key`  | armor the session's private or public key             |
//! | `sign`          | detached signature with the session's key             |
//! | `verify`        | check a signature against a session or a public key   |
//! | `terminate`     | end a session early                                   |
//! | `health`        | extractor availability and live session count         |
//!
//! The service owns nothing global. The extractor and the session store are
//! injected, so tests (and embedders) can run several independent instances
//! side by side.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::armor::{self, KeyKind};
use crate::biometric::Extractor;
use crate::config::{
    ConfigError, ServiceConfig, ARMOR_COMMENT_PREFIX, DERIVATION_VERSION, ENTROPY_DIGEST,
    MAX_IMAGE_BYTES, SIGNING_ALGORITHM,
};
use crate::crypto::PublicKey;
use crate::derivation::{self, DerivationMethod, FALLBACK_WARNING};
use crate::error::{ServiceError, ServiceResult};
use crate::session::{short_id, SessionStore};
use crate::signing::{self, DetachedSignature};

/// Result of `process_image`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedImage {
    pub session_id: String,
    pub public_key_armored: String,
    pub public_key_hex: String,
    pub method: DerivationMethod,
    pub derivation_version: u16,
    /// Set for fallback derivations.
    pub warning: Option<String>,
    /// Why extraction was skipped, for fallback derivations.
    pub extraction_error: Option<String>,
    /// Wall time spent deriving, in milliseconds.
    pub processing_ms: u64,
}

/// Whose public key a signature is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyTarget {
    Session(String),
    PublicKey(PublicKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub extractor_available: bool,
    pub extractor: String,
    pub active_sessions: usize,
    pub derivation_version: u16,
    pub entropy_digest: &'static str,
    pub signing_algorithm: &'static str,
}

/// Comment header for exported key blocks.
fn key_comment(method: DerivationMethod) -> String {
    format!("{ARMOR_COMMENT_PREFIX} - {method}")
}

pub struct KeyCustodyService {
    extractor: Extractor,
    sessions: Arc<SessionStore>,
    config: ServiceConfig,
}

impl KeyCustodyService {
    pub fn new(
        extractor: Extractor,
        sessions: Arc<SessionStore>,
        config: ServiceConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            extractor,
            sessions,
            config,
        })
    }

    /// Build with a fresh store using the configured TTL.
    pub fn with_defaults(extractor: Extractor, config: ServiceConfig) -> Result<Self, ConfigError> {
        let sessions = Arc::new(SessionStore::new(config.session_ttl));
        Self::new(extractor, sessions, config)
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// ProcessImage: derive a keypair from an image and open a session on it.
    ///
    /// Extraction problems never fail this call; they produce a
    /// [`DerivationMethod::FallbackHash`] session plus a warning. The image
    /// buffer is the caller's; nothing derived from it outlives the call
    /// except the keypair inside the new session.
    pub async fn process_image(&self, image: &[u8]) -> ServiceResult<ProcessedImage> {
        if image.len() > MAX_IMAGE_BYTES {
            return Err(ServiceError::MalformedInput(format!(
                "image is {} bytes, limit is {MAX_IMAGE_BYTES}",
                image.len()
            )));
        }

        let started = Instant::now();
        let derivation =
            derivation::derive_from_image(&self.extractor, image, self.config.extraction_timeout)
                .await?;

        let public_key = derivation.keypair.public_key();
        let public_key_armored = armor::to_armor_with_comment(
            public_key.as_bytes(),
            KeyKind::Public,
            Some(&key_comment(derivation.method)),
        )?;
        let method = derivation.method;
        let version = derivation.version;
        let extraction_error = derivation.fallback_reason.as_ref().map(ToString::to_string);

        let id = self.sessions.create(derivation.keypair, method);
        let processing_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            session = %id.short(),
            method = %method,
            version,
            processing_ms,
            "image processed"
        );

        Ok(ProcessedImage {
            session_id: id.to_string(),
            public_key_armored,
            public_key_hex: public_key.to_hex(),
            method,
            derivation_version: version,
            warning: (!method.is_biometric()).then(|| FALLBACK_WARNING.to_string()),
            extraction_error,
            processing_ms,
        })
    }

    /// DownloadKey: the armored private or public key of a live session.
    pub fn download_key(&self, session_id: &str, kind: KeyKind) -> ServiceResult<String> {
        let session = self.sessions.get(session_id)?;
        let comment = key_comment(session.method());
        let armored = match kind {
            KeyKind::Private => armor::to_armor_with_comment(
                &session.keypair().secret_key_bytes()[..],
                kind,
                Some(&comment),
            )?,
            KeyKind::Public => armor::to_armor_with_comment(
                session.public_key().as_bytes(),
                kind,
                Some(&comment),
            )?,
        };
        info!(session = %short_id(session_id), kind = %kind, "key exported");
        Ok(armored)
    }

    /// Sign: detached signature over `message` with the session's key.
    pub fn sign(&self, session_id: &str, message: &[u8]) -> ServiceResult<DetachedSignature> {
        let session = self.sessions.get(session_id)?;
        let signed = signing::sign_detached(session.keypair(), message);
        debug!(
            session = %short_id(session_id),
            message_len = message.len(),
            "message signed"
        );
        Ok(signed)
    }

    /// Verify: `false` for any mismatch, an error only for unusable input.
    ///
    /// `signature` may be an armored signature block or hex. When it is an
    /// armored block, the signer key embedded in it is ignored: the target
    /// decides whose key counts. A block with a bad checksum or packet header
    /// is a corrupt signature, not malformed input.
    pub fn verify(
        &self,
        target: &VerifyTarget,
        message: &[u8],
        signature: &str,
    ) -> ServiceResult<Verification> {
        let public_key = match target {
            VerifyTarget::Session(id) => self.sessions.get(id)?.public_key(),
            VerifyTarget::PublicKey(key) => *key,
        };
        let submitted = signing::parse_signature(signature)?;
        let valid = submitted.intact && public_key.verify(message, &submitted.signature);
        if !valid {
            debug!(public_key = ?public_key, "signature did not verify");
        }
        Ok(Verification { valid })
    }

    /// Verify with raw byte slices. Fails only on wrong lengths.
    pub fn verify_raw(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> ServiceResult<Verification> {
        let valid = crate::crypto::verify_raw(public_key, message, signature)?;
        Ok(Verification { valid })
    }

    pub fn terminate(&self, session_id: &str) -> ServiceResult<()> {
        self.sessions.terminate(session_id)?;
        Ok(())
    }

    pub fn health(&self) -> Health {
        Health {
            extractor_available: self.extractor.is_available(),
            extractor: self.extractor.name().to_string(),
            active_sessions: self.sessions.active_count(),
            derivation_version: DERIVATION_VERSION,
            entropy_digest: ENTROPY_DIGEST,
            signing_algorithm: SIGNING_ALGORITHM,
        }
    }
}

impl std::fmt::Debug for KeyCustodyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCustodyService")
            .field("extractor", &self.extractor)
            .field("sessions", &self.sessions)
            .field("config", &self.config)
            .finish()
    }
}
