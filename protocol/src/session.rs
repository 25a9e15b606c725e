//! # Session Store
//!
//! The only shared mutable state in the crate. A session binds an opaque,
//! random handle to exactly one derived keypair for a bounded time:
//!
//! ```text
//! ABSENT ──create──▶ ACTIVE ──ttl elapsed──▶ EXPIRED ──(get / sweep)──▶ ABSENT
//!                       └────────terminate────────────────────────────▶ ABSENT
//! ```
//!
//! Expiry is decided by comparing the injected [`Clock`] against
//! `created_at` at access time. `get` on an expired entry removes it and
//! reports [`SessionError::Expired`]; the optional sweeper task removes
//! expired entries that nobody asks about. Either way an expired session is
//! never handed out.
//!
//! Entries live in a [`DashMap`] and are immutable once inserted, so a
//! reader either sees a complete [`Session`] or nothing.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::RngCore;
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::{DERIVATION_VERSION, SESSION_ID_BYTES};
use crate::crypto::{Keypair, PublicKey};
use crate::derivation::DerivationMethod;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,

    #[error("session expired")]
    Expired,
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Wall-clock source for session timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. For tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// An opaque session handle: 32 bytes from the OS RNG, hex-encoded.
///
/// Never derived from biometric data or key material.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Eight-character prefix, the only form that goes into logs.
    pub fn short(&self) -> &str {
        short_id(&self.0)
    }
}

/// Log-safe prefix of an arbitrary, possibly attacker-supplied, id: at most
/// eight characters.
pub fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(i, _)| &id[..i])
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({}…)", self.short())
    }
}

/// A live binding between a handle and a derived keypair.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    keypair: Keypair,
    method: DerivationMethod,
    derivation_version: u16,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    pub fn method(&self) -> DerivationMethod {
        self.method
    }

    pub fn derivation_version(&self) -> u16 {
        self.derivation_version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// In-memory session store with expiry.
pub struct SessionStore {
    sessions: DashMap<SessionId, Arc<Session>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        // A clock that went backwards counts as zero elapsed time.
        let elapsed = now
            .signed_duration_since(session.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        elapsed >= self.ttl
    }

    /// Take ownership of a keypair and hand back a fresh handle for it.
    pub fn create(&self, keypair: Keypair, method: DerivationMethod) -> SessionId {
        let id = SessionId::generate();
        let session = Arc::new(Session {
            id: id.clone(),
            keypair,
            method,
            derivation_version: DERIVATION_VERSION,
            created_at: self.clock.now(),
        });
        self.sessions.insert(id.clone(), session);
        info!(session = %id.short(), method = %method, "session created");
        id
    }

    /// Look up a live session.
    pub fn get(&self, id: &str) -> Result<Arc<Session>, SessionError> {
        let now = self.clock.now();
        let session = self
            .sessions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(SessionError::NotFound)?;

        if self.is_expired(&session, now) {
            self.sessions
                .remove_if(id, |_, stored| self.is_expired(stored, now));
            debug!(session = %short_id(id), "session expired on access");
            return Err(SessionError::Expired);
        }
        Ok(session)
    }

    /// End a session early. The keypair is dropped with the last reference.
    pub fn terminate(&self, id: &str) -> Result<(), SessionError> {
        let now = self.clock.now();
        let (_, session) = self.sessions.remove(id).ok_or(SessionError::NotFound)?;
        if self.is_expired(&session, now) {
            return Err(SessionError::Expired);
        }
        info!(session = %short_id(id), "session terminated");
        Ok(())
    }

    /// Remove every expired entry. Returns how many went.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| !self.is_expired(session, now));
        before.saturating_sub(self.sessions.len())
    }

    /// Sessions that would currently be returned by [`get`](Self::get).
    pub fn active_count(&self) -> usize {
        let now = self.clock.now();
        self.sessions
            .iter()
            .filter(|entry| !self.is_expired(entry.value(), now))
            .count()
    }

    /// Entries held, expired or not.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `interval` until the
    /// store is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let removed = store.sweep_expired();
                if removed > 0 {
                    debug!(removed, remaining = store.len(), "swept expired sessions");
                }
            }
        })
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.sessions.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}
