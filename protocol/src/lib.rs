// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Anarchy Auth — Core Library
//!
//! Your iris is the key. Literally: an iris image is reduced to 32 bytes of
//! deterministic entropy, those bytes become an Ed25519 secret key, and the
//! key lives only in memory behind a short-lived session handle. Nothing is
//! stored. Come back with the same eye, get the same key.
//!
//! ## Architecture
//!
//! Leaves first:
//!
//! - **biometric** — The feature extractor contract and its two capability
//!   variants (available, unavailable). Iris recognition itself is plugged in.
//! - **derivation** — Entropy reducer and key deriver. Pure functions, and
//!   the part you must never change without bumping the version tag.
//! - **crypto** — Ed25519 and SHA-256 wrappers.
//! - **armor** — PGP-style ASCII armor for keys and detached signatures.
//! - **session** — The session store: random handle → keypair, with expiry.
//! - **signing** — Detached signature production and parsing.
//! - **service** — The boundary operations a transport layer calls.
//! - **config** — Protocol constants and runtime tunables.
//!
//! ## Design Philosophy
//!
//! 1. Determinism first. Same image bytes, same key, on any machine, forever.
//! 2. Degraded mode is loud. A key derived from a file hash says so.
//! 3. Secrets are transient. Images, iris codes and seeds die with the call
//!    that used them; private keys die with their session.

pub mod armor;
pub mod biometric;
pub mod config;
pub mod crypto;
pub mod derivation;
pub mod error;
pub mod service;
pub mod session;
pub mod signing;

pub use error::{ServiceError, ServiceResult};
pub use service::KeyCustodyService;
