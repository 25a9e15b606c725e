//! Minimal OpenPGP-style packet bodies.
//!
//! These are packet *bodies* only, with no CTB or length prefix. They carry
//! enough structure to be recognisable and self-checking, not enough to be
//! imported by GnuPG.
//!
//! ```text
//! key packet:       version(1) || created(4, BE) || algo(1) || material
//!   private:        material = secret(32) || public(32)
//!   public:         material = public(32)
//!
//! signature packet: version(1) || sig type(1) || algo(1) || hash(1)
//!                   || signer public(32) || signature(64)
//! ```

use zeroize::Zeroizing;

use super::{ArmorError, KeyKind};
use crate::config::{
    PGP_ALGO_EDDSA, PGP_HASH_SHA256, PGP_KEY_CREATION_TIME, PGP_PACKET_VERSION,
    PGP_SIG_BINARY_DOCUMENT, SIGNATURE_LENGTH, SIGNING_KEY_LENGTH, VERIFYING_KEY_LENGTH,
};
use crate::crypto::{Keypair, PublicKey, Signature};

/// version + creation time + algorithm.
const KEY_HEADER_LEN: usize = 1 + 4 + 1;

/// version + type + algorithm + hash.
const SIG_HEADER_LEN: usize = 4;

pub const PRIVATE_KEY_PACKET_LEN: usize = KEY_HEADER_LEN + SIGNING_KEY_LENGTH + VERIFYING_KEY_LENGTH;
pub const PUBLIC_KEY_PACKET_LEN: usize = KEY_HEADER_LEN + VERIFYING_KEY_LENGTH;
pub const SIGNATURE_PACKET_LEN: usize = SIG_HEADER_LEN + VERIFYING_KEY_LENGTH + SIGNATURE_LENGTH;

fn key_header() -> [u8; KEY_HEADER_LEN] {
    let created = PGP_KEY_CREATION_TIME.to_be_bytes();
    [
        PGP_PACKET_VERSION,
        created[0],
        created[1],
        created[2],
        created[3],
        PGP_ALGO_EDDSA,
    ]
}

/// Build the key packet for `kind`.
///
/// `key_bytes` is the 32-byte secret seed for [`KeyKind::Private`] (the
/// public half is recomputed from it) or the 32-byte public key for
/// [`KeyKind::Public`].
pub fn encode_key_packet(kind: KeyKind, key_bytes: &[u8]) -> Result<Zeroizing<Vec<u8>>, ArmorError> {
    let mut packet = Zeroizing::new(Vec::with_capacity(PRIVATE_KEY_PACKET_LEN));
    packet.extend_from_slice(&key_header());

    match kind {
        KeyKind::Private => {
            let keypair = Keypair::from_slice(key_bytes)?;
            packet.extend_from_slice(&keypair.secret_key_bytes()[..]);
            packet.extend_from_slice(keypair.public_key().as_bytes());
        }
        KeyKind::Public => {
            let public = PublicKey::try_from_slice(key_bytes)?;
            packet.extend_from_slice(public.as_bytes());
        }
    }
    Ok(packet)
}

/// Parse a key packet back into the bytes [`encode_key_packet`] was given.
///
/// For private packets the embedded public key must be the one the secret
/// actually produces.
pub fn decode_key_packet(kind: KeyKind, packet: &[u8]) -> Result<Zeroizing<Vec<u8>>, ArmorError> {
    let expected = match kind {
        KeyKind::Private => PRIVATE_KEY_PACKET_LEN,
        KeyKind::Public => PUBLIC_KEY_PACKET_LEN,
    };
    if packet.len() != expected {
        return Err(ArmorError::PacketLength {
            expected,
            found: packet.len(),
        });
    }
    if packet[0] != PGP_PACKET_VERSION {
        return Err(ArmorError::UnsupportedVersion(packet[0]));
    }
    // Creation time (bytes 1..5) is informational and not checked.
    if packet[5] != PGP_ALGO_EDDSA {
        return Err(ArmorError::UnsupportedAlgorithm(packet[5]));
    }

    let material = &packet[KEY_HEADER_LEN..];
    match kind {
        KeyKind::Private => {
            let (secret, public) = material.split_at(SIGNING_KEY_LENGTH);
            let keypair = Keypair::from_slice(secret)?;
            keypair.ensure_matches(&PublicKey::try_from_slice(public)?)?;
            Ok(Zeroizing::new(secret.to_vec()))
        }
        KeyKind::Public => Ok(Zeroizing::new(material.to_vec())),
    }
}

/// A detached signature plus the key that made it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePacket {
    pub signer: PublicKey,
    pub signature: Signature,
}

impl SignaturePacket {
    pub fn new(signer: PublicKey, signature: Signature) -> Self {
        Self { signer, signature }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SIGNATURE_PACKET_LEN);
        out.extend_from_slice(&[
            PGP_PACKET_VERSION,
            PGP_SIG_BINARY_DOCUMENT,
            PGP_ALGO_EDDSA,
            PGP_HASH_SHA256,
        ]);
        out.extend_from_slice(self.signer.as_bytes());
        out.extend_from_slice(self.signature.as_bytes());
        out
    }

    pub fn decode(packet: &[u8]) -> Result<Self, ArmorError> {
        if packet.len() != SIGNATURE_PACKET_LEN {
            return Err(ArmorError::PacketLength {
                expected: SIGNATURE_PACKET_LEN,
                found: packet.len(),
            });
        }
        if packet[0] != PGP_PACKET_VERSION {
            return Err(ArmorError::UnsupportedVersion(packet[0]));
        }
        if packet[1] != PGP_SIG_BINARY_DOCUMENT {
            return Err(ArmorError::UnsupportedSignatureType(packet[1]));
        }
        if packet[2] != PGP_ALGO_EDDSA {
            return Err(ArmorError::UnsupportedAlgorithm(packet[2]));
        }
        if packet[3] != PGP_HASH_SHA256 {
            return Err(ArmorError::UnsupportedHash(packet[3]));
        }

        let body = &packet[SIG_HEADER_LEN..];
        let (signer, signature) = body.split_at(VERIFYING_KEY_LENGTH);
        Ok(Self {
            signer: PublicKey::try_from_slice(signer)?,
            signature: Signature::try_from_slice(signature)?,
        })
    }
}
