//! # Detached Signatures
//!
//! `sign` produces a detached `PGP SIGNATURE` block over the message bytes
//! exactly as given. The message itself is not embedded; the verifier
//! supplies it again. The block carries the signer's public key, so a
//! signature can be checked without a session:
//!
//! ```text
//! -----BEGIN PGP SIGNATURE-----
//! Comment: Signed with Anarchy Auth biometric key
//!
//! BAAWCN...
//! =XXXX
//! -----END PGP SIGNATURE-----
//! ```
//!
//! Inputs to verification are accepted in either armored or hex form.

use serde::Serialize;

use crate::armor::{self, KeyKind, SignaturePacket};
use crate::crypto::{sha256_hex, KeyError, Keypair, PublicKey, Signature};

/// Comment stamped on every signature block.
pub const SIGNATURE_COMMENT: &str = "Signed with Anarchy Auth biometric key";

/// What `sign` hands back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetachedSignature {
    /// The armored signature block.
    pub armored: String,
    /// 128 hex characters.
    pub signature_hex: String,
    /// SHA-256 of the signed message, hex.
    pub message_sha256: String,
    /// Signer public key, hex.
    pub public_key_hex: String,
}

/// Sign `message` and wrap the result in a detached signature block.
pub fn sign_detached(keypair: &Keypair, message: &[u8]) -> DetachedSignature {
    let signature = keypair.sign(message);
    let signer = keypair.public_key();
    let packet = SignaturePacket::new(signer, signature);

    DetachedSignature {
        armored: armor::to_signature_armor(&packet, Some(SIGNATURE_COMMENT)),
        signature_hex: signature.to_hex(),
        message_sha256: sha256_hex(message),
        public_key_hex: signer.to_hex(),
    }
}

/// A signature as submitted for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedSignature {
    pub signature: Signature,
    /// Present when the signature arrived as an armored block with a well
    /// formed packet header.
    pub embedded_signer: Option<PublicKey>,
    /// False for an armored block whose checksum or packet header was
    /// damaged. Verification treats such a signature as invalid.
    pub intact: bool,
}

fn looks_armored(input: &str) -> bool {
    input.contains("-----BEGIN PGP ")
}

/// Parse a signature given as an armored block or as 128 hex characters.
///
/// Errors mean the input does not hold 64 signature bytes at all. A damaged
/// but complete armored block parses, with `intact` cleared.
pub fn parse_signature(input: &str) -> Result<SubmittedSignature, armor::ArmorError> {
    if looks_armored(input) {
        let read = armor::read_signature_armor(input)?;
        return Ok(SubmittedSignature {
            signature: read.signature,
            embedded_signer: read.signer,
            intact: read.intact,
        });
    }
    Ok(SubmittedSignature {
        signature: Signature::try_from_slice(&decode_hex(input, KeyError::InvalidSignatureLength)?)?,
        embedded_signer: None,
        intact: true,
    })
}

/// Parse a public key given as an armored public key block or as 64 hex
/// characters.
pub fn parse_public_key(input: &str) -> Result<PublicKey, armor::ArmorError> {
    if looks_armored(input) {
        let bytes = armor::from_armor_expecting(input, KeyKind::Public)?;
        return Ok(PublicKey::try_from_slice(&bytes)?);
    }
    Ok(PublicKey::try_from_slice(&decode_hex(
        input,
        KeyError::InvalidPublicKeyLength,
    )?)?)
}

/// Hex decoding where a bad digit counts as a length problem: the input is
/// not a valid encoding of the expected number of bytes.
fn decode_hex(input: &str, length_error: fn(usize) -> KeyError) -> Result<Vec<u8>, KeyError> {
    let input = input.trim();
    hex::decode(input).map_err(|_| length_error(input.len() / 2))
}
