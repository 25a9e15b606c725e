//! # PGP Armor Codec
//!
//! ASCII armor around the packet bodies in [`packet`]:
//!
//! ```text
//! -----BEGIN PGP PUBLIC KEY BLOCK-----
//! Comment: Generated by Anarchy Auth - iris
//!
//! BAAAAAAW11qYAYKxCrfVS/7TyWQHOg7hcvPapiMlrwIaaPcHURo=
//! =S5j4
//! -----END PGP PUBLIC KEY BLOCK-----
//! ```
//!
//! Base64 body lines wrap at [`ARMOR_LINE_WIDTH`] columns and the `=` line is
//! the RFC 4880 CRC-24 of the decoded body. Output is a pure function of the
//! inputs: no timestamps, no version header.
//!
//! The round-trip law holds for both key kinds:
//!
//! ```text
//! from_armor(to_armor(k, kind)) == (kind, k)
//! ```
//!
//! where `k` is the 32-byte secret seed for private blocks and the 32-byte
//! public key for public blocks.

pub mod crc24;
pub mod packet;

pub use packet::{SignaturePacket, SIGNATURE_PACKET_LEN};

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::{ARMOR_COMMENT_PREFIX, ARMOR_LINE_WIDTH, SIGNATURE_LENGTH};
use crate::crypto::{KeyError, PublicKey, Signature};
use crc24::crc24_bytes;

const BEGIN_PREFIX: &str = "-----BEGIN PGP ";
const END_PREFIX: &str = "-----END PGP ";
const DASHES: &str = "-----";

/// Everything that can be wrong with an armored block.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArmorError {
    #[error("no armor header line found")]
    MissingHeader,

    #[error("armor footer missing or does not match header")]
    MissingFooter,

    #[error("unknown armor block type {0:?}")]
    UnknownBlock(String),

    #[error("unknown key kind {0:?}, expected \"private\" or \"public\"")]
    UnknownKeyKind(String),

    #[error("expected a {expected} block, found a {found} block")]
    UnexpectedBlock { expected: BlockKind, found: BlockKind },

    #[error("malformed armor header line {0:?}")]
    MalformedHeader(String),

    #[error("armor body is not valid base64: {0}")]
    InvalidBase64(String),

    #[error("armor checksum line missing")]
    MissingChecksum,

    #[error("armor checksum mismatch")]
    ChecksumMismatch,

    #[error("unsupported packet version {0:#04x}")]
    UnsupportedVersion(u8),

    #[error("unsupported public-key algorithm {0:#04x}")]
    UnsupportedAlgorithm(u8),

    #[error("unsupported signature type {0:#04x}")]
    UnsupportedSignatureType(u8),

    #[error("unsupported hash algorithm {0:#04x}")]
    UnsupportedHash(u8),

    #[error("packet length: expected {expected} bytes, got {found}")]
    PacketLength { expected: usize, found: usize },

    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Which half of a keypair a key block carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Private,
    Public,
}

impl KeyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::Private => "private",
            KeyKind::Public => "public",
        }
    }

    pub fn block_kind(&self) -> BlockKind {
        match self {
            KeyKind::Private => BlockKind::PrivateKey,
            KeyKind::Public => BlockKind::PublicKey,
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyKind {
    type Err = ArmorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(KeyKind::Private),
            "public" => Ok(KeyKind::Public),
            other => Err(ArmorError::UnknownKeyKind(other.to_string())),
        }
    }
}

/// The armor block types this codec reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    PrivateKey,
    PublicKey,
    Signature,
}

impl BlockKind {
    /// The text between `BEGIN PGP ` and the closing dashes.
    pub fn label(&self) -> &'static str {
        match self {
            BlockKind::PrivateKey => "PRIVATE KEY BLOCK",
            BlockKind::PublicKey => "PUBLIC KEY BLOCK",
            BlockKind::Signature => "SIGNATURE",
        }
    }

    fn from_label(label: &str) -> Result<Self, ArmorError> {
        match label {
            "PRIVATE KEY BLOCK" => Ok(BlockKind::PrivateKey),
            "PUBLIC KEY BLOCK" => Ok(BlockKind::PublicKey),
            "SIGNATURE" => Ok(BlockKind::Signature),
            other => Err(ArmorError::UnknownBlock(other.to_string())),
        }
    }

    fn key_kind(&self) -> Option<KeyKind> {
        match self {
            BlockKind::PrivateKey => Some(KeyKind::Private),
            BlockKind::PublicKey => Some(KeyKind::Public),
            BlockKind::Signature => None,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A decoded armor block: type, optional comment, raw body.
#[derive(Debug)]
pub struct ArmorBlock {
    pub kind: BlockKind,
    pub comment: Option<String>,
    pub body: Zeroizing<Vec<u8>>,
}

/// Key bytes recovered from a key block.
#[derive(Debug)]
pub struct ArmoredKey {
    pub kind: KeyKind,
    pub bytes: Zeroizing<Vec<u8>>,
}

// ---------------------------------------------------------------------------
// Block framing
// ---------------------------------------------------------------------------

/// Frame `body` as an armor block.
pub fn encode_block(kind: BlockKind, comment: Option<&str>, body: &[u8]) -> String {
    let encoded = Zeroizing::new(STANDARD.encode(body));
    let checksum = STANDARD.encode(crc24_bytes(body));

    let mut out = String::with_capacity(encoded.len() + 128);
    out.push_str(BEGIN_PREFIX);
    out.push_str(kind.label());
    out.push_str(DASHES);
    out.push('\n');
    if let Some(comment) = comment {
        out.push_str("Comment: ");
        out.push_str(comment);
        out.push('\n');
    }
    out.push('\n');
    for (i, c) in encoded.chars().enumerate() {
        if i > 0 && i % ARMOR_LINE_WIDTH == 0 {
            out.push('\n');
        }
        out.push(c);
    }
    out.push('\n');
    out.push('=');
    out.push_str(&checksum);
    out.push('\n');
    out.push_str(END_PREFIX);
    out.push_str(kind.label());
    out.push_str(DASHES);
    out.push('\n');
    out
}

/// Framing of one block, before anything inside it is checked.
struct RawBlock<'a> {
    kind: BlockKind,
    comment: Option<String>,
    encoded: Zeroizing<String>,
    checksum: Option<&'a str>,
}

/// Locate header, headers, body, checksum line and footer.
///
/// Text before the header line and after the footer is ignored, so a block
/// pasted with surrounding prose still decodes. CRLF line endings are fine.
fn split_block(text: &str) -> Result<RawBlock<'_>, ArmorError> {
    let mut lines = text.lines().map(str::trim_end);

    let label = lines
        .by_ref()
        .find_map(|line| {
            line.trim_start()
                .strip_prefix(BEGIN_PREFIX)
                .and_then(|rest| rest.strip_suffix(DASHES))
        })
        .ok_or(ArmorError::MissingHeader)?;
    let kind = BlockKind::from_label(label)?;

    let mut comment = None;
    for line in lines.by_ref() {
        if line.is_empty() {
            break;
        }
        let (key, value) = line
            .split_once(": ")
            .ok_or_else(|| ArmorError::MalformedHeader(line.to_string()))?;
        if key == "Comment" {
            comment = Some(value.to_string());
        }
    }

    let mut encoded = Zeroizing::new(String::new());
    let (checksum, footer) = loop {
        match lines.next() {
            Some(line) if line.starts_with('=') => {
                let footer = lines.next().ok_or(ArmorError::MissingFooter)?;
                break (Some(&line[1..]), footer);
            }
            Some(line) if line.trim_start().starts_with(END_PREFIX) => break (None, line),
            Some(line) => encoded.push_str(line.trim()),
            None => return Err(ArmorError::MissingFooter),
        }
    };

    let expected_footer = format!("{END_PREFIX}{}{DASHES}", kind.label());
    if footer.trim() != expected_footer {
        return Err(ArmorError::MissingFooter);
    }

    Ok(RawBlock {
        kind,
        comment,
        encoded,
        checksum,
    })
}

/// Parse an armor block, validating framing and checksum.
pub fn decode_block(text: &str) -> Result<ArmorBlock, ArmorError> {
    let raw = split_block(text)?;
    let checksum = raw.checksum.ok_or(ArmorError::MissingChecksum)?;

    let body = Zeroizing::new(
        STANDARD
            .decode(raw.encoded.as_bytes())
            .map_err(|e| ArmorError::InvalidBase64(e.to_string()))?,
    );
    let checksum = STANDARD
        .decode(checksum.trim())
        .map_err(|e| ArmorError::InvalidBase64(e.to_string()))?;
    if checksum.as_slice() != crc24_bytes(&body) {
        return Err(ArmorError::ChecksumMismatch);
    }

    Ok(ArmorBlock {
        kind: raw.kind,
        comment: raw.comment,
        body,
    })
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Armor key bytes with the default comment.
pub fn to_armor(key_bytes: &[u8], kind: KeyKind) -> Result<String, ArmorError> {
    to_armor_with_comment(key_bytes, kind, Some(ARMOR_COMMENT_PREFIX))
}

/// Armor key bytes with an explicit comment header, or none.
pub fn to_armor_with_comment(
    key_bytes: &[u8],
    kind: KeyKind,
    comment: Option<&str>,
) -> Result<String, ArmorError> {
    let packet = packet::encode_key_packet(kind, key_bytes)?;
    Ok(encode_block(kind.block_kind(), comment, &packet))
}

/// Recover key bytes from a private or public key block.
pub fn from_armor(text: &str) -> Result<ArmoredKey, ArmorError> {
    let block = decode_block(text)?;
    let kind = block.kind.key_kind().ok_or(ArmorError::UnexpectedBlock {
        expected: BlockKind::PublicKey,
        found: block.kind,
    })?;
    let bytes = packet::decode_key_packet(kind, &block.body)?;
    Ok(ArmoredKey { kind, bytes })
}

/// Like [`from_armor`], but insists on one kind.
pub fn from_armor_expecting(text: &str, kind: KeyKind) -> Result<Zeroizing<Vec<u8>>, ArmorError> {
    let key = from_armor(text)?;
    if key.kind != kind {
        return Err(ArmorError::UnexpectedBlock {
            expected: kind.block_kind(),
            found: key.kind.block_kind(),
        });
    }
    Ok(key.bytes)
}

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

/// Armor a detached signature.
pub fn to_signature_armor(packet: &SignaturePacket, comment: Option<&str>) -> String {
    encode_block(BlockKind::Signature, comment, &packet.encode())
}

/// Parse a detached signature block.
pub fn from_signature_armor(text: &str) -> Result<SignaturePacket, ArmorError> {
    let block = decode_block(text)?;
    if block.kind != BlockKind::Signature {
        return Err(ArmorError::UnexpectedBlock {
            expected: BlockKind::Signature,
            found: block.kind,
        });
    }
    SignaturePacket::decode(&block.body)
}

/// Decoding for signature bodies that tolerates damage inside the packet.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A signature block as read for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadSignature {
    pub signature: Signature,
    /// Embedded signer, only when the packet header was well formed.
    pub signer: Option<PublicKey>,
    /// False when the checksum, the packet header or the base64 padding was
    /// off. Such a signature must never verify.
    pub intact: bool,
}

/// Read a detached signature block for verification.
///
/// Unlike [`from_signature_armor`], a block whose framing is sound and whose
/// body holds a packet of the right length always yields a signature, even
/// if the checksum or header bytes are wrong. It comes back with
/// `intact == false`. Errors are left for input that is not a signature
/// block of the right size at all.
pub fn read_signature_armor(text: &str) -> Result<ReadSignature, ArmorError> {
    if let Ok(packet) = from_signature_armor(text) {
        return Ok(ReadSignature {
            signature: packet.signature,
            signer: Some(packet.signer),
            intact: true,
        });
    }

    let raw = split_block(text)?;
    if raw.kind != BlockKind::Signature {
        return Err(ArmorError::UnexpectedBlock {
            expected: BlockKind::Signature,
            found: raw.kind,
        });
    }
    let body = LENIENT
        .decode(raw.encoded.as_bytes())
        .map_err(|e| ArmorError::InvalidBase64(e.to_string()))?;
    if body.len() != SIGNATURE_PACKET_LEN {
        return Err(ArmorError::PacketLength {
            expected: SIGNATURE_PACKET_LEN,
            found: body.len(),
        });
    }

    let signer = SignaturePacket::decode(&body).ok().map(|p| p.signer);
    Ok(ReadSignature {
        signature: Signature::try_from_slice(&body[SIGNATURE_PACKET_LEN - SIGNATURE_LENGTH..])?,
        signer,
        intact: false,
    })
}
