//! OpenPGP armor checksum (RFC 4880 §6.1).

const CRC24_INIT: u32 = 0x00B7_04CE;
const CRC24_POLY: u32 = 0x0186_4CFB;

/// CRC-24 over `data`, in the low 24 bits of the result.
pub fn crc24(data: &[u8]) -> u32 {
    let mut crc = CRC24_INIT;
    for &byte in data {
        crc ^= u32::from(byte) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= CRC24_POLY;
            }
        }
    }
    crc & 0x00FF_FFFF
}

/// The checksum as the three big-endian bytes that get base64-encoded.
pub fn crc24_bytes(data: &[u8]) -> [u8; 3] {
    let crc = crc24(data);
    [(crc >> 16) as u8, (crc >> 8) as u8, crc as u8]
}
