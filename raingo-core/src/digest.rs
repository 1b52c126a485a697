//! Plaintext to hex digest for the four supported algorithms.

use std::fmt;

use md5::Md5;
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Lower-case hex lookup table.
pub const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

/// The closed set of digest algorithms every plaintext is hashed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlgorithmKind {
    #[serde(rename = "MD5")]
    Md5,
    #[serde(rename = "SHA1")]
    Sha1,
    #[serde(rename = "SHA256")]
    Sha256,
    #[serde(rename = "RIPEMD")]
    Ripemd160,
}

impl AlgorithmKind {
    /// Emission order used by the pipeline for every plaintext.
    pub const ALL: [AlgorithmKind; 4] =
        [AlgorithmKind::Md5, AlgorithmKind::Sha1, AlgorithmKind::Sha256, AlgorithmKind::Ripemd160];

    /// Length of the hex encoded digest.
    pub const fn hex_len(self) -> usize {
        match self {
            AlgorithmKind::Md5 => 32,
            AlgorithmKind::Sha1 | AlgorithmKind::Ripemd160 => 40,
            AlgorithmKind::Sha256 => 64,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            AlgorithmKind::Md5 => "MD5",
            AlgorithmKind::Sha1 => "SHA1",
            AlgorithmKind::Sha256 => "SHA256",
            AlgorithmKind::Ripemd160 => "RIPEMD",
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Computes the lower-case hex digest of `plaintext` with `kind`.
///
/// Never fails; the empty string hashes like any other input.
pub fn digest(plaintext: &str, kind: AlgorithmKind) -> String {
    let bytes = plaintext.as_bytes();
    match kind {
        AlgorithmKind::Md5 => to_hex(&Md5::digest(bytes)),
        AlgorithmKind::Sha1 => to_hex(&Sha1::digest(bytes)),
        AlgorithmKind::Sha256 => to_hex(&Sha256::digest(bytes)),
        AlgorithmKind::Ripemd160 => to_hex(&Ripemd160::digest(bytes)),
    }
}

/// Encode raw digest bytes as lower-case hex.
#[inline]
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(HEX_CHARS[(b >> 4) as usize] as char);
        out.push(HEX_CHARS[(b & 0x0f) as usize] as char);
    }
    out
}
