//! Keccak-256 digests.
//!
//! Ticket hashes, recipient rand commitments, segment hashes and address
//! derivation all use the Ethereum flavour of SHA-3, so one digest type
//! serves the whole workspace.

use num_bigint::BigUint;
use sbor::prelude::*;
use sha3::{Digest, Keccak256};
use std::fmt;

/// A 32-byte Keccak-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, BasicSbor)]
#[sbor(transparent)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const BYTES: usize = 32;

    /// Digest of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(Keccak256::digest(bytes).into())
    }

    /// Digest of the concatenation of `parts`, without allocating it.
    pub fn from_parts(parts: &[&[u8]]) -> Self {
        let hasher = parts
            .iter()
            .fold(Keccak256::new(), |hasher, part| hasher.chain_update(part));
        Self(hasher.finalize().into())
    }

    /// Wrap an existing digest as received off the wire.
    ///
    /// Short inputs are left-padded with zeros and long inputs keep their
    /// last 32 bytes, the same way a uint256 is read.
    pub fn from_hash_bytes(bytes: &[u8]) -> Self {
        let mut out = [0u8; Self::BYTES];
        let tail = &bytes[bytes.len().saturating_sub(Self::BYTES)..];
        out[Self::BYTES - tail.len()..].copy_from_slice(tail);
        Self(out)
    }

    /// Parse 64 hex digits, optionally prefixed with `0x`.
    pub fn from_hex(s: &str) -> Result<Self, HexError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.len() != 2 * Self::BYTES {
            return Err(HexError::InvalidLength {
                expected: 2 * Self::BYTES,
                actual: digits.len(),
            });
        }
        let mut out = [0u8; Self::BYTES];
        hex::decode_to_slice(digits, &mut out).map_err(|_| HexError::InvalidHex)?;
        Ok(Self(out))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    /// The digest read as a big-endian uint256.
    pub fn to_uint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Hash(0x{}..{})", &hex[..8], &hex[56..])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

/// Malformed hex input for a [`Hash`] or an address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    #[error("Invalid hex length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid hex string")]
    InvalidHex,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_empty_input() {
        let expected = "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470";
        assert_eq!(Hash::from_bytes(&[]).to_hex(), expected);
    }

    #[test]
    fn test_from_parts_matches_concatenation() {
        assert_eq!(
            Hash::from_parts(&[b"recipient", b"rand"]),
            Hash::from_bytes(b"recipientrand")
        );
        assert_ne!(Hash::from_bytes(b"ticket"), Hash::from_bytes(b"tickets"));
    }

    #[test]
    fn test_display_parses_back() {
        let h = Hash::from_bytes(b"abc");
        assert_eq!(Hash::from_hex(&h.to_string()), Ok(h));
        assert_eq!(Hash::from_hex(&h.to_hex()), Ok(h));
    }

    #[test]
    fn test_from_hex_invalid_length() {
        assert_eq!(
            Hash::from_hex("abcd"),
            Err(HexError::InvalidLength {
                expected: 64,
                actual: 4
            })
        );
        assert_eq!(Hash::from_hex(&"zz".repeat(32)), Err(HexError::InvalidHex));
    }

    #[test]
    fn test_from_hash_bytes_reads_like_uint256() {
        let short = Hash::from_hash_bytes(&[1, 2]);
        assert_eq!(short.to_uint(), BigUint::from(0x0102u32));

        let mut long = vec![0xffu8; 4];
        long.extend_from_slice(Hash::from_bytes(b"x").as_bytes());
        assert_eq!(Hash::from_hash_bytes(&long), Hash::from_bytes(b"x"));
    }
}
