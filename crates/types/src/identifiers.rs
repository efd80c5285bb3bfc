//! Domain-specific identifier types.

use crate::HexError;
use sbor::prelude::*;
use std::fmt;

/// A 20-byte account address derived from a secp256k1 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, BasicSbor)]
#[sbor(transparent)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Size of an address in bytes.
    pub const BYTES: usize = 20;

    /// The zero address.
    pub const ZERO: Self = Address([0u8; 20]);

    /// Build an address from a byte slice of exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, HexError> {
        let arr: [u8; 20] = bytes.try_into().map_err(|_| HexError::InvalidLength {
            expected: Self::BYTES,
            actual: bytes.len(),
        })?;
        Ok(Address(arr))
    }

    /// Parse from hex (with or without `0x` prefix).
    pub fn from_hex(hex: &str) -> Result<Self, HexError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        if hex.len() != 40 {
            return Err(HexError::InvalidLength {
                expected: 40,
                actual: hex.len(),
            });
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(hex, &mut bytes).map_err(|_| HexError::InvalidHex)?;
        Ok(Address(bytes))
    }

    /// Get the bytes as a slice.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Check if this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

/// Identifier of a broadcast stream.
///
/// Balances on the orchestrator side are keyed by (sender, manifest).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, BasicSbor)]
#[sbor(transparent)]
pub struct ManifestId(pub String);

impl ManifestId {
    pub fn new(id: impl Into<String>) -> Self {
        ManifestId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ManifestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a ticket sender session.
///
/// One session exists per set of ticket params issued by a recipient.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, BasicSbor)]
#[sbor(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// On-chain block number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, BasicSbor)]
#[sbor(transparent)]
pub struct BlockNumber(pub u64);

impl BlockNumber {
    /// Get the next block number.
    pub fn next(self) -> Self {
        BlockNumber(self.0 + 1)
    }

    /// Block number `blocks` after this one, saturating.
    pub fn saturating_add(self, blocks: u64) -> Self {
        BlockNumber(self.0.saturating_add(blocks))
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block({})", self.0)
    }
}
