//! Function selector primitive
//!
//! Provides [`Selector`], the strongly-typed 4-byte routing key used by a
//! diamond to dispatch calls to facets.

use crate::signature::FunctionSignature;
use alloy_primitives::keccak256;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A 4-byte function selector
///
/// The first four bytes of the Keccak-256 hash of a canonical function
/// signature such as `transfer(address,uint256)`.
/// Immutable and cheap to clone (Copy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Selector([u8; 4]);

impl Selector {
    /// Selector width in bytes
    pub const LEN: usize = 4;

    /// Create a new Selector from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Get reference to the underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Convert to byte array (consumes self)
    #[inline]
    #[must_use]
    pub const fn into_bytes(self) -> [u8; 4] {
        self.0
    }

    /// Create selector from byte slice
    ///
    /// # Errors
    /// Returns error if slice length is not exactly 4 bytes
    #[inline]
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SelectorError> {
        if bytes.len() != Self::LEN {
            return Err(SelectorError::InvalidLength {
                expected: Self::LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 4];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Derive the selector of an already-canonical signature string
    ///
    /// No canonicalisation happens here; use
    /// [`FunctionSignature`](crate::FunctionSignature) for untrusted input.
    #[inline]
    #[must_use]
    pub fn from_canonical(signature: &str) -> Self {
        let digest = keccak256(signature.as_bytes());
        let mut arr = [0u8; 4];
        arr.copy_from_slice(&digest[..4]);
        Self(arr)
    }

    /// Derive the selector of a parsed signature
    #[inline]
    #[must_use]
    pub fn from_signature(signature: &FunctionSignature) -> Self {
        Self::new(signature.function().selector().0)
    }

    /// Hex representation without the `0x` prefix
    #[inline]
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed)?;
        Self::from_slice(&bytes)
    }
}

impl AsRef<[u8; 4]> for Selector {
    fn as_ref(&self) -> &[u8; 4] {
        &self.0
    }
}

impl From<[u8; 4]> for Selector {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

// Serialized as a 0x-prefixed hex string so routing tables stay readable as JSON keys
impl serde::Serialize for Selector {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Selector {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur when working with selectors
#[derive(Debug, thiserror::Error)]
pub enum SelectorError {
    /// Invalid selector length
    #[error("invalid selector length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Hex encoding error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
