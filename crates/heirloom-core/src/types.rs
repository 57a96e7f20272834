use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonically increasing will identifier, assigned at creation.
pub type WillId = u64;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

/// Asset quantity. u128 covers native wei-scale amounts with room to spare.
pub type Amount = u128;

// ── Principal ────────────────────────────────────────────────────────────────

/// 32-byte caller identity. The engine never interprets these bytes; the host
/// ledger authenticates callers and hands the engine their principal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Principal(pub [u8; 32]);

impl Principal {
    /// The null principal. Never valid as an owner, guardian, or beneficiary.
    pub const ZERO: Principal = Principal([0u8; 32]);

    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Base-58 encoded string representation.
    pub fn to_b58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    pub fn from_b58(s: &str) -> Result<Self, bs58::decode::Error> {
        let bytes = bs58::decode(s).into_vec()?;
        if bytes.len() != 32 {
            return Err(bs58::decode::Error::BufferTooSmall);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_b58())
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", &self.to_b58()[..8])
    }
}

// ── TokenId ──────────────────────────────────────────────────────────────────

/// 32-byte identifier of an external token scope (contract address, asset
/// class id — whatever the host uses). Opaque to the engine.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId(pub [u8; 32]);

impl TokenId {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_b58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_b58())
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({})", &self.to_b58()[..8])
    }
}

// ── PayloadHash ──────────────────────────────────────────────────────────────

/// 32-byte SHA-256 digest of the encrypted payload. Stored on the will as the
/// integrity witness for the off-band ciphertext; all-zero is invalid.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadHash(pub [u8; 32]);

impl PayloadHash {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for PayloadHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PayloadHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PayloadHash({}…)", &self.to_hex()[..16])
    }
}

// ── Cid ──────────────────────────────────────────────────────────────────────

/// Content identifier returned by the external blob store. Opaque to the
/// engine apart from the non-empty requirement.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct Cid(pub String);

impl Cid {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Salt ─────────────────────────────────────────────────────────────────────

/// 32-byte salt mixed into share commitments.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct Salt(pub [u8; 32]);

impl Salt {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}
