//! Content-addressed blob store interface.
//!
//! The engine treats the CID as an opaque non-empty string; this crate only
//! needs `put` and `get`. [`MemoryBlobStore`] is the reference
//! implementation used by tests and the CLI; hosts plug in IPFS, S3, or
//! whatever else answers to content addressing.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use heirloom_core::error::HeirloomError;
use heirloom_core::types::Cid;

use crate::hash::sha256;

pub trait BlobStore: Send + Sync {
    fn put(&self, bytes: &[u8]) -> Result<Cid, HeirloomError>;
    fn get(&self, cid: &Cid) -> Result<Vec<u8>, HeirloomError>;
}

/// In-memory content-addressed store: CID = base58(SHA-256(bytes)).
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, bytes: &[u8]) -> Result<Cid, HeirloomError> {
        let cid = bs58::encode(sha256(bytes)).into_string();
        self.blobs
            .lock()
            .expect("blob store mutex")
            .insert(cid.clone(), bytes.to_vec());
        Ok(Cid(cid))
    }

    fn get(&self, cid: &Cid) -> Result<Vec<u8>, HeirloomError> {
        let bytes = self
            .blobs
            .lock()
            .expect("blob store mutex")
            .get(cid.as_str())
            .cloned()
            .ok_or_else(|| HeirloomError::BlobNotFound(cid.to_string()))?;
        // Content addressing makes integrity checkable on every read.
        if bs58::encode(sha256(&bytes)).into_string() != cid.0 {
            return Err(HeirloomError::PayloadHashMismatch);
        }
        Ok(bytes)
    }
}

// ── FsBlobStore ──────────────────────────────────────────────────────────────

/// CIDs minted by these stores are base-58 strings. Anything outside that
/// alphabet — path separators, dots, drive letters — is rejected before the
/// CID is joined onto a filesystem path, so an attacker-supplied CID (e.g.
/// from a tampered package file) can never name a file outside the store.
fn validate_cid(cid: &Cid) -> Result<(), HeirloomError> {
    const BS58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
    if cid.is_empty() || !cid.as_str().chars().all(|c| BS58_ALPHABET.contains(c)) {
        return Err(HeirloomError::InvalidCid(cid.to_string()));
    }
    Ok(())
}

/// Directory-backed content-addressed store: one file per blob, named by its
/// CID. What the CLI uses so blobs survive between invocations.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, HeirloomError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| HeirloomError::Storage(e.to_string()))?;
        Ok(Self { root })
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, bytes: &[u8]) -> Result<Cid, HeirloomError> {
        let cid = Cid(bs58::encode(sha256(bytes)).into_string());
        validate_cid(&cid)?;
        std::fs::write(self.root.join(cid.as_str()), bytes)
            .map_err(|e| HeirloomError::Storage(e.to_string()))?;
        Ok(cid)
    }

    fn get(&self, cid: &Cid) -> Result<Vec<u8>, HeirloomError> {
        validate_cid(cid)?;
        let path = self.root.join(cid.as_str());
        let bytes = std::fs::read(&path)
            .map_err(|_| HeirloomError::BlobNotFound(cid.to_string()))?;
        if bs58::encode(sha256(&bytes)).into_string() != cid.0 {
            return Err(HeirloomError::PayloadHashMismatch);
        }
        Ok(bytes)
    }
}
