//! heirloom-custody
//!
//! Client-side secret custody: encrypt a payload under a fresh AES-256 key,
//! split the key into k-of-n Shamir shares for the guardians, persist the
//! ciphertext in a content-addressed store, and later reconstruct the
//! plaintext from any k shares with integrity verification at every step.
//!
//! Nothing here touches engine state. The engine stores only the two opaque
//! witnesses this library produces — the ciphertext CID and its SHA-256 —
//! and the shares travel to guardians entirely off band.

pub mod blobstore;
pub mod cipher;
pub mod commit;
pub mod hash;
pub mod package;
pub mod shamir;

pub use blobstore::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use cipher::{decrypt, encrypt, generate_key, CipherAlgorithm, EncryptedPayload, SecretKey};
pub use commit::{commit_share, verify_commit};
pub use hash::sha256;
pub use package::{create_will_package, recover_payload, GuardianShare, WillPackage};
pub use shamir::{combine_shares, split_key, KeyShare};
