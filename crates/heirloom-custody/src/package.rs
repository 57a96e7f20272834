//! End-to-end will packaging.
//!
//! `create_will_package` runs the whole client-side pipeline — generate key,
//! encrypt, hash, split, upload — and returns exactly what the two other
//! parties need: the engine gets `(encrypted_cid, payload_hash)` as opaque
//! witnesses for `create_will`, and each guardian gets their key share (to
//! be delivered off band, encrypted under their own key).
//!
//! The blob store holds the raw ciphertext and nothing else, and
//! `payload_hash` is SHA-256 over those same bytes: any external verifier
//! can recompute the witness from the blob alone. The GCM nonce and the
//! algorithm tag are not secret and not part of the witness; they travel in
//! the package.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use heirloom_core::constants::NONCE_BYTES;
use heirloom_core::error::HeirloomError;
use heirloom_core::types::{Cid, PayloadHash, Principal, Timestamp};

use crate::blobstore::BlobStore;
use crate::cipher::{decrypt, encrypt, generate_key, CipherAlgorithm, EncryptedPayload};
use crate::hash::sha256;
use crate::shamir::{combine_shares, split_key, KeyShare};

/// One guardian's fragment of the will key.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuardianShare {
    pub guardian: Principal,
    pub share: KeyShare,
}

/// Everything produced by the client-side pipeline.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WillPackage {
    pub owner: Principal,
    /// Where the raw ciphertext lives in the blob store.
    pub encrypted_cid: Cid,
    /// SHA-256 over the stored ciphertext; the engine's integrity witness.
    pub payload_hash: PayloadHash,
    /// Per-encryption nonce. Needed to decrypt; carried here rather than in
    /// the blob so the witness covers the ciphertext alone.
    pub nonce: [u8; NONCE_BYTES],
    pub algorithm: CipherAlgorithm,
    /// One key share per guardian, in guardian-list order (share index i+1
    /// belongs to guardian i).
    pub shares: Vec<GuardianShare>,
    pub threshold: u8,
    /// Free-form client metadata; never interpreted by the engine.
    pub metadata: BTreeMap<String, String>,
    pub created_at: Timestamp,
}

/// Encrypt `plaintext` for `owner`, split the key across `guardians` with
/// reconstruction threshold `k`, and upload the ciphertext.
pub fn create_will_package(
    store: &dyn BlobStore,
    owner: Principal,
    plaintext: &[u8],
    guardians: &[Principal],
    k: u8,
    metadata: BTreeMap<String, String>,
    now: Timestamp,
) -> Result<WillPackage, HeirloomError> {
    let n = u8::try_from(guardians.len())
        .map_err(|_| HeirloomError::ShareBoundsInvalid { k, n: u8::MAX })?;

    let key = generate_key();
    let payload = encrypt(plaintext, &key, now);
    let payload_hash = PayloadHash(sha256(&payload.ciphertext));
    let shares = split_key(&key, n, k, now)?;
    let encrypted_cid = store.put(&payload.ciphertext)?;

    Ok(WillPackage {
        owner,
        encrypted_cid,
        payload_hash,
        nonce: payload.nonce,
        algorithm: payload.algorithm,
        shares: guardians
            .iter()
            .zip(shares)
            .map(|(guardian, share)| GuardianShare { guardian: *guardian, share })
            .collect(),
        threshold: k,
        metadata,
        created_at: now,
    })
}

/// Reverse pipeline, run off band after release: download the ciphertext by
/// CID, check it against the integrity witness, reassemble the envelope from
/// the package's nonce and algorithm tag, reconstruct the key from the
/// quorum's shares, and decrypt.
///
/// Callers holding on-chain witnesses should first cross-check
/// `package.encrypted_cid` / `package.payload_hash` against the will record.
pub fn recover_payload(
    store: &dyn BlobStore,
    package: &WillPackage,
    shares: &[KeyShare],
) -> Result<Vec<u8>, HeirloomError> {
    let ciphertext = store.get(&package.encrypted_cid)?;
    if PayloadHash(sha256(&ciphertext)) != package.payload_hash {
        return Err(HeirloomError::PayloadHashMismatch);
    }
    let payload = EncryptedPayload {
        ciphertext,
        nonce: package.nonce,
        algorithm: package.algorithm,
        created_at: package.created_at,
    };
    let key = combine_shares(shares)?;
    decrypt(&payload, &key)
}
